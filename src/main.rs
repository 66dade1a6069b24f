//! # Main — CLI Entry Point
//!
//! Parses argv, dispatches to the selected `pi(x)` driver or auxiliary
//! function, and maps every failure kind to exit code 1 per this crate's
//! error-handling policy. All dispatch logic lives in [`cli`]; this file
//! stays a thin process boundary.

mod cli;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Initialize structured logging: `LOG_FORMAT=json` for machine consumption,
/// human-readable to stderr otherwise.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt().json().with_target(false).init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

fn main() {
    init_tracing();
    let code = cli::run(std::env::args());
    std::process::exit(code);
}
