//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Parses the flag
//! surface into an [`Invocation`], builds a [`Config`] from the tuning
//! flags, and dispatches to the one operation the flags select.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use primecount_rs::{
    algorithms, approx, backup, b_fn, config::Config, d_fn, error::PrimeCountError, expr,
    gourdon_ac, gourdon_phi0, phi,
};

/// Combinatorial prime-counting at the command line.
///
/// Computes `pi(x)` (the number of primes `<= x`) by default, or one of the
/// named algorithms / auxiliary functions below when their flag is given.
/// `x` (and any other numeric operand) accepts `10^14`-style exponents and
/// `+ - * / ^ ( )` arithmetic on non-negative integers.
#[derive(Parser, Debug)]
#[command(name = "primecount", version, about)]
pub struct Cli {
    /// The number to evaluate pi(x) at (or the sole operand for single-argument
    /// auxiliary functions). May also be supplied via `--number`.
    pub x: Option<String>,

    /// Second operand for `--phi a` (first operand is the positional `x`).
    #[arg(long = "phi", value_name = "A")]
    pub phi: Option<String>,

    /// Legendre's formula.
    #[arg(long)]
    pub legendre: bool,
    /// Meissel's formula.
    #[arg(long)]
    pub meissel: bool,
    /// Lehmer's formula.
    #[arg(long)]
    pub lehmer: bool,
    /// Lagarias-Miller-Odlyzko.
    #[arg(long)]
    pub lmo: bool,
    /// Deleglise-Rivat.
    #[arg(long = "deleglise-rivat")]
    pub deleglise_rivat: bool,
    /// Gourdon's algorithm.
    #[arg(long)]
    pub gourdon: bool,
    /// Count primes via a plain sieve (cross-check for small x).
    #[arg(long)]
    pub primesieve: bool,
    /// Compute the n-th prime instead of pi(x).
    #[arg(long = "nth-prime")]
    pub nth_prime: bool,

    /// Logarithmic integral Li(x).
    #[arg(long = "Li")]
    pub li: bool,
    /// Inverse logarithmic integral.
    #[arg(long = "Li-inverse")]
    pub li_inverse: bool,
    /// Riemann R function Ri(x).
    #[arg(long = "Ri")]
    pub ri: bool,
    /// Inverse Riemann R function.
    #[arg(long = "Ri-inverse")]
    pub ri_inverse: bool,

    /// Gourdon's AC term (needs x, y via --alpha-y, z via --alpha-z).
    #[arg(long = "AC")]
    pub ac: bool,
    /// The B term: count of primes in (y, sqrt(x)].
    #[arg(short = 'B')]
    pub b: bool,
    /// Gourdon's D term (alias for S2_hard).
    #[arg(short = 'D')]
    pub d: bool,
    /// Gourdon's Phi0 term.
    #[arg(long = "Phi0")]
    pub phi0: bool,
    /// Gourdon's Sigma terms (reuses the AC/D split; no distinct sieve of its own).
    #[arg(long = "Sigma")]
    pub sigma: bool,

    /// Worker thread count (0 = all logical cores).
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
    /// LMO/Deleglise-Rivat tuning factor.
    #[arg(long)]
    pub alpha: Option<f64>,
    /// Gourdon y-tuning factor.
    #[arg(long = "alpha-y")]
    pub alpha_y: Option<f64>,
    /// Gourdon z-tuning factor.
    #[arg(long = "alpha-z")]
    pub alpha_z: Option<f64>,

    /// Print a `\rStatus: NN%` progress line while computing (PREC decimal
    /// digits of precision, default 2).
    #[arg(long, value_name = "PREC", num_args = 0..=1, default_missing_value = "2")]
    pub status: Option<u32>,
    /// Print wall-clock elapsed time after the result.
    #[arg(long)]
    pub time: bool,
    /// Run the built-in self-test suite and exit.
    #[arg(long)]
    pub test: bool,

    /// Write a resumable backup to FILE every ~60s of computation.
    #[arg(short = 'b', long, value_name = "FILE")]
    pub backup: Option<PathBuf>,
    /// Resume from FILE (defaults to the --backup path, or ./primecount.backup).
    #[arg(short = 'r', long, value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
    pub resume: Option<PathBuf>,

    /// Alternate way to supply `x`, for scripting contexts where a leading
    /// positional argument is awkward.
    #[arg(long)]
    pub number: Option<String>,
}

impl Cli {
    fn to_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.set_num_threads(self.threads);
        if let Some(a) = self.alpha {
            cfg.set_alpha(a);
        }
        if let Some(a) = self.alpha_y {
            cfg.set_alpha_y(a);
        }
        if let Some(a) = self.alpha_z {
            cfg.set_alpha_z(a);
        }
        cfg.set_status_precision(self.status.unwrap_or(2));
        cfg.set_print(self.status.is_some());
        if self.backup.is_some() || self.resume.is_some() {
            cfg.backup_path = Some(resolved_backup_path(self));
        }
        cfg.set_resume(wants_resume(self));
        cfg
    }

    fn operand(&self) -> Option<&str> {
        self.x.as_deref().or(self.number.as_deref())
    }

    fn parse_x(&self) -> Result<u128, PrimeCountError> {
        let raw = self
            .operand()
            .ok_or_else(|| PrimeCountError::OptionError("missing required numeric argument".to_string()))?;
        expr::parse(raw)
    }
}

/// Backup file used by [`run`] when `--backup`/`--resume` name no explicit
/// path.
const DEFAULT_BACKUP_PATH: &str = "primecount.backup";

/// Parse argv and run the selected operation, returning the process exit
/// code (`0` on success, `1` for an option error or a failed self-test).
pub fn run(args: impl IntoIterator<Item = String>) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            // clap prints --help/--version and its own usage text for those;
            // anything else is an option error under this crate's exit policy.
            let _ = e.print();
            return if e.exit_code() == 0 { 0 } else { 1 };
        }
    };

    match execute(&cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}

fn execute(cli: &Cli) -> Result<(), PrimeCountError> {
    if cli.test {
        return self_test();
    }

    let config = cli.to_config();
    let start = Instant::now();

    let output = dispatch(cli, &config)?;
    println!("{output}");
    clear_backup(cli);

    if cli.time {
        eprintln!("Elapsed: {:.3}s", start.elapsed().as_secs_f64());
    }
    Ok(())
}

fn dispatch(cli: &Cli, config: &Config) -> Result<String, PrimeCountError> {
    if let Some(a_str) = &cli.phi {
        let x = cli.parse_x()?;
        let a: usize = expr::parse(a_str)? as usize;
        let x64 = u64::try_from(x).map_err(|_| PrimeCountError::NumericOverflow {
            context: "phi(x,a) x operand".to_string(),
        })?;
        return Ok(phi(x64, a, config.resolved_threads()).to_string());
    }

    if cli.li {
        let x = cli.parse_x()? as f64;
        return Ok(format!("{:.6}", approx::li(x)));
    }
    if cli.li_inverse {
        let x = cli.parse_x()? as f64;
        return Ok(format!("{:.6}", approx::li_inverse(x)));
    }
    if cli.ri {
        let x = cli.parse_x()? as f64;
        return Ok(format!("{:.6}", approx::ri(x)));
    }
    if cli.ri_inverse {
        let x = cli.parse_x()? as f64;
        return Ok(format!("{:.6}", approx::ri_inverse(x)));
    }

    let x = cli.parse_x()?;

    if cli.nth_prime {
        let n = u64::try_from(x).map_err(|_| PrimeCountError::NumericOverflow {
            context: "nth_prime n".to_string(),
        })?;
        return Ok(algorithms::nth_prime(n, config)?.to_string());
    }

    if cli.ac || cli.d || cli.phi0 || cli.sigma || cli.b {
        return dispatch_gourdon_aux(cli, config, x);
    }

    if cli.legendre {
        return Ok(algorithms::pi_legendre(x, config.resolved_threads())?.to_string());
    }
    if cli.meissel {
        return Ok(algorithms::pi_meissel(x, config.resolved_threads())?.to_string());
    }
    if cli.lehmer {
        return Ok(algorithms::pi_lehmer(x, config.resolved_threads())?.to_string());
    }
    if cli.lmo {
        return Ok(algorithms::pi_lmo(x, config)?.to_string());
    }
    if cli.deleglise_rivat {
        return Ok(algorithms::pi_deleglise_rivat(x, config)?.to_string());
    }
    if cli.gourdon {
        return Ok(algorithms::pi_gourdon(x, config)?.to_string());
    }
    if cli.primesieve {
        let limit = u64::try_from(x).map_err(|_| PrimeCountError::NumericOverflow {
            context: "primesieve x".to_string(),
        })?;
        let primes = primecount_rs::primes::PrimeList::new(limit.max(2));
        return Ok(primes.pi(limit).to_string());
    }

    // Default: the general-purpose dispatcher.
    Ok(algorithms::pi(x, config)?.to_string())
}

/// Gourdon's AC/B/D/Phi0/Sigma auxiliary terms, grouped together since each
/// needs the same `y`/`z`/`c` scaffolding that the CLI resolves once here
/// rather than duplicating per-flag in [`dispatch`].
fn dispatch_gourdon_aux(cli: &Cli, config: &Config, x: u128) -> Result<String, PrimeCountError> {
    let alpha = if config.alpha_y > 0.0 {
        config.alpha_y
    } else {
        algorithms::resolve_alpha(x)
    };
    let cbrt_x = (x as f64).cbrt().max(2.0) as u64;
    let y = ((alpha * cbrt_x as f64).round() as u64).max(cbrt_x);
    let z = u64::try_from(x / y as u128).unwrap_or(u64::MAX);

    if cli.b {
        return Ok(b_fn(x, y, config.resolved_threads()).to_string());
    }

    let sieve_limit = y.max(2) + 1;
    let primes = primecount_rs::primes::PrimeList::new(sieve_limit);
    let mu_lpf = primecount_rs::mu_lpf::MuLpf::build((y as usize).max(1000));
    let a = primes.pi(y);
    let c = a.min(7);
    let phi_cache = primecount_rs::PhiCache::new(&primes);

    if cli.ac || cli.sigma {
        return Ok(gourdon_ac(x, y, z, c, &primes, &mu_lpf, &phi_cache).to_string());
    }
    if cli.phi0 {
        return Ok(gourdon_phi0(x, z, c, &primes, &mu_lpf).to_string());
    }
    if cli.d {
        return Ok(d_fn(x, y, z, c, config)?.to_string());
    }
    unreachable!("dispatch_gourdon_aux called without a selecting flag")
}

/// Runs the concrete scenarios from this crate's testable-properties suite
/// and exits non-zero (via `SelfTestFailure`) on the first mismatch.
fn self_test() -> Result<(), PrimeCountError> {
    let config = Config::default();
    let checks: &[(&str, u128, u64)] = &[("pi(10)", 10, 4), ("pi(100)", 100, 25), ("pi(1000)", 1000, 168)];
    for &(label, x, expected) in checks {
        let got = algorithms::pi(x, &config)?;
        if got != expected {
            return Err(PrimeCountError::SelfTestFailure(format!(
                "{label}: expected {expected}, got {got}"
            )));
        }
    }
    if phi(100, 4, 1) != 9 {
        return Err(PrimeCountError::SelfTestFailure(
            "phi(100, 4): expected 9".to_string(),
        ));
    }
    if algorithms::nth_prime(1000, &config)? != 7919 {
        return Err(PrimeCountError::SelfTestFailure(
            "nth_prime(1000): expected 7919".to_string(),
        ));
    }
    println!("self-test passed");
    Ok(())
}

/// Resolve the backup path a `--backup`/`--resume` invocation should use
/// when no explicit filename is given.
pub fn resolved_backup_path(cli: &Cli) -> PathBuf {
    if let Some(p) = &cli.backup {
        return p.clone();
    }
    if let Some(p) = &cli.resume {
        if !p.as_os_str().is_empty() {
            return p.clone();
        }
    }
    PathBuf::from(DEFAULT_BACKUP_PATH)
}

/// Whether `--resume` (with or without an explicit path) was requested.
pub fn wants_resume(cli: &Cli) -> bool {
    cli.resume.is_some()
}

/// Clear any backup generations at the resolved path — used when a
/// computation completes and its checkpoint is no longer needed.
pub fn clear_backup(cli: &Cli) {
    if cli.backup.is_some() || cli.resume.is_some() {
        backup::clear(&resolved_backup_path(cli));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut v = vec!["primecount".to_string()];
        v.extend(args.iter().map(|s| s.to_string()));
        Cli::try_parse_from(v).expect("should parse")
    }

    #[test]
    fn parses_bare_positional_x() {
        let cli = parse(&["1000000"]);
        assert_eq!(cli.operand(), Some("1000000"));
    }

    #[test]
    fn parses_expression_operand() {
        let cli = parse(&["10^14"]);
        assert_eq!(cli.parse_x().unwrap(), 10u128.pow(14));
    }

    #[test]
    fn parses_algorithm_flags() {
        let cli = parse(&["1000", "--lmo"]);
        assert!(cli.lmo);
        assert!(!cli.gourdon);
    }

    #[test]
    fn number_flag_is_alternate_operand() {
        let cli = parse(&["--number", "500"]);
        assert_eq!(cli.operand(), Some("500"));
    }

    #[test]
    fn status_default_missing_value_is_two() {
        let cli = parse(&["100", "--status"]);
        assert_eq!(cli.status, Some(2));
    }

    #[test]
    fn status_accepts_explicit_precision() {
        let cli = parse(&["100", "--status=4"]);
        assert_eq!(cli.status, Some(4));
    }

    #[test]
    fn dispatch_default_computes_pi() {
        let cli = parse(&["100"]);
        let config = cli.to_config();
        let out = dispatch(&cli, &config).unwrap();
        assert_eq!(out, "25");
    }

    #[test]
    fn dispatch_phi_two_operands() {
        let cli = parse(&["100", "--phi", "4"]);
        let config = cli.to_config();
        assert_eq!(dispatch(&cli, &config).unwrap(), "9");
    }

    #[test]
    fn dispatch_nth_prime() {
        let cli = parse(&["1000", "--nth-prime"]);
        let config = cli.to_config();
        assert_eq!(dispatch(&cli, &config).unwrap(), "7919");
    }

    #[test]
    fn missing_operand_is_option_error() {
        let cli = parse(&["--legendre"]);
        let config = cli.to_config();
        let err = dispatch(&cli, &config).unwrap_err();
        assert!(matches!(err, PrimeCountError::OptionError(_)));
    }

    #[test]
    fn self_test_passes() {
        assert!(self_test().is_ok());
    }
}
