//! # Error — The Five Failure Kinds
//!
//! A typed error enum backing the `anyhow::Result` used everywhere above the
//! kernel boundary. Each variant maps to exactly one exit code (1) and one
//! user-facing message shape; the CLI never needs to invent its own wording.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrimeCountError {
    #[error("unrecognized or malformed option: {0}")]
    OptionError(String),

    #[error("could not parse number expression '{0}'")]
    NumericParseError(String),

    #[error("numeric overflow computing {context} (value would exceed the supported range)")]
    NumericOverflow { context: String },

    #[error("backup file {path:?} could not be used: {reason}")]
    BackupIOError { path: PathBuf, reason: String },

    #[error("self-test failed: {0}")]
    SelfTestFailure(String),
}

impl PrimeCountError {
    /// Every kind of failure in this crate exits with the same code; kept as
    /// a method rather than a constant so call sites read `err.exit_code()`
    /// next to the message instead of a magic number.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let e = PrimeCountError::OptionError("--fooz".into());
        assert!(e.to_string().contains("--fooz"));

        let e = PrimeCountError::NumericParseError("10^".into());
        assert!(e.to_string().contains("10^"));

        let e = PrimeCountError::NumericOverflow {
            context: "phi[b] * iters".into(),
        };
        assert!(e.to_string().contains("phi[b] * iters"));
    }

    #[test]
    fn all_kinds_exit_one() {
        let kinds: Vec<PrimeCountError> = vec![
            PrimeCountError::OptionError("x".into()),
            PrimeCountError::NumericParseError("x".into()),
            PrimeCountError::NumericOverflow { context: "x".into() },
            PrimeCountError::BackupIOError {
                path: PathBuf::from("x"),
                reason: "x".into(),
            },
            PrimeCountError::SelfTestFailure("x".into()),
        ];
        for k in kinds {
            assert_eq!(k.exit_code(), 1);
        }
    }
}
