//! Error types in Monoica
//!

use thiserror::Error;

use crate::basis::Basis;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed motion, duration, sample-rate or configuration input
    #[error("invalid parameter {0}")]
    InvalidParameter(String),
    /// Signals that should be combined disagree in length or sample rate
    #[error("signal mismatch {0}")]
    SignalMismatch(String),
    /// A frequency representation was handed to a stage expecting a different basis
    #[error(
        "basis mismatch: expected {}, found {}",
        basis_name(.expected),
        basis_name(.found)
    )]
    BasisMismatch {
        expected: Option<Basis>,
        found: Option<Basis>,
    },
    #[error("round trip error {error:e} exceeds tolerance {tolerance:e}")]
    ToleranceExceeded { error: f64, tolerance: f64 },
    #[error("fft failed {0}")]
    Fft(String),
}

fn basis_name(basis: &Option<Basis>) -> &'static str {
    match basis {
        Some(Basis::RealSineCosine) => "real sine/cosine basis",
        Some(Basis::ComplexExponential) => "complex exponential basis",
        None => "time domain",
    }
}

impl From<realfft::FftError> for Error {
    fn from(err: realfft::FftError) -> Self {
        Error::Fft(err.to_string())
    }
}
