use thiserror::Error;

pub type Result<T> = std::result::Result<T, IcaError>;

/// An error when separating a single-sensor mixture
#[derive(Error, Debug)]
pub enum IcaError {
    /// When there are no samples in the provided records
    #[error("Records must contain at least one sample")]
    NotEnoughSamples,
    /// When any of the hyperparameters or the window layout are set to the wrong value
    #[error("Invalid value encountered: {0}")]
    InvalidValue(String),
    #[error("tolerance should be positive but is {0}")]
    InvalidTolerance(f64),
    /// If the eigendecomposition of a covariance matrix does not converge
    #[error("Eigendecomposition failed, the records could be ill-conditioned")]
    Eigendecomposition,
    /// The fixed-point iteration used up its budget
    #[error("FastICA did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },
    /// The solver cannot handle the data type the chosen variant produces
    #[error("solver {solver} does not support {data} data")]
    UnsupportedDataType {
        solver: &'static str,
        data: &'static str,
    },
    #[error(transparent)]
    Core(#[from] monoica::Error),
}
