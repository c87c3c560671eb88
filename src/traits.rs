//! Provide traits for different classes of algorithms
//!

/// Fittable algorithms
///
/// A fittable algorithm takes a set of observations and returns a fitted model. All stages that
/// learn something from a signal (the ICA engine, the solvers) follow this pattern, the unfitted
/// hyperparameters being the "Unfitted" state and the returned object the "Fitted" one.
pub trait Fit<R, E: std::error::Error> {
    type Object;

    fn fit(&self, records: &R) -> Result<Self::Object, E>;
}

/// Predict with a fitted model
///
/// Applies a fitted model to new observations, for example the unmixing matrix of a fitted
/// FastICA model to a different set of pseudo-channels.
pub trait Predict<R, T> {
    fn predict(&self, records: R) -> T;
}
