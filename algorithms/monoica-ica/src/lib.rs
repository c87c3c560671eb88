//! # Single-sensor Independent Component Analysis (ICA)
//!
//! `monoica-ica` separates the sources mixed in a single-channel recording.
//!
//! ICA normally needs at least as many observation channels as there are sources. A single
//! sensor has one, but when the sources move their gains change over time. The recording is
//! therefore cut into windows ("pseudo-channels"), each window seeing the sources with a
//! different gain, and an ICA solver is run across the windows.
//!
//! ## Variants
//!
//! - [`IcaVariant::TimeDomain`]: FastICA on the window samples and a few delayed copies of
//!   every window. A tone then spans a sine and a cosine direction, so every source comes back
//!   as a pair of components and a moderate phase drift between windows is tolerated.
//! - [`IcaVariant::FrequencyReal`]: FastICA on the sine/cosine coefficients of every window. A
//!   phase drift between windows splits a source over two independent directions, so this
//!   variant degrades on phase-unaligned sources.
//! - [`IcaVariant::FrequencyComplex`]: complex FastICA on the complex exponential
//!   coefficients, where a phase drift is a plain complex gain. Needs a solver supporting complex
//!   records, such as [`ComplexFastIcaSolver`]; the default real-only solver is rejected with
//!   [`IcaError::UnsupportedDataType`].
//!
//! Input data is whitened (remove underlying correlation) before modeling.
//!
//! ## Example
//!
//! ```no_run
//! use monoica::{traits::Fit, Waveform, WaveformStore};
//! use monoica_datasets::{Position, Velocity};
//! use monoica_ica::scenario::{ScenarioOutcome, ScenarioParams};
//! use monoica_ica::{ComplexFastIcaSolver, IcaError, IcaVariant};
//!
//! let fs = 1000.;
//! let mut store = WaveformStore::new();
//! store.insert("a", Waveform::from_fn(4000, fs, |t| (314. * t).sin())?)?;
//! store.insert("b", Waveform::from_fn(4000, fs, |t| (848. * t).sin())?)?;
//!
//! let params = ScenarioParams::new(fs, 4., 1.)
//!     .source("a", Position::new(-20., 10.), Velocity::new(20., 0.))
//!     .source("b", Position::new(-60., 10.), Velocity::new(20., 0.))
//!     .ica_variant(IcaVariant::FrequencyComplex)
//!     .solver(ComplexFastIcaSolver::default())
//!     .window_len(200)
//!     .hop(200);
//! let outcome: Result<ScenarioOutcome, IcaError> = params.fit(&store);
//! println!("score {:.3}", outcome?.evaluation.score());
//! # Ok::<(), monoica_ica::IcaError>(())
//! ```

#[macro_use]
extern crate ndarray;

pub mod complex_fast_ica;
mod embedding;
mod engine;
pub mod error;
pub mod fast_ica;
mod hyperparams;
mod linalg;
pub mod scenario;
mod solver;

pub use complex_fast_ica::{ComplexFastIca, ComplexGFunc};
pub use embedding::{IcaVariant, Records, SpectralEmbedding, WindowLayout};
pub use engine::{
    EstimatedComponent, FittedIca, IcaEngine, IcaEngineParams, IcaEngineValidParams,
    SeparationResult,
};
pub use error::{IcaError, Result};
pub use fast_ica::{FastIca, GFunc};
pub use hyperparams::{
    ComplexFastIcaParams, ComplexFastIcaValidParams, FastIcaParams, FastIcaValidParams,
};
pub use solver::{ComplexFastIcaSolver, FastIcaSolver, IcaSolver, SolverOptions};
