//! `monoica` provides the building blocks to study independent component analysis on recordings
//! taken by a single sensor.
//!
//! A single microphone or hydrophone normally offers one observation channel, too few for
//! classical ICA. When the sound sources move, however, their distance to the sensor (and with it
//! the gain of every source) changes over time. Cutting the recording into short windows turns
//! that time variation into the diversity ICA needs.
//!
//! This crate holds the shared pieces of the workspace:
//!
//! * [`Waveform`] and [`WaveformStore`], the pure source clips an experiment starts from,
//! * [`BasisTransform`], moving signals between the time domain and a real sine/cosine or complex
//!   exponential frequency basis,
//! * [`SpectralAnalyzer`], scoring separated components against the ground truth,
//! * the [`ParamGuard`] / [`Fit`](traits::Fit) machinery used by every algorithm crate.
//!
//! The motion and propagation models live in `monoica-datasets`, the ICA variants in
//! `monoica-ica`.

#[macro_use]
extern crate ndarray;

pub mod basis;
pub mod error;
mod metrics_spectral;
mod param_guard;
pub mod prelude;
pub mod traits;
pub mod waveform;

pub use basis::{Basis, BasisTransform, Coefficients, FrequencyRepresentation};
pub use error::Error;
pub use param_guard::ParamGuard;
pub use waveform::{Waveform, WaveformStore};

/// Spectral similarity metrics used to score separated components
pub mod metrics {
    pub use crate::metrics_spectral::{
        Assignment, Evaluation, PowerSpectrum, QualityScore, SpectralAnalyzer,
        SpectralAnalyzerParams, SpectralMetric,
    };
}

pub use metrics::SpectralAnalyzer;
