//! Single-sensor mixtures
use log::debug;
use monoica::error::{Error, Result};
use monoica::Waveform;
use ndarray::ArrayView1;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::propagation::PropagatedSignal;

/// Sums propagated signals into the single observed channel
#[derive(Debug, Clone, Copy, Default)]
pub struct Mixer;

impl Mixer {
    /// Sum the signals sample by sample, in input order
    ///
    /// The signals are kept in the returned [`Mixture`] as ground truth.
    ///
    /// # Errors
    ///
    /// * `InvalidParameter` if `signals` is empty
    /// * `SignalMismatch` if the signals differ in length or sample rate
    pub fn mix(signals: Vec<PropagatedSignal>) -> Result<Mixture> {
        let first = signals.first().ok_or_else(|| {
            Error::InvalidParameter("a mixture needs at least one signal".into())
        })?;
        let (len, fs) = (first.len(), first.sample_rate());

        for signal in &signals[1..] {
            if signal.len() != len {
                return Err(Error::SignalMismatch(format!(
                    "signal `{}` has {} samples, expected {}",
                    signal.id(),
                    signal.len(),
                    len
                )));
            }
            if (signal.sample_rate() - fs).abs() > f64::EPSILON * fs {
                return Err(Error::SignalMismatch(format!(
                    "signal `{}` is sampled at {} Hz, expected {} Hz",
                    signal.id(),
                    signal.sample_rate(),
                    fs
                )));
            }
        }

        let mut sum = first.samples().to_owned();
        for signal in &signals[1..] {
            sum += &signal.samples();
        }
        debug!("mixed {} signals of {} samples", signals.len(), len);

        Ok(Mixture {
            observation: Waveform::new(sum, fs)?,
            sources: signals,
        })
    }
}

/// The single observed channel together with the signals it is made of
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct Mixture {
    observation: Waveform,
    sources: Vec<PropagatedSignal>,
}

impl Mixture {
    pub fn observation(&self) -> &Waveform {
        &self.observation
    }

    pub fn samples(&self) -> ArrayView1<'_, f64> {
        self.observation.samples()
    }

    /// Ground truth, in the order the signals were mixed
    pub fn sources(&self) -> &[PropagatedSignal] {
        &self.sources
    }

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    pub fn sample_rate(&self) -> f64 {
        self.observation.sample_rate()
    }

    pub fn len(&self) -> usize {
        self.observation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observation.is_empty()
    }
}
