//! Pure source clips
//!
//! A [`Waveform`] is an immutable sequence of samples taken at a fixed rate. Waveforms taking
//! part in one experiment are collected in a [`WaveformStore`], which guarantees that all of them
//! share the same sample rate.
use std::collections::BTreeMap;

use ndarray::{Array1, ArrayView1};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sampled real-valued signal
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Array1<f64>,
    sample_rate: f64,
}

impl Waveform {
    /// Create a new waveform
    ///
    /// # Errors
    ///
    /// If the sample rate is not a positive, finite number
    pub fn new(samples: Array1<f64>, sample_rate: f64) -> Result<Self> {
        check_sample_rate(sample_rate)?;

        Ok(Waveform {
            samples,
            sample_rate,
        })
    }

    /// Sample `f(t)` at `sample_rate` for `num_samples` samples, `t` in seconds
    pub fn from_fn(
        num_samples: usize,
        sample_rate: f64,
        mut f: impl FnMut(f64) -> f64,
    ) -> Result<Self> {
        check_sample_rate(sample_rate)?;
        let samples = Array1::from_shape_fn(num_samples, |n| f(n as f64 / sample_rate));

        Ok(Waveform {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> ArrayView1<'_, f64> {
        self.samples.view()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Copy of the first `len` samples (or all of them if the waveform is shorter)
    pub fn truncated(&self, len: usize) -> Waveform {
        let len = len.min(self.samples.len());

        Waveform {
            samples: self.samples.slice(s![..len]).to_owned(),
            sample_rate: self.sample_rate,
        }
    }

    pub fn into_samples(self) -> Array1<f64> {
        self.samples
    }
}

pub(crate) fn check_sample_rate(sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "sample rate must be positive and finite, got {}",
            sample_rate
        )));
    }

    Ok(())
}

/// In-memory collection of pure source clips, keyed by identifier
///
/// The store is filled once per experiment and read-only afterwards. Iteration order is the
/// lexical order of the identifiers, so experiments are reproducible regardless of the order in
/// which an external loader inserted the clips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveformStore {
    waveforms: BTreeMap<String, Waveform>,
}

impl WaveformStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clip to the store
    ///
    /// # Errors
    ///
    /// If the clip's sample rate differs from the clips already stored
    pub fn insert(&mut self, id: impl Into<String>, waveform: Waveform) -> Result<()> {
        if let Some(rate) = self.sample_rate() {
            if (rate - waveform.sample_rate()).abs() > f64::EPSILON * rate {
                return Err(Error::SignalMismatch(format!(
                    "sample rate {} differs from the store's rate {}",
                    waveform.sample_rate(),
                    rate
                )));
            }
        }
        self.waveforms.insert(id.into(), waveform);

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Waveform> {
        self.waveforms.get(id)
    }

    /// Look up a clip, failing with `InvalidParameter` for unknown identifiers
    pub fn require(&self, id: &str) -> Result<&Waveform> {
        self.get(id)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown source identifier `{}`", id)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.waveforms.keys().map(|id| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Waveform)> {
        self.waveforms.iter().map(|(id, w)| (id.as_str(), w))
    }

    pub fn len(&self) -> usize {
        self.waveforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waveforms.is_empty()
    }

    /// Common sample rate of the stored clips, `None` for an empty store
    pub fn sample_rate(&self) -> Option<f64> {
        self.waveforms.values().next().map(|w| w.sample_rate())
    }

    /// The requested clips, truncated to the length of the shortest one
    ///
    /// # Errors
    ///
    /// If `ids` is empty or names an unknown clip
    pub fn aligned(&self, ids: &[&str]) -> Result<Vec<Waveform>> {
        if ids.is_empty() {
            return Err(Error::InvalidParameter(
                "at least one source identifier is required".into(),
            ));
        }
        let clips = ids
            .iter()
            .map(|id| self.require(id))
            .collect::<Result<Vec<_>>>()?;
        // safe unwrap because `ids` is not empty
        let len = clips.iter().map(|w| w.len()).min().unwrap();

        Ok(clips.into_iter().map(|w| w.truncated(len)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_sample_rate() {
        assert!(Waveform::new(array![1., 2.], 0.).is_err());
        assert!(Waveform::new(array![1., 2.], -8000.).is_err());
        assert!(Waveform::new(array![1., 2.], f64::NAN).is_err());
    }

    #[test]
    fn store_enforces_single_rate() {
        let mut store = WaveformStore::new();
        store
            .insert("a", Waveform::new(array![0., 1.], 1000.).unwrap())
            .unwrap();
        let res = store.insert("b", Waveform::new(array![0., 1.], 2000.).unwrap());
        assert!(matches!(res, Err(Error::SignalMismatch(_))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.sample_rate(), Some(1000.));
    }

    #[test]
    fn aligned_truncates_to_shortest() {
        let mut store = WaveformStore::new();
        store
            .insert("long", Waveform::from_fn(10, 10., |t| t).unwrap())
            .unwrap();
        store
            .insert("short", Waveform::from_fn(4, 10., |t| -t).unwrap())
            .unwrap();

        let clips = store.aligned(&["long", "short"]).unwrap();
        assert!(clips.iter().all(|w| w.len() == 4));
        assert_eq!(clips[0].samples(), array![0., 0.1, 0.2, 0.3].view());

        assert!(store.aligned(&["missing"]).is_err());
        assert!(store.aligned(&[]).is_err());
    }
}
