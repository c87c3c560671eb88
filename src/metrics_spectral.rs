//! Spectral similarity metrics
//!
//! Separated components are compared to the ground-truth source signals through their power
//! spectra. ICA recovers components only up to order, sign and scale, which the power spectrum
//! is insensitive to (apart from order, which the assignment step resolves).

use log::debug;
use ndarray::prelude::*;
use ndarray::Zip;
use num_complex::Complex64;
use realfft::RealFftPlanner;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::param_guard::ParamGuard;
use crate::waveform::check_sample_rate;

/// Similarity between two power spectra
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpectralMetric {
    /// Bhattacharyya coefficient `Σ √(p q)` of the normalized power spectra
    Overlap,
    /// Cosine similarity of the power spectra
    CrossCorrelation,
}

/// Welch power spectrum estimator and component scorer
///
/// This is the checked form, obtained from [`SpectralAnalyzerParams`].
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralAnalyzer {
    segment_len: usize,
    overlap: usize,
    metric: SpectralMetric,
    similarity_threshold: f64,
    normalize: bool,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralAnalyzerParams(SpectralAnalyzer);

impl Default for SpectralAnalyzerParams {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralAnalyzerParams {
    pub fn new() -> Self {
        Self(SpectralAnalyzer {
            segment_len: 256,
            overlap: 128,
            metric: SpectralMetric::Overlap,
            similarity_threshold: 0.5,
            normalize: true,
        })
    }

    /// Set the Welch segment length, the overlap is reset to half of it
    pub fn segment_len(mut self, segment_len: usize) -> Self {
        self.0.segment_len = segment_len;
        self.0.overlap = segment_len / 2;
        self
    }

    /// Set the number of samples shared by consecutive segments
    pub fn overlap(mut self, overlap: usize) -> Self {
        self.0.overlap = overlap;
        self
    }

    pub fn metric(mut self, metric: SpectralMetric) -> Self {
        self.0.metric = metric;
        self
    }

    /// Set the similarity below which a component is reported as unidentified
    pub fn similarity_threshold(mut self, similarity_threshold: f64) -> Self {
        self.0.similarity_threshold = similarity_threshold;
        self
    }

    /// Scale each spectrum to unit total power
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.0.normalize = normalize;
        self
    }
}

impl ParamGuard for SpectralAnalyzerParams {
    type Checked = SpectralAnalyzer;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.segment_len < 2 {
            Err(Error::InvalidParameter(format!(
                "segment length must be at least 2, got {}",
                self.0.segment_len
            )))
        } else if self.0.overlap >= self.0.segment_len {
            Err(Error::InvalidParameter(format!(
                "overlap {} must be smaller than the segment length {}",
                self.0.overlap, self.0.segment_len
            )))
        } else if !(0.0..=1.0).contains(&self.0.similarity_threshold) {
            Err(Error::InvalidParameter(format!(
                "similarity threshold must be in [0, 1], got {}",
                self.0.similarity_threshold
            )))
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// One-sided power spectrum on a regular frequency grid
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    frequencies: Array1<f64>,
    power: Array1<f64>,
}

impl PowerSpectrum {
    pub fn frequencies(&self) -> ArrayView1<'_, f64> {
        self.frequencies.view()
    }

    pub fn power(&self) -> ArrayView1<'_, f64> {
        self.power.view()
    }

    pub fn total_power(&self) -> f64 {
        self.power.sum()
    }

    /// Frequency of the strongest bin, `None` for a silent spectrum
    pub fn peak_frequency(&self) -> Option<f64> {
        let (idx, max) = self
            .power
            .iter()
            .enumerate()
            .fold((0, 0f64), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) });

        if max > 0.0 {
            Some(self.frequencies[idx])
        } else {
            None
        }
    }

    fn same_grid(&self, other: &PowerSpectrum) -> bool {
        self.frequencies.len() == other.frequencies.len()
            && Zip::from(&self.frequencies)
                .and(&other.frequencies)
                .all(|a, b| (a - b).abs() <= 1e-9 * a.abs().max(1.0))
    }
}

/// Match of one component to one reference source
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct QualityScore {
    /// Index of the separated component
    pub component: usize,
    /// Index of the reference source it matches best
    pub source: usize,
    /// Spectral similarity in `[0, 1]`
    pub similarity: f64,
    /// Absolute Pearson correlation of the time-domain samples
    pub correlation: f64,
    /// Distance between the spectral peaks, in Hz
    pub peak_frequency_error: f64,
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Matched(QualityScore),
    /// No reference reaches the similarity threshold
    Unidentified {
        component: usize,
        best_similarity: f64,
    },
}

impl Assignment {
    pub fn component(&self) -> usize {
        match self {
            Assignment::Matched(score) => score.component,
            Assignment::Unidentified { component, .. } => *component,
        }
    }

    pub fn score(&self) -> Option<&QualityScore> {
        match self {
            Assignment::Matched(score) => Some(score),
            Assignment::Unidentified { .. } => None,
        }
    }
}

/// Result of scoring a set of components against the reference sources
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    assignments: Vec<Assignment>,
    similarity: Array2<f64>,
    recovery: Array1<f64>,
}

impl Evaluation {
    /// One assignment per component, in component order
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Similarity of every component (rows) to every source (columns)
    pub fn similarity_matrix(&self) -> ArrayView2<'_, f64> {
        self.similarity.view()
    }

    /// Best similarity achieved by any component, per source
    pub fn recovery(&self) -> ArrayView1<'_, f64> {
        self.recovery.view()
    }

    /// Mean recovery over all sources
    pub fn score(&self) -> f64 {
        self.recovery.mean().unwrap_or(0.0)
    }

    pub fn matched(&self) -> impl Iterator<Item = &QualityScore> {
        self.assignments.iter().filter_map(Assignment::score)
    }

    /// Number of distinct sources at least one component was matched to
    pub fn identified_sources(&self) -> usize {
        let mut found = vec![false; self.recovery.len()];
        for score in self.matched() {
            found[score.source] = true;
        }
        found.into_iter().filter(|x| *x).count()
    }
}

impl SpectralAnalyzer {
    pub fn params() -> SpectralAnalyzerParams {
        SpectralAnalyzerParams::new()
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn metric(&self) -> SpectralMetric {
        self.metric
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    /// Estimate the one-sided power spectrum with Welch's method
    ///
    /// Segments are weighted with a periodic Hann window, signals shorter than one segment are
    /// zero-padded.
    pub fn psd(&self, samples: ArrayView1<'_, f64>, sample_rate: f64) -> Result<PowerSpectrum> {
        check_sample_rate(sample_rate)?;

        let n = self.segment_len;
        let hop = n - self.overlap;
        let window = Array1::from_shape_fn(n, |i| 0.5 - 0.5 * (2. * PI * i as f64 / n as f64).cos());

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let mut input = fft.make_input_vec();
        let mut spectrum: Vec<Complex64> = fft.make_output_vec();

        let mut power = Array1::<f64>::zeros(n / 2 + 1);
        let mut nsegments = 0;
        let mut start = 0;
        loop {
            let end = (start + n).min(samples.len());
            for (i, slot) in input.iter_mut().enumerate() {
                *slot = if start + i < end {
                    samples[start + i] * window[i]
                } else {
                    0.0
                };
            }
            fft.process(&mut input, &mut spectrum)?;
            for (p, c) in power.iter_mut().zip(spectrum.iter()) {
                *p += c.norm_sqr();
            }
            nsegments += 1;

            start += hop;
            if start + n > samples.len() {
                break;
            }
        }

        power /= nsegments as f64;
        if self.normalize {
            let total = power.sum();
            if total > 0.0 {
                power /= total;
            }
        }

        let frequencies = Array1::from_shape_fn(n / 2 + 1, |k| k as f64 * sample_rate / n as f64);
        Ok(PowerSpectrum { frequencies, power })
    }

    /// Similarity of two spectra in `[0, 1]`, zero when either is silent or not finite
    ///
    /// # Errors
    ///
    /// If the spectra are not defined on the same frequency grid
    pub fn similarity(&self, a: &PowerSpectrum, b: &PowerSpectrum) -> Result<f64> {
        if !a.same_grid(b) {
            return Err(Error::SignalMismatch(format!(
                "power spectra on different grids ({} and {} bins)",
                a.frequencies.len(),
                b.frequencies.len()
            )));
        }

        let value = match self.metric {
            SpectralMetric::Overlap => {
                let norm = (a.total_power() * b.total_power()).sqrt();
                if norm > 0.0 {
                    Zip::from(&a.power)
                        .and(&b.power)
                        .fold(0.0, |acc, p, q| acc + (p * q).sqrt())
                        / norm
                } else {
                    0.0
                }
            }
            SpectralMetric::CrossCorrelation => {
                let norm = (a.power.dot(&a.power) * b.power.dot(&b.power)).sqrt();
                if norm > 0.0 {
                    a.power.dot(&b.power) / norm
                } else {
                    0.0
                }
            }
        };

        // overflowing or corrupted spectra give NaN
        if value.is_finite() {
            Ok(value.clamp(0.0, 1.0))
        } else {
            Ok(0.0)
        }
    }

    /// Assign every component to its best-matching reference source
    ///
    /// Ties go to the lowest source index. Components whose best similarity falls below the
    /// threshold are reported as [`Assignment::Unidentified`].
    pub fn evaluate(
        &self,
        components: &[ArrayView1<'_, f64>],
        references: &[ArrayView1<'_, f64>],
        sample_rate: f64,
    ) -> Result<Evaluation> {
        if references.is_empty() {
            return Err(Error::InvalidParameter(
                "at least one reference source is required".into(),
            ));
        }

        let reference_spectra = references
            .iter()
            .map(|r| self.psd(r.view(), sample_rate))
            .collect::<Result<Vec<_>>>()?;
        let component_spectra = components
            .iter()
            .map(|c| self.psd(c.view(), sample_rate))
            .collect::<Result<Vec<_>>>()?;

        let mut similarity = Array2::zeros((components.len(), references.len()));
        for (i, cs) in component_spectra.iter().enumerate() {
            for (j, rs) in reference_spectra.iter().enumerate() {
                similarity[(i, j)] = self.similarity(cs, rs)?;
            }
        }

        let mut assignments = Vec::with_capacity(components.len());
        for (i, row) in similarity.outer_iter().enumerate() {
            let mut best = 0;
            for (j, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = j;
                }
            }

            if row[best] < self.similarity_threshold {
                assignments.push(Assignment::Unidentified {
                    component: i,
                    best_similarity: row[best],
                });
                continue;
            }

            let peak_frequency_error = match (
                component_spectra[i].peak_frequency(),
                reference_spectra[best].peak_frequency(),
            ) {
                (Some(a), Some(b)) => (a - b).abs(),
                _ => f64::INFINITY,
            };
            assignments.push(Assignment::Matched(QualityScore {
                component: i,
                source: best,
                similarity: row[best],
                correlation: abs_correlation(components[i], references[best]),
                peak_frequency_error,
            }));
        }

        let recovery = Array1::from_shape_fn(references.len(), |j| {
            similarity.column(j).iter().cloned().fold(0.0, f64::max)
        });
        debug!(
            "scored {} components against {} sources, recovery {:?}",
            components.len(),
            references.len(),
            recovery
        );

        Ok(Evaluation {
            assignments,
            similarity,
            recovery,
        })
    }
}

/// Absolute Pearson correlation over the common prefix of both signals
fn abs_correlation(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let a = a.slice(s![..len]);
    let b = b.slice(s![..len]);
    let (ma, mb) = (a.sum() / len as f64, b.sum() / len as f64);

    let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
    Zip::from(&a).and(&b).for_each(|&x, &y| {
        cov += (x - ma) * (y - mb);
        va += (x - ma) * (x - ma);
        vb += (y - mb) * (y - mb);
    });

    if va > 0.0 && vb > 0.0 {
        (cov / (va * vb).sqrt()).abs()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::{rand::SeedableRng, rand_distr::StandardNormal, RandomExt};
    use rand_xoshiro::Xoshiro256Plus;

    const FS: f64 = 1000.;

    fn tone(freq: f64, amplitude: f64, len: usize) -> Array1<f64> {
        Array1::from_shape_fn(len, |n| amplitude * (2. * PI * freq * n as f64 / FS).sin())
    }

    fn analyzer() -> SpectralAnalyzer {
        SpectralAnalyzer::params()
            .segment_len(200)
            .check()
            .unwrap()
    }

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<SpectralAnalyzer>();
        has_autotraits::<SpectralAnalyzerParams>();
        has_autotraits::<Evaluation>();
    }

    #[test]
    fn invalid_params() {
        assert!(SpectralAnalyzer::params().segment_len(1).check().is_err());
        assert!(SpectralAnalyzer::params()
            .segment_len(64)
            .overlap(64)
            .check()
            .is_err());
        assert!(SpectralAnalyzer::params()
            .similarity_threshold(1.5)
            .check()
            .is_err());
        assert_eq!(SpectralAnalyzer::params().check_unwrap().overlap(), 128);
    }

    #[test]
    fn psd_peaks_at_tone() {
        let psd = analyzer().psd(tone(50., 3., 2000).view(), FS).unwrap();
        assert_eq!(psd.power().len(), 101);
        assert_abs_diff_eq!(psd.total_power(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(psd.peak_frequency().unwrap(), 50., epsilon = 1e-9);

        // shorter than a segment
        let psd = analyzer().psd(tone(50., 1., 120).view(), FS).unwrap();
        assert_eq!(psd.power().len(), 101);

        let silent = analyzer().psd(Array1::zeros(500).view(), FS).unwrap();
        assert_eq!(silent.peak_frequency(), None);
        assert_eq!(silent.total_power(), 0.0);
    }

    #[test]
    fn similarity_bounds() {
        for &metric in &[SpectralMetric::Overlap, SpectralMetric::CrossCorrelation] {
            let analyzer = SpectralAnalyzer::params()
                .segment_len(200)
                .metric(metric)
                .check_unwrap();
            let a = analyzer.psd(tone(50., 1., 1000).view(), FS).unwrap();
            let b = analyzer.psd(tone(50., -7., 1000).view(), FS).unwrap();
            let c = analyzer.psd(tone(135., 1., 1000).view(), FS).unwrap();
            let silent = analyzer.psd(Array1::zeros(1000).view(), FS).unwrap();

            assert_abs_diff_eq!(analyzer.similarity(&a, &b).unwrap(), 1.0, epsilon = 1e-9);
            assert!(analyzer.similarity(&a, &c).unwrap() < 1e-6);
            assert_eq!(analyzer.similarity(&a, &silent).unwrap(), 0.0);

            let other_grid = SpectralAnalyzer::params()
                .segment_len(128)
                .check_unwrap()
                .psd(tone(50., 1., 1000).view(), FS)
                .unwrap();
            assert!(matches!(
                analyzer.similarity(&a, &other_grid),
                Err(Error::SignalMismatch(_))
            ));
        }
    }

    #[test]
    fn non_finite_spectra_are_dissimilar() {
        let a = analyzer().psd(tone(50., 1., 1000).view(), FS).unwrap();
        let mut power = a.power().to_owned();
        power[10] = f64::INFINITY;
        let overflowed = PowerSpectrum {
            frequencies: a.frequencies().to_owned(),
            power,
        };

        for &metric in &[SpectralMetric::Overlap, SpectralMetric::CrossCorrelation] {
            let analyzer = SpectralAnalyzer::params()
                .segment_len(200)
                .metric(metric)
                .check_unwrap();
            assert_eq!(analyzer.similarity(&overflowed, &a).unwrap(), 0.0);
            assert_eq!(analyzer.similarity(&overflowed, &overflowed).unwrap(), 0.0);
        }

        let mut corrupted = tone(50., 1., 1000);
        corrupted[300] = f64::NAN;
        let reference = tone(50., 1., 1000);
        let eval = analyzer()
            .evaluate(&[corrupted.view()], &[reference.view()], FS)
            .unwrap();
        assert!(matches!(
            eval.assignments()[0],
            Assignment::Unidentified { best_similarity, .. } if best_similarity == 0.0
        ));
        assert_eq!(eval.score(), 0.0);
    }

    #[test]
    fn evaluate_assigns_best_match() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let s1 = tone(50., 1., 2000);
        let s2 = tone(135., 2., 2000);
        let noise = Array1::random_using(2000, StandardNormal, &mut rng);

        // components are permuted, scaled and sign flipped
        let c1 = &s2 * -0.3;
        let c2 = &s1 * 5.;
        let references = [s1.view(), s2.view()];
        let components = [c1.view(), c2.view(), noise.view()];

        let eval = analyzer().evaluate(&components, &references, FS).unwrap();
        assert_eq!(eval.assignments().len(), 3);
        assert_eq!(eval.similarity_matrix().dim(), (3, 2));

        let first = eval.assignments()[0].score().unwrap();
        assert_eq!(first.source, 1);
        assert_abs_diff_eq!(first.similarity, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(first.correlation, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(first.peak_frequency_error, 0.0, epsilon = 1e-9);
        assert_eq!(eval.assignments()[1].score().unwrap().source, 0);

        assert!(matches!(
            eval.assignments()[2],
            Assignment::Unidentified { component: 2, .. }
        ));
        assert_eq!(eval.identified_sources(), 2);
        assert_abs_diff_eq!(eval.score(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn ties_go_to_lowest_source() {
        let s = tone(80., 1., 1000);
        let references = [s.view(), s.view()];
        let eval = analyzer().evaluate(&[s.view()], &references, FS).unwrap();
        assert_eq!(eval.assignments()[0].score().unwrap().source, 0);

        assert!(analyzer().evaluate(&[s.view()], &[], FS).is_err());
    }
}
