//! Pseudo-channels for single-sensor ICA
//!
//! A single recording offers one observation channel. Cutting it into windows gives one
//! pseudo-channel per window, `x_k(t) = x(k * hop + t)`. When the sources move, every window
//! sees them with a different gain, `x_k = Σ_j a_j(k) s_j`, which is the diversity ICA needs.
//!
//! A time-domain layout can add delayed copies of every window, `x_{k,d}(t) = x(k * hop + t + d)`.
//! A tone whose phase drifts from window to window then still lies in a fixed plane, spanned by
//! its sine and cosine, instead of turning up as a new direction in every window.
//!
//! The windows are kept as they are for the time domain, or expressed in a frequency basis.

use log::debug;
use monoica::{Basis, BasisTransform};
use monoica_datasets::Mixture;
use ndarray::{Array2, ArrayView1, ArrayView2};
use num_complex::Complex64;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{IcaError, Result};

/// Formulation of the separation problem
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IcaVariant {
    /// Real FastICA on the window samples
    TimeDomain,
    /// Real FastICA on the sine/cosine coefficients of every window
    FrequencyReal,
    /// Complex FastICA on the complex exponential coefficients of every window
    FrequencyComplex,
}

impl IcaVariant {
    /// Frequency basis the variant operates in, `None` for the time domain
    pub fn basis(&self) -> Option<Basis> {
        match self {
            IcaVariant::TimeDomain => None,
            IcaVariant::FrequencyReal => Some(Basis::RealSineCosine),
            IcaVariant::FrequencyComplex => Some(Basis::ComplexExponential),
        }
    }

    /// Whether the records handed to the solver are complex
    pub fn is_complex(&self) -> bool {
        *self == IcaVariant::FrequencyComplex
    }
}

/// How a recording is cut into pseudo-channels
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLayout {
    window_len: usize,
    hop: usize,
    lags: usize,
}

impl WindowLayout {
    /// One pseudo-channel per window
    ///
    /// # Errors
    ///
    /// If the window length or the hop is zero
    pub fn new(window_len: usize, hop: usize) -> Result<Self> {
        if window_len == 0 || hop == 0 {
            return Err(IcaError::InvalidValue(format!(
                "window length and hop must be positive, got {} and {}",
                window_len, hop
            )));
        }

        Ok(WindowLayout {
            window_len,
            hop,
            lags: 1,
        })
    }

    /// Follow every window by `lags - 1` copies delayed by one more sample each
    ///
    /// # Errors
    ///
    /// If `lags` is zero
    pub fn with_lags(mut self, lags: usize) -> Result<Self> {
        if lags == 0 {
            return Err(IcaError::InvalidValue(
                "a window needs at least one lag".into(),
            ));
        }
        self.lags = lags;

        Ok(self)
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of pseudo-channels cut from every window
    pub fn lags(&self) -> usize {
        self.lags
    }

    // samples covered by a window and its delayed copies
    fn span(&self) -> usize {
        self.window_len + self.lags - 1
    }

    /// Number of complete windows, delayed copies included, in a signal of `len` samples
    pub fn num_windows(&self, len: usize) -> usize {
        if len < self.span() {
            0
        } else {
            (len - self.span()) / self.hop + 1
        }
    }

    /// Number of pseudo-channels in a signal of `len` samples
    pub fn num_channels(&self, len: usize) -> usize {
        self.num_windows(len) * self.lags
    }

    /// Time-lag embedding, one pseudo-channel per column
    ///
    /// Column `k * lags + d` holds window `k` delayed by `d` samples.
    ///
    /// # Errors
    ///
    /// If the signal is shorter than one window
    pub fn embed(&self, x: ArrayView1<'_, f64>) -> Result<Array2<f64>> {
        let nwindows = self.num_windows(x.len());
        if nwindows == 0 {
            return Err(IcaError::InvalidValue(format!(
                "a signal of {} samples does not fit a window of {} samples and {} lags",
                x.len(),
                self.window_len,
                self.lags
            )));
        }

        Ok(Array2::from_shape_fn(
            (self.window_len, nwindows * self.lags),
            |(t, c)| x[(c / self.lags) * self.hop + c % self.lags + t],
        ))
    }
}

/// Records handed to an ICA solver, one sample per row and one pseudo-channel per column
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum Records {
    Real(Array2<f64>),
    Complex(Array2<Complex64>),
}

impl Records {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Records::Real(r) => r.dim(),
            Records::Complex(r) => r.dim(),
        }
    }

    pub fn as_real(&self) -> Option<ArrayView2<'_, f64>> {
        match self {
            Records::Real(r) => Some(r.view()),
            Records::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<ArrayView2<'_, Complex64>> {
        match self {
            Records::Real(_) => None,
            Records::Complex(r) => Some(r.view()),
        }
    }
}

/// Windowed recording, tagged with the basis its records are expressed in
///
/// * no basis: the window samples
/// * [`Basis::RealSineCosine`]: `window_len` packed sine/cosine coefficients per window
/// * [`Basis::ComplexExponential`]: the `window_len / 2 + 1` non-redundant complex bins per window
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralEmbedding {
    basis: Option<Basis>,
    layout: WindowLayout,
    sample_rate: f64,
    signal_len: usize,
    num_sources: Option<usize>,
    records: Records,
}

impl SpectralEmbedding {
    /// Embed the observed channel of a mixture
    ///
    /// The number of sources that went into the mixture is remembered and becomes the default
    /// number of components.
    pub fn new(mixture: &Mixture, layout: WindowLayout, basis: Option<Basis>) -> Result<Self> {
        let mut embedding =
            Self::from_signal(mixture.samples(), mixture.sample_rate(), layout, basis)?;
        embedding.num_sources = Some(mixture.num_sources());

        Ok(embedding)
    }

    /// Embed a bare recording
    ///
    /// # Errors
    ///
    /// * If the signal does not fit one window
    /// * If a frequency basis is asked for a layout with delayed copies
    pub fn from_signal(
        samples: ArrayView1<'_, f64>,
        sample_rate: f64,
        layout: WindowLayout,
        basis: Option<Basis>,
    ) -> Result<Self> {
        if basis.is_some() && layout.lags() > 1 {
            return Err(IcaError::InvalidValue(format!(
                "frequency records take one channel per window, got {} lags",
                layout.lags()
            )));
        }
        let windows = layout.embed(samples)?;
        let nchannels = windows.ncols();
        let window_len = layout.window_len();

        let records = match basis {
            None => Records::Real(windows),
            Some(Basis::RealSineCosine) => {
                let transform = BasisTransform::new(Basis::RealSineCosine, window_len)?;
                let mut records = Array2::zeros((window_len, nchannels));
                for (window, mut column) in windows.columns().into_iter().zip(records.columns_mut())
                {
                    column.assign(&transform.forward(window)?.to_real_vector()?);
                }
                Records::Real(records)
            }
            Some(Basis::ComplexExponential) => {
                let transform = BasisTransform::new(Basis::ComplexExponential, window_len)?;
                let mut records = Array2::zeros((window_len / 2 + 1, nchannels));
                for (window, mut column) in windows.columns().into_iter().zip(records.columns_mut())
                {
                    column.assign(&transform.forward(window)?.half_spectrum());
                }
                Records::Complex(records)
            }
        };
        debug!(
            "embedded {} samples into {} channels of {} ({} records per channel, basis {:?})",
            samples.len(),
            nchannels,
            window_len,
            records.dim().0,
            basis
        );

        Ok(SpectralEmbedding {
            basis,
            layout,
            sample_rate,
            signal_len: samples.len(),
            num_sources: None,
            records,
        })
    }

    pub fn basis(&self) -> Option<Basis> {
        self.basis
    }

    pub fn layout(&self) -> WindowLayout {
        self.layout
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Length of the embedded recording
    pub fn signal_len(&self) -> usize {
        self.signal_len
    }

    pub fn num_sources(&self) -> Option<usize> {
        self.num_sources
    }

    /// Number of pseudo-channels handed to the solver
    pub fn num_channels(&self) -> usize {
        self.records.dim().1
    }

    pub fn records(&self) -> &Records {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use monoica::FrequencyRepresentation;
    use ndarray::Array1;

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<IcaVariant>();
        has_autotraits::<WindowLayout>();
        has_autotraits::<Records>();
        has_autotraits::<SpectralEmbedding>();
    }

    #[test]
    fn variant_bases() {
        assert_eq!(IcaVariant::TimeDomain.basis(), None);
        assert_eq!(
            IcaVariant::FrequencyReal.basis(),
            Some(Basis::RealSineCosine)
        );
        assert_eq!(
            IcaVariant::FrequencyComplex.basis(),
            Some(Basis::ComplexExponential)
        );
        assert!(IcaVariant::FrequencyComplex.is_complex());
        assert!(!IcaVariant::FrequencyReal.is_complex());
    }

    #[test]
    fn windows_follow_the_hop() {
        assert!(WindowLayout::new(0, 1).is_err());
        assert!(WindowLayout::new(4, 0).is_err());

        let layout = WindowLayout::new(4, 3).unwrap();
        assert_eq!(layout.num_windows(3), 0);
        assert_eq!(layout.num_windows(4), 1);
        assert_eq!(layout.num_windows(10), 3);

        let x = Array1::range(0., 10., 1.);
        let windows = layout.embed(x.view()).unwrap();
        assert_eq!(windows.dim(), (4, 3));
        assert_eq!(windows.column(0), array![0., 1., 2., 3.]);
        assert_eq!(windows.column(2), array![6., 7., 8., 9.]);

        assert!(layout.embed(x.slice(s![..3])).is_err());
    }

    #[test]
    fn delayed_copies_follow_each_window() {
        assert!(WindowLayout::new(4, 4).unwrap().with_lags(0).is_err());

        let layout = WindowLayout::new(4, 4).unwrap().with_lags(2).unwrap();
        assert_eq!(layout.lags(), 2);
        assert_eq!(layout.num_windows(4), 0);
        assert_eq!(layout.num_windows(5), 1);
        assert_eq!(layout.num_windows(12), 2);
        assert_eq!(layout.num_channels(12), 4);

        let x = Array1::range(0., 12., 1.);
        let channels = layout.embed(x.view()).unwrap();
        assert_eq!(channels.dim(), (4, 4));
        assert_eq!(channels.column(0), array![0., 1., 2., 3.]);
        assert_eq!(channels.column(1), array![1., 2., 3., 4.]);
        assert_eq!(channels.column(2), array![4., 5., 6., 7.]);
        assert_eq!(channels.column(3), array![5., 6., 7., 8.]);

        let embedding = SpectralEmbedding::from_signal(x.view(), 10., layout, None).unwrap();
        assert_eq!(embedding.num_channels(), 4);
        assert!(matches!(
            SpectralEmbedding::from_signal(x.view(), 10., layout, Some(Basis::RealSineCosine)),
            Err(IcaError::InvalidValue(_))
        ));
    }

    #[test]
    fn frequency_records_invert_to_windows() {
        let x = Array1::from_shape_fn(96, |n| (0.3 * n as f64).sin() + 0.01 * n as f64);
        let layout = WindowLayout::new(32, 16).unwrap();

        let real = SpectralEmbedding::from_signal(
            x.view(),
            100.,
            layout,
            Some(Basis::RealSineCosine),
        )
        .unwrap();
        assert_eq!(real.records().dim(), (32, 5));
        assert_eq!(real.num_sources(), None);
        assert_eq!(real.signal_len(), 96);

        let transform = BasisTransform::new(Basis::RealSineCosine, 32).unwrap();
        let records = real.records().as_real().unwrap();
        let rep = FrequencyRepresentation::from_real_vector(32, records.column(2)).unwrap();
        let window = transform.inverse(&rep).unwrap();
        assert_abs_diff_eq!(window, x.slice(s![32..64]), epsilon = 1e-10);

        let complex = SpectralEmbedding::from_signal(
            x.view(),
            100.,
            layout,
            Some(Basis::ComplexExponential),
        )
        .unwrap();
        assert_eq!(complex.records().dim(), (17, 5));
        assert!(complex.records().as_real().is_none());

        let transform = BasisTransform::new(Basis::ComplexExponential, 32).unwrap();
        let records = complex.records().as_complex().unwrap();
        let rep = FrequencyRepresentation::from_half_spectrum(
            Basis::ComplexExponential,
            32,
            records.column(4),
        )
        .unwrap();
        let window = transform.inverse(&rep).unwrap();
        assert_abs_diff_eq!(window, x.slice(s![64..96]), epsilon = 1e-10);
    }
}
