//! Frequency bases
//!
//! A signal of length `n` can be expressed either as cosine/sine coefficients over the
//! non-redundant bins `0..=n/2` ([`Basis::RealSineCosine`]) or as the `n` complex coefficients of
//! the standard discrete Fourier transform ([`Basis::ComplexExponential`]). The coefficients are
//! always carried inside a [`FrequencyRepresentation`] tagged with their basis, and a
//! [`BasisTransform`] refuses representations of another basis.
//!
//! Conventions: with `X[k] = Σ_t x[t] exp(-2πi k t / n)`, the real basis stores
//! `cos[k] = Re X[k]` and `sin[k] = -Im X[k]`, so that
//! `x[t] = 1/n Σ_k c_k (cos[k] cos(2π k t / n) + sin[k] sin(2π k t / n))` with `c_k = 1` for the
//! DC and Nyquist bins and `2` otherwise. Both forward transforms are unnormalized, the inverses
//! scale by `1 / n`.
use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, ArrayView1, Zip};
use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Set of functions used to represent a signal in the frequency domain
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Basis {
    /// Real cosine and sine functions, one pair per frequency bin
    RealSineCosine,
    /// Complex exponentials, the standard DFT
    ComplexExponential,
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Basis::RealSineCosine => write!(f, "real sine/cosine"),
            Basis::ComplexExponential => write!(f, "complex exponential"),
        }
    }
}

/// Raw coefficients, the variant is the basis tag
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum Coefficients {
    SineCosine { cos: Array1<f64>, sin: Array1<f64> },
    Exponential(Array1<Complex64>),
}

/// A signal expressed in one basis
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRepresentation {
    len: usize,
    coefficients: Coefficients,
}

/// Number of non-redundant bins of a real signal with `len` samples
pub fn num_real_bins(len: usize) -> usize {
    len / 2 + 1
}

impl FrequencyRepresentation {
    /// Build a real-basis representation of a signal with `len` samples
    ///
    /// # Errors
    ///
    /// If `cos` or `sin` do not hold exactly `len / 2 + 1` bins
    pub fn sine_cosine(len: usize, cos: Array1<f64>, sin: Array1<f64>) -> Result<Self> {
        let nbins = num_real_bins(len);
        if cos.len() != nbins || sin.len() != nbins {
            return Err(Error::SignalMismatch(format!(
                "a signal of {} samples has {} real bins, got {} cosine and {} sine coefficients",
                len,
                nbins,
                cos.len(),
                sin.len()
            )));
        }

        Ok(FrequencyRepresentation {
            len,
            coefficients: Coefficients::SineCosine { cos, sin },
        })
    }

    /// Build a complex-basis representation from all `n` DFT coefficients
    pub fn exponential(coefficients: Array1<Complex64>) -> Self {
        FrequencyRepresentation {
            len: coefficients.len(),
            coefficients: Coefficients::Exponential(coefficients),
        }
    }

    pub fn basis(&self) -> Basis {
        match self.coefficients {
            Coefficients::SineCosine { .. } => Basis::RealSineCosine,
            Coefficients::Exponential(_) => Basis::ComplexExponential,
        }
    }

    /// Length of the time-domain signal
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Pack a real-basis representation into exactly `len` reals: cosine bins `0..=n/2`
    /// followed by the sine bins `1..(n+1)/2` (the DC and Nyquist sines of a real signal vanish)
    pub fn to_real_vector(&self) -> Result<Array1<f64>> {
        match &self.coefficients {
            Coefficients::SineCosine { cos, sin } => {
                let nsin = (self.len + 1) / 2;
                let mut packed = Vec::with_capacity(self.len);
                packed.extend(cos.iter().cloned());
                packed.extend(sin.iter().skip(1).take(nsin.saturating_sub(1)).cloned());

                Ok(Array1::from(packed))
            }
            Coefficients::Exponential(_) => Err(Error::BasisMismatch {
                expected: Some(Basis::RealSineCosine),
                found: Some(Basis::ComplexExponential),
            }),
        }
    }

    /// Inverse of [`to_real_vector`](Self::to_real_vector)
    pub fn from_real_vector(len: usize, packed: ArrayView1<'_, f64>) -> Result<Self> {
        if len == 0 {
            return Err(Error::InvalidParameter(
                "packed real coefficients need at least one entry".to_string(),
            ));
        }
        if packed.len() != len {
            return Err(Error::SignalMismatch(format!(
                "packed real coefficients should have {} entries, got {}",
                len,
                packed.len()
            )));
        }
        let nbins = num_real_bins(len);
        let cos = packed.slice(s![..nbins]).to_owned();
        let mut sin = Array1::zeros(nbins);
        for (k, &v) in packed.slice(s![nbins..]).iter().enumerate() {
            sin[k + 1] = v;
        }

        Self::sine_cosine(len, cos, sin)
    }

    /// Complex coefficients of the non-redundant bins `0..=n/2`, in either basis
    ///
    /// Only meaningful for real time-domain signals, whose remaining bins are the complex
    /// conjugates of these.
    pub fn half_spectrum(&self) -> Array1<Complex64> {
        match &self.coefficients {
            Coefficients::SineCosine { cos, sin } => {
                Zip::from(cos).and(sin).map_collect(|&c, &s| Complex64::new(c, -s))
            }
            Coefficients::Exponential(coeffs) => coeffs
                .slice(s![..num_real_bins(self.len).min(coeffs.len())])
                .to_owned(),
        }
    }

    /// Build a representation of a real signal with `len` samples from its non-redundant bins
    ///
    /// The complex basis is Hermitian-extended to all `n` bins.
    pub fn from_half_spectrum(
        basis: Basis,
        len: usize,
        half: ArrayView1<'_, Complex64>,
    ) -> Result<Self> {
        let nbins = num_real_bins(len);
        if half.len() != nbins {
            return Err(Error::SignalMismatch(format!(
                "a signal of {} samples has {} real bins, got {}",
                len,
                nbins,
                half.len()
            )));
        }

        match basis {
            Basis::RealSineCosine => Self::sine_cosine(
                len,
                half.mapv(|c| c.re),
                half.mapv(|c| -c.im),
            ),
            Basis::ComplexExponential => {
                let full = Array1::from_shape_fn(len, |k| {
                    if k < nbins {
                        half[k]
                    } else {
                        half[len - k].conj()
                    }
                });

                Ok(Self::exponential(full))
            }
        }
    }
}

enum Plan {
    Real {
        forward: Arc<dyn RealToComplex<f64>>,
        inverse: Arc<dyn ComplexToReal<f64>>,
    },
    Complex {
        forward: Arc<dyn Fft<f64>>,
        inverse: Arc<dyn Fft<f64>>,
    },
}

/// Forward and inverse transforms between the time domain and one basis, for one signal length
pub struct BasisTransform {
    basis: Basis,
    len: usize,
    tolerance: f64,
    plan: Plan,
}

impl fmt::Debug for BasisTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasisTransform")
            .field("basis", &self.basis)
            .field("len", &self.len)
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl BasisTransform {
    /// Plan the transforms for signals of `len` samples
    ///
    /// # Errors
    ///
    /// If `len` is zero
    pub fn new(basis: Basis, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::InvalidParameter(
                "transform length must be positive".into(),
            ));
        }

        let plan = match basis {
            Basis::RealSineCosine => {
                let mut planner = RealFftPlanner::<f64>::new();
                Plan::Real {
                    forward: planner.plan_fft_forward(len),
                    inverse: planner.plan_fft_inverse(len),
                }
            }
            Basis::ComplexExponential => {
                let mut planner = FftPlanner::<f64>::new();
                Plan::Complex {
                    forward: planner.plan_fft_forward(len),
                    inverse: planner.plan_fft_inverse(len),
                }
            }
        };

        Ok(BasisTransform {
            basis,
            len,
            tolerance: 1e-9,
            plan,
        })
    }

    /// Set the round-trip tolerance, relative to the peak magnitude of the signal
    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                tolerance
            )));
        }
        self.tolerance = tolerance;

        Ok(self)
    }

    pub fn basis(&self) -> Basis {
        self.basis
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.len {
            return Err(Error::SignalMismatch(format!(
                "transform planned for {} samples, got {}",
                self.len, len
            )));
        }

        Ok(())
    }

    fn check_basis(&self, rep: &FrequencyRepresentation) -> Result<()> {
        if rep.basis() != self.basis {
            return Err(Error::BasisMismatch {
                expected: Some(self.basis),
                found: Some(rep.basis()),
            });
        }
        self.check_len(rep.len())
    }

    /// Decompose a real signal
    pub fn forward(&self, x: ArrayView1<'_, f64>) -> Result<FrequencyRepresentation> {
        self.check_len(x.len())?;

        match &self.plan {
            Plan::Real { forward, .. } => {
                let mut input = x.to_vec();
                let mut spectrum = forward.make_output_vec();
                forward.process(&mut input, &mut spectrum)?;

                let cos = spectrum.iter().map(|c| c.re).collect::<Array1<_>>();
                let sin = spectrum.iter().map(|c| -c.im).collect::<Array1<_>>();
                FrequencyRepresentation::sine_cosine(self.len, cos, sin)
            }
            Plan::Complex { forward, .. } => {
                let mut buffer = x.iter().map(|&v| Complex64::new(v, 0.)).collect::<Vec<_>>();
                forward.process(&mut buffer);

                Ok(FrequencyRepresentation::exponential(Array1::from(buffer)))
            }
        }
    }

    /// Decompose a complex signal, only available in the complex basis
    pub fn forward_complex(&self, x: ArrayView1<'_, Complex64>) -> Result<FrequencyRepresentation> {
        self.check_len(x.len())?;

        match &self.plan {
            Plan::Complex { forward, .. } => {
                let mut buffer = x.to_vec();
                forward.process(&mut buffer);

                Ok(FrequencyRepresentation::exponential(Array1::from(buffer)))
            }
            Plan::Real { .. } => Err(Error::BasisMismatch {
                expected: Some(Basis::ComplexExponential),
                found: Some(self.basis),
            }),
        }
    }

    /// Reconstruct a real signal
    ///
    /// For the complex basis this is the real part of [`inverse_complex`](Self::inverse_complex).
    pub fn inverse(&self, rep: &FrequencyRepresentation) -> Result<Array1<f64>> {
        self.check_basis(rep)?;

        match (&self.plan, &rep.coefficients) {
            (Plan::Real { inverse, .. }, Coefficients::SineCosine { cos, sin }) => {
                let mut spectrum = Zip::from(cos)
                    .and(sin)
                    .map_collect(|&c, &s| Complex64::new(c, -s))
                    .to_vec();
                // the DC and Nyquist bins of a real signal are real
                spectrum[0].im = 0.;
                if self.len % 2 == 0 {
                    let last = spectrum.len() - 1;
                    spectrum[last].im = 0.;
                }
                let mut output = inverse.make_output_vec();
                inverse.process(&mut spectrum, &mut output)?;

                let scale = 1. / self.len as f64;
                Ok(output.into_iter().map(|v| v * scale).collect())
            }
            _ => Ok(self.inverse_complex(rep)?.mapv(|c| c.re)),
        }
    }

    /// Reconstruct a complex signal, only available in the complex basis
    pub fn inverse_complex(&self, rep: &FrequencyRepresentation) -> Result<Array1<Complex64>> {
        self.check_basis(rep)?;

        match (&self.plan, &rep.coefficients) {
            (Plan::Complex { inverse, .. }, Coefficients::Exponential(coeffs)) => {
                let mut buffer = coeffs.to_vec();
                inverse.process(&mut buffer);

                let scale = 1. / self.len as f64;
                Ok(buffer.into_iter().map(|c| c * scale).collect())
            }
            _ => Err(Error::BasisMismatch {
                expected: Some(Basis::ComplexExponential),
                found: Some(self.basis),
            }),
        }
    }

    /// Maximum absolute error of `inverse(forward(x))`
    pub fn round_trip_error(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        let reconstructed = self.inverse(&self.forward(x)?)?;

        Ok(Zip::from(&x)
            .and(&reconstructed)
            .fold(0f64, |acc, a, b| acc.max((a - b).abs())))
    }

    /// Check the round-trip law on `x` against the configured tolerance
    ///
    /// Returns the observed error.
    pub fn verify(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        let error = self.round_trip_error(x)?;
        let scale = x.iter().fold(1f64, |acc, v| acc.max(v.abs()));
        if error > self.tolerance * scale {
            return Err(Error::ToleranceExceeded {
                error,
                tolerance: self.tolerance * scale,
            });
        }

        Ok(error)
    }
}
