//! FastICA for complex-valued records
//!
//! Fixed-point iteration of Bingham and Hyvärinen for circular complex sources. The records are
//! centered and whitened with the Hermitian covariance, then every unmixing row `w` is updated as
//!
//! ```text
//! w <- E{ y g(|y|²) z^* } - E{ g(|y|²) + |y|² g'(|y|²) } w,    y = w z
//! ```
//!
//! followed by a symmetric decorrelation `W <- (W W^H)^{-1/2} W`.

use log::{debug, trace};
use monoica::traits::*;
use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Ix2, Zip};
use ndarray_rand::{rand::SeedableRng, rand_distr::Uniform, RandomExt};
use ndarray_stats::QuantileExt;
use num_complex::Complex64;
use rand_xoshiro::Xoshiro256Plus;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{IcaError, Result};
use crate::hyperparams::ComplexFastIcaValidParams;
use crate::linalg::{adjoint, sym_decorrelation, whitening};

impl<D: Data<Elem = Complex64>> Fit<ArrayBase<D, Ix2>, IcaError> for ComplexFastIcaValidParams {
    type Object = ComplexFastIca;

    /// Fit the model, one sample per row and one observed channel per column
    ///
    /// # Errors
    ///
    /// * `NotEnoughSamples` on empty records
    /// * `InvalidValue` if `ncomponents` is zero or larger than the rank the records allow
    /// * `NotConverged` if the fixed point is not reached within `max_iter` iterations
    fn fit(&self, x: &ArrayBase<D, Ix2>) -> Result<Self::Object> {
        let (nsamples, nfeatures) = x.dim();
        if nsamples == 0 {
            return Err(IcaError::NotEnoughSamples);
        }

        let ncomponents = self
            .ncomponents()
            .unwrap_or_else(|| nsamples.min(nfeatures));
        if ncomponents > nsamples.min(nfeatures) || ncomponents == 0 {
            return Err(IcaError::InvalidValue(format!(
                "ncomponents must be in 1..=min({}, {}), got {}",
                nsamples, nfeatures, ncomponents
            )));
        }

        // safe unwrap because we already returned an error on zero samples
        let xmean = x.mean_axis(Axis(0)).unwrap();
        let xcentered = x - &xmean.view().insert_axis(Axis(0));

        let k = whitening(&xcentered, ncomponents)?;
        let xwhitened = k.dot(&xcentered.t());

        let (re, im): (Array2<f64>, Array2<f64>) = match self.random_state() {
            Some(seed) => {
                let mut rng = Xoshiro256Plus::seed_from_u64(*seed as u64);
                (
                    Array::random_using((ncomponents, ncomponents), Uniform::new(0., 1.), &mut rng),
                    Array::random_using((ncomponents, ncomponents), Uniform::new(0., 1.), &mut rng),
                )
            }
            None => (
                Array::random((ncomponents, ncomponents), Uniform::new(0., 1.)),
                Array::random((ncomponents, ncomponents), Uniform::new(0., 1.)),
            ),
        };
        let w = Zip::from(&re)
            .and(&im)
            .map_collect(|&a, &b| Complex64::new(a, b));

        let (w, n_iter) = self.ica_parallel(&xwhitened, &w)?;
        let components = w.dot(&k);

        Ok(ComplexFastIca {
            mean: xmean,
            components,
            n_iter,
        })
    }
}

impl ComplexFastIcaValidParams {
    fn ica_parallel(
        &self,
        z: &Array2<Complex64>,
        w: &Array2<Complex64>,
    ) -> Result<(Array2<Complex64>, usize)> {
        let mut w = sym_decorrelation(w)?;

        let p = z.ncols() as f64;
        let zh = adjoint(z);
        let mut lim = f64::INFINITY;

        for iteration in 1..=self.max_iter() {
            let y = w.dot(z);
            let u = y.mapv(|v| v.norm_sqr());
            let (g, g_) = self.gfunc().exec(&u);

            let yg = Zip::from(&y).and(&g).map_collect(|&y, &g| y * g);
            let lhs = yg.dot(&zh).mapv(|v| v / p);

            let slope = Zip::from(&g)
                .and(&g_)
                .and(&u)
                .map_collect(|&g, &g_, &u| g + u * g_)
                // the row axis is never empty here
                .mean_axis(Axis(1))
                .unwrap()
                .mapv(Complex64::from);
            let rhs = &w * &slope.insert_axis(Axis(1));
            let wnew = sym_decorrelation(&(lhs - rhs))?;

            lim = *wnew
                .outer_iter()
                .zip(w.outer_iter())
                .map(|(a, b)| {
                    Zip::from(&a)
                        .and(&b)
                        .fold(Complex64::new(0., 0.), |acc, &a, &b| acc + a * b.conj())
                })
                .map(|c| (c.norm() - 1.).abs())
                .collect::<Array1<f64>>()
                .max()
                .map_err(|_| IcaError::InvalidValue("non-finite unmixing update".into()))?;
            trace!("complex fast ica iteration {}, residual {:e}", iteration, lim);

            w = wnew;

            if lim < self.tol() {
                debug!("complex fast ica converged after {} iterations", iteration);
                return Ok((w, iteration));
            }
        }

        Err(IcaError::NotConverged {
            iterations: self.max_iter(),
            residual: lim,
        })
    }
}

/// Fitted complex FastICA model
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexFastIca {
    mean: Array1<Complex64>,
    components: Array2<Complex64>,
    n_iter: usize,
}

impl ComplexFastIca {
    /// Unmixing matrix, one component per row
    pub fn components(&self) -> &Array2<Complex64> {
        &self.components
    }

    pub fn mean(&self) -> &Array1<Complex64> {
        &self.mean
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl<'a, D: Data<Elem = Complex64>> Predict<&'a ArrayBase<D, Ix2>, Array2<Complex64>>
    for ComplexFastIca
{
    /// Recover the sources, one component per column
    fn predict(&self, x: &'a ArrayBase<D, Ix2>) -> Array2<Complex64> {
        let xcentered = x - &self.mean.view().insert_axis(Axis(0));
        xcentered.dot(&self.components.t())
    }
}

/// Contrast functions for circular complex sources, evaluated on `u = |y|²`
///
/// The parameter is a small smoothing constant `a > 0`.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub enum ComplexGFunc {
    /// `G(u) = sqrt(a + u)`
    Sqrt(f64),
    /// `G(u) = log(a + u)`
    Log(f64),
}

impl ComplexGFunc {
    pub fn smoothing(&self) -> f64 {
        match *self {
            Self::Sqrt(a) | Self::Log(a) => a,
        }
    }

    // first and second derivative of G, elementwise
    fn exec(&self, u: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        match *self {
            Self::Sqrt(a) => (
                u.mapv(|u| 0.5 / (a + u).sqrt()),
                u.mapv(|u| -0.25 / (a + u).powf(1.5)),
            ),
            Self::Log(a) => (
                u.mapv(|u| 1. / (a + u)),
                u.mapv(|u| -1. / (a + u).powi(2)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparams::ComplexFastIcaParams;
    use approx::assert_abs_diff_eq;
    use monoica::ParamGuard;
    use ndarray_rand::rand::Rng;
    use std::f64::consts::PI;

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<ComplexFastIca>();
        has_autotraits::<ComplexGFunc>();
        has_autotraits::<ComplexFastIcaParams>();
        has_autotraits::<ComplexFastIcaValidParams>();
    }

    #[test]
    fn contrast_derivatives() {
        let u = array![[0.0, 0.5, 3.0]];
        let h = 1e-6;
        for gfunc in [ComplexGFunc::Sqrt(0.1), ComplexGFunc::Log(0.2)].iter() {
            let (_, g_) = gfunc.exec(&u);
            let (g_plus, _) = gfunc.exec(&u.mapv(|u| u + h));
            let (g_minus, _) = gfunc.exec(&u.mapv(|u| u - h));
            let numeric = (&g_plus - &g_minus) / (2. * h);
            assert_abs_diff_eq!(numeric, g_, epsilon = 1e-5);
        }
        assert_eq!(ComplexGFunc::Log(0.3).smoothing(), 0.3);
    }

    #[test]
    fn invalid_params() {
        assert!(ComplexFastIca::params()
            .gfunc(ComplexGFunc::Sqrt(0.))
            .check()
            .is_err());
        assert!(ComplexFastIca::params().tol(f64::NAN).check().is_err());
        assert!(ComplexFastIca::params().max_iter(0).check().is_err());

        let x = Array2::from_elem((3, 3), Complex64::new(1., 0.));
        assert!(ComplexFastIca::params().ncomponents(4).fit(&x).is_err());
        let empty = Array2::<Complex64>::zeros((0, 2));
        assert!(matches!(
            ComplexFastIca::params().fit(&empty),
            Err(IcaError::NotEnoughSamples)
        ));
    }

    // Two circular sources with random phases and non-Gaussian moduli are mixed by a complex
    // matrix; the recovered components must match the sources up to scale and phase.
    #[test]
    fn separates_complex_mixture() {
        let nsamples = 2000;
        let mut rng = Xoshiro256Plus::seed_from_u64(42);

        let mut sources = Array2::<Complex64>::zeros((nsamples, 2));
        for mut row in sources.outer_iter_mut() {
            // exponential modulus and a sparse, spiky one
            let r0: f64 = -(1. - rng.gen::<f64>()).ln();
            let r1: f64 = if rng.gen::<f64>() < 0.1 {
                rng.gen_range(2.0..6.0)
            } else {
                rng.gen_range(0.0..0.3)
            };
            row[0] = Complex64::from_polar(r0, 2. * PI * rng.gen::<f64>());
            row[1] = Complex64::from_polar(r1, 2. * PI * rng.gen::<f64>());
        }

        let mixing = array![
            [Complex64::new(1.0, 0.5), Complex64::new(0.3, -0.8)],
            [Complex64::new(-0.4, 0.2), Complex64::new(0.9, 0.1)]
        ];
        let observed = sources.dot(&mixing.t());

        let ica = ComplexFastIca::params()
            .ncomponents(2)
            .max_iter(1000)
            .random_state(7)
            .fit(&observed)
            .unwrap();
        let output = ica.predict(&observed);
        assert_eq!(output.dim(), (nsamples, 2));

        // absolute normalized correlation between every output and every source
        let corr = |a: ndarray::ArrayView1<Complex64>, b: ndarray::ArrayView1<Complex64>| {
            let ma = a.mean().unwrap();
            let mb = b.mean().unwrap();
            let mut num = Complex64::new(0., 0.);
            let (mut na, mut nb) = (0., 0.);
            for (&x, &y) in a.iter().zip(b.iter()) {
                num += (x - ma) * (y - mb).conj();
                na += (x - ma).norm_sqr();
                nb += (y - mb).norm_sqr();
            }
            num.norm() / (na * nb).sqrt()
        };

        for output in output.columns() {
            let best = sources
                .columns()
                .into_iter()
                .map(|s| corr(output, s))
                .fold(0., f64::max);
            assert!(best > 0.9, "best correlation {}", best);
        }
    }
}
