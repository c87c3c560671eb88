//! Fast algorithm for Independent Component Analysis (ICA)

use log::{debug, trace};
use monoica::traits::*;
use ndarray::{Array, Array1, Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_rand::{rand::SeedableRng, rand_distr::Uniform, RandomExt};
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::{IcaError, Result};
use crate::hyperparams::FastIcaValidParams;
use crate::linalg::{sym_decorrelation, whitening};

impl<D: Data<Elem = f64>> Fit<ArrayBase<D, Ix2>, IcaError> for FastIcaValidParams {
    type Object = FastIca;

    /// Fit the model, one sample per row and one observed channel per column
    ///
    /// # Errors
    ///
    /// If the [`FastIca::ncomponents`] is set to a number greater than the minimum of
    /// the number of rows and columns
    ///
    /// If the fixed-point iteration does not converge within `max_iter` iterations
    fn fit(&self, x: &ArrayBase<D, Ix2>) -> Result<Self::Object> {
        let (nsamples, nfeatures) = x.dim();
        if nsamples == 0 {
            return Err(IcaError::NotEnoughSamples);
        }

        // If the number of components is not set, we take the minimum of
        // the number of rows and columns
        let ncomponents = self
            .ncomponents()
            .unwrap_or_else(|| nsamples.min(nfeatures));

        // The number of components cannot be greater than the minimum of
        // the number of rows and columns
        if ncomponents > nsamples.min(nfeatures) || ncomponents == 0 {
            return Err(IcaError::InvalidValue(format!(
                "ncomponents must be in 1..=min({}, {}), got {}",
                nsamples, nfeatures, ncomponents
            )));
        }

        // We center the input by subtracting the mean of its features
        // safe unwrap because we already returned an error on zero samples
        let xmean = x.mean_axis(Axis(0)).unwrap();
        let xcentered = x - &xmean.view().insert_axis(Axis(0));

        // We whiten the matrix to remove any potential correlation between
        // the components
        let k = whitening(&xcentered, ncomponents)?;
        let xwhitened = k.dot(&xcentered.t());

        // We initialize the de-mixing matrix with a uniform distribution
        let w: Array2<f64>;
        if let Some(seed) = self.random_state() {
            let mut rng = Xoshiro256Plus::seed_from_u64(*seed as u64);
            w = Array::random_using((ncomponents, ncomponents), Uniform::new(0., 1.), &mut rng);
        } else {
            w = Array::random((ncomponents, ncomponents), Uniform::new(0., 1.));
        }

        // We find the optimized de-mixing matrix
        let (w, n_iter) = self.ica_parallel(&xwhitened, &w)?;

        // We whiten the de-mixing matrix
        let components = w.dot(&k);

        Ok(FastIca {
            mean: xmean,
            components,
            n_iter,
        })
    }
}

impl FastIcaValidParams {
    // Parallel FastICA, Optimization step
    fn ica_parallel(&self, x: &Array2<f64>, w: &Array2<f64>) -> Result<(Array2<f64>, usize)> {
        let mut w = sym_decorrelation(w)?;

        let p = x.ncols() as f64;
        let mut lim = f64::INFINITY;

        for iteration in 1..=self.max_iter() {
            let (gwtx, g_wtx) = self.gfunc().exec(&w.dot(x));

            let lhs = gwtx.dot(&x.t()).mapv(|x| x / p);
            let rhs = &w * &g_wtx.insert_axis(Axis(1));
            let wnew = sym_decorrelation(&(lhs - rhs))?;

            // `lim` let us check for convergence between the old and
            // new weight values, we want their dot-product to almost equal one
            lim = *wnew
                .outer_iter()
                .zip(w.outer_iter())
                .map(|(a, b)| a.dot(&b))
                .collect::<Array1<f64>>()
                .mapv(|x| (x.abs() - 1.).abs())
                .max()
                .map_err(|_| IcaError::InvalidValue("non-finite unmixing update".into()))?;
            trace!("fast ica iteration {}, residual {:e}", iteration, lim);

            w = wnew;

            if lim < self.tol() {
                debug!("fast ica converged after {} iterations", iteration);
                return Ok((w, iteration));
            }
        }

        Err(IcaError::NotConverged {
            iterations: self.max_iter(),
            residual: lim,
        })
    }
}

/// Fitted FastICA model for recovering the sources
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct FastIca {
    mean: Array1<f64>,
    components: Array2<f64>,
    n_iter: usize,
}

impl FastIca {
    /// Unmixing matrix, one component per row
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Number of fixed-point iterations until convergence
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl<'a, D: Data<Elem = f64>> Predict<&'a ArrayBase<D, Ix2>, Array2<f64>> for FastIca {
    /// Recover the sources, one component per column
    fn predict(&self, x: &'a ArrayBase<D, Ix2>) -> Array2<f64> {
        let xcentered = x - &self.mean.view().insert_axis(Axis(0));
        xcentered.dot(&self.components.t())
    }
}

/// Some standard non-linear functions
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub enum GFunc {
    Logcosh(f64),
    Exp,
    Cube,
}

impl GFunc {
    // Function to select the correct non-linear function and execute it
    // returning a tuple, consisting of the first and second derivatives of the
    // non-linear function
    fn exec(&self, x: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
        match self {
            Self::Cube => Self::cube(x),
            Self::Exp => Self::exp(x),
            Self::Logcosh(alpha) => Self::logcosh(x, *alpha),
        }
    }

    fn cube(x: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
        (
            x.mapv(|x| x.powi(3)),
            x.mapv(|x| 3. * x.powi(2)).mean_axis(Axis(1)).unwrap(),
        )
    }

    fn exp(x: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
        let exp = x.mapv(|x| (-x.powi(2) / 2.).exp());
        (
            x * &exp,
            (x.mapv(|x| 1. - x.powi(2)) * &exp)
                .mean_axis(Axis(1))
                .unwrap(),
        )
    }

    fn logcosh(x: &Array2<f64>, alpha: f64) -> (Array2<f64>, Array1<f64>) {
        let gx = x.mapv(|x| (x * alpha).tanh());
        let g_x = gx.mapv(|x| alpha * (1. - x.powi(2)));

        (gx, g_x.mean_axis(Axis(1)).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monoica::ParamGuard;

    use crate::hyperparams::{FastIcaParams, FastIcaValidParams};
    use ndarray_rand::rand_distr::StudentT;

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<FastIca>();
        has_autotraits::<GFunc>();
        has_autotraits::<FastIcaParams>();
        has_autotraits::<FastIcaValidParams>();
        has_autotraits::<IcaError>();
    }

    // Test to make sure the number of components set cannot be greater
    // that the minimum of the number of rows and columns of the input
    #[test]
    fn test_ncomponents_err() {
        let input = Array::random((4, 4), Uniform::new(0.0, 1.0));
        let ica = FastIca::params().ncomponents(100);
        let ica = ica.fit(&input);
        assert!(ica.is_err());
    }

    // Test to make sure the alpha value of the `GFunc::Logcosh` is between
    // 1 and 2 inclusive
    #[test]
    fn test_logcosh_alpha_err() {
        let input = Array::random((4, 4), Uniform::new(0.0, 1.0));
        let ica = FastIca::params().gfunc(GFunc::Logcosh(10.));
        let ica = ica.fit(&input);
        assert!(ica.is_err());
    }

    #[test]
    fn test_invalid_tolerance() {
        assert!(matches!(
            FastIca::params().tol(-1.).check(),
            Err(IcaError::InvalidTolerance(_))
        ));
        assert!(FastIca::params().max_iter(0).check().is_err());
    }

    // The iteration budget is reported instead of silently returning a half-converged model
    #[test]
    fn test_not_converged() {
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let input = Array::random_using((500, 3), StudentT::new(2.0).unwrap(), &mut rng);
        let ica = FastIca::params()
            .max_iter(1)
            .tol(1e-12)
            .random_state(3)
            .fit(&input);

        match ica {
            Err(IcaError::NotConverged {
                iterations,
                residual,
            }) => {
                assert_eq!(iterations, 1);
                assert!(residual >= 1e-12);
            }
            other => panic!("expected a convergence failure, got {:?}", other),
        }
    }

    // Helper macro that produces test-cases with the pattern test_fast_ica_*
    macro_rules! fast_ica_tests {
        ($($name:ident: $gfunc:expr,)*) => {
            paste::item! {
                $(
                    #[test]
                    fn [<test_fast_ica_$name>]() {
                        test_fast_ica($gfunc);
                    }
                )*
            }
        }
    }

    // Tests to make sure all of the `GFunc`'s non-linear functions and the
    // model itself performs well
    fast_ica_tests! {
        exp: GFunc::Exp, cube: GFunc::Cube, logcosh: GFunc::Logcosh(1.0),
    }

    // Helper function that mixes two signal sources sends it to FastICA
    // and makes sure the model can demix them with considerable amount of
    // accuracy
    fn test_fast_ica(gfunc: GFunc) {
        let nsamples = 1000;

        // Center the data and make it have unit variance
        let center_and_norm = |s: &mut Array2<f64>| {
            let mean = s.mean_axis(Axis(0)).unwrap();
            *s -= &mean.insert_axis(Axis(0));
            let std = s.std_axis(Axis(0), 0.);
            *s /= &std.insert_axis(Axis(0));
        };

        // Creating a square wave signal
        let mut source1 = Array::linspace(0., 100., nsamples);
        source1.mapv_inplace(|x| {
            let tmp = 2. * f64::sin(x);
            if tmp > 0. {
                return 0.;
            }
            -1.
        });

        // Creating noise using Student T distribution
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let source2 = Array::random_using((nsamples, 1), StudentT::new(3.0).unwrap(), &mut rng);

        // Column concatenating both the sources
        let mut sources = concatenate![Axis(1), source1.insert_axis(Axis(1)), source2];
        center_and_norm(&mut sources);

        // Mixing the two sources, one sample per row
        let phi: f64 = 0.6;
        let mixing = array![[phi.cos(), phi.sin()], [phi.sin(), -phi.cos()]];
        let mut mixed = sources.dot(&mixing.t());
        center_and_norm(&mut mixed);

        // We fit and transform using the model to unmix the two sources
        let ica = FastIca::params()
            .ncomponents(2)
            .gfunc(gfunc)
            .max_iter(1000)
            .random_state(42);

        let ica = ica.fit(&mixed).unwrap();
        assert!(ica.n_iter() <= 1000);
        let mut output = ica.predict(&mixed);

        center_and_norm(&mut output);

        // Making sure the model output has the right shape
        assert_eq!(output.shape(), &[1000, 2]);

        // The order of the sources in the ICA output is not deterministic,
        // so we account for that here
        let s1 = sources.column(0);
        let s2 = sources.column(1);
        let mut s1_ = output.column(0);
        let mut s2_ = output.column(1);
        if s1_.dot(&s2).abs() > s1_.dot(&s1).abs() {
            s1_ = output.column(1);
            s2_ = output.column(0);
        }

        let similarity1 = s1.dot(&s1_).abs() / (nsamples as f64);
        let similarity2 = s2.dot(&s2_).abs() / (nsamples as f64);

        // The square wave comes back from the mixture, and so does the noise
        assert!(similarity1 > 0.9);
        assert!(similarity2 > 0.9);
    }
}
