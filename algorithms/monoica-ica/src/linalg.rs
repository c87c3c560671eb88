//! Eigendecomposition based helpers shared by the real and complex solvers
//!
//! Everything here works for `f64` and `Complex64` alike, the transposes being conjugate
//! transposes.
use std::cmp::Ordering;

use log::debug;
use nalgebra::{ComplexField, DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis, LinalgScalar};

use crate::error::{IcaError, Result};

/// Scalars the solvers operate on
pub(crate) trait Scalar: ComplexField<RealField = f64> + LinalgScalar + Copy {}

impl<T: ComplexField<RealField = f64> + LinalgScalar + Copy> Scalar for T {}

/// Conjugate transpose
pub(crate) fn adjoint<T: Scalar>(a: &Array2<T>) -> Array2<T> {
    a.t().mapv(|x| x.conjugate())
}

/// Eigendecomposition of a symmetric (or Hermitian) matrix
///
/// Eigenvalues are sorted in descending order, the eigenvectors are the matching columns.
pub(crate) fn eigh<T: Scalar>(a: &Array2<T>) -> Result<(Array1<f64>, Array2<T>)> {
    let n = a.nrows();
    let m = DMatrix::from_fn(n, n, |i, j| a[(i, j)]);
    let eig = SymmetricEigen::try_new(m, f64::EPSILON, 10_000).ok_or(IcaError::Eigendecomposition)?;

    let mut order = (0..n).collect::<Vec<_>>();
    order.sort_by(|&i, &j| {
        eig.eigenvalues[j]
            .partial_cmp(&eig.eigenvalues[i])
            .unwrap_or(Ordering::Equal)
    });

    let values = order.iter().map(|&k| eig.eigenvalues[k]).collect::<Array1<_>>();
    let vectors = Array2::from_shape_fn((n, n), |(i, j)| eig.eigenvectors[(i, order[j])]);

    Ok((values, vectors))
}

/// Whitening matrix `K = D^{-1/2} E^H` restricted to the `ncomponents` leading directions
///
/// `x` holds centered records, one sample per row. `K x_t` has identity covariance.
pub(crate) fn whitening<T: Scalar>(x: &Array2<T>, ncomponents: usize) -> Result<Array2<T>> {
    let nsamples = x.nrows() as f64;
    let cov = x.t().dot(&x.mapv(|v| v.conjugate())).mapv(|v| v * T::from_real(1. / nsamples));
    let (values, vectors) = eigh(&cov)?;

    let largest = values[0].max(0.);
    if let Some((idx, _)) = values
        .iter()
        .take(ncomponents)
        .enumerate()
        .find(|&(_, &v)| !(v > largest * 1e-12) || v <= 0.)
    {
        return Err(IcaError::InvalidValue(format!(
            "records have rank {}, cannot extract {} components",
            idx, ncomponents
        )));
    }
    debug!(
        "whitening keeps {} of {} directions, variances {:?}",
        ncomponents,
        values.len(),
        values.slice(s![..ncomponents])
    );

    let scale = values
        .slice(s![..ncomponents])
        .mapv(|v| T::from_real(1. / v.sqrt()));
    let leading = vectors.slice(s![.., ..ncomponents]).to_owned();

    Ok(&adjoint(&leading) * &scale.insert_axis(Axis(1)))
}

/// Symmetric decorrelation
///
/// W <- (W * W^H)^{-1/2} * W
pub(crate) fn sym_decorrelation<T: Scalar>(w: &Array2<T>) -> Result<Array2<T>> {
    let (eig_val, eig_vec) = eigh(&w.dot(&adjoint(w)))?;

    let tmp = &eig_vec
        * &eig_val
            .mapv(|x| {
                // We lower bound the float value at 1e-7 when taking the reciprocal
                let s = x.max(0.).sqrt();
                T::from_real(if s < 1e-7 { 1e7 } else { s.recip() })
            })
            .insert_axis(Axis(0));

    Ok(tmp.dot(&adjoint(&eig_vec)).dot(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::{
        rand::SeedableRng,
        rand_distr::{StandardNormal, Uniform},
        RandomExt,
    };
    use num_complex::Complex64;
    use rand_xoshiro::Xoshiro256Plus;

    fn identity_error<T: Scalar>(a: &Array2<T>) -> f64 {
        let n = a.nrows();
        let mut err = 0f64;
        for i in 0..n {
            for j in 0..n {
                let target = if i == j { 1. } else { 0. };
                err = err.max((a[(i, j)] - T::from_real(target)).modulus());
            }
        }
        err
    }

    #[test]
    fn eigh_sorts_descending() {
        let a = array![[2., 1., 0.], [1., 2., 0.], [0., 0., 5.]];
        let (values, vectors) = eigh(&a).unwrap();
        assert_abs_diff_eq!(values, array![5., 3., 1.], epsilon = 1e-10);

        let reconstructed = vectors.dot(&Array2::from_diag(&values)).dot(&vectors.t());
        assert_abs_diff_eq!(reconstructed, a, epsilon = 1e-10);
    }

    #[test]
    fn decorrelation_yields_orthonormal_rows() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let w: Array2<f64> = Array2::random_using((4, 4), Uniform::new(0., 1.), &mut rng);
        let w = sym_decorrelation(&w).unwrap();
        assert!(identity_error(&w.dot(&w.t())) < 1e-8);

        let re: Array2<f64> = Array2::random_using((3, 3), Uniform::new(0., 1.), &mut rng);
        let im: Array2<f64> = Array2::random_using((3, 3), Uniform::new(0., 1.), &mut rng);
        let w = ndarray::Zip::from(&re)
            .and(&im)
            .map_collect(|&a, &b| Complex64::new(a, b));
        let w = sym_decorrelation(&w).unwrap();
        assert!(identity_error(&w.dot(&adjoint(&w))) < 1e-8);
    }

    #[test]
    fn whitened_records_have_unit_covariance() {
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let s: Array2<f64> = Array2::random_using((500, 3), StandardNormal, &mut rng);
        let mixing = array![[1., 0.5, 0.], [0.2, 2., 0.1], [0., 0.3, 0.7]];
        let mut x = s.dot(&mixing);
        let mean = x.mean_axis(Axis(0)).unwrap();
        x -= &mean.insert_axis(Axis(0));

        let k = whitening(&x, 2).unwrap();
        assert_eq!(k.dim(), (2, 3));
        let z = k.dot(&x.t());
        let cov = z.dot(&z.t()) / 500.;
        assert!(identity_error(&cov) < 1e-8);

        // a rank one record set cannot provide two components
        let column = Array2::from_shape_fn((50, 2), |(i, j)| (i as f64).sin() * (j + 1) as f64);
        assert!(matches!(
            whitening(&column, 2),
            Err(IcaError::InvalidValue(_))
        ));
    }
}
