//! ICA solvers the engine can be run with
//!
//! A solver takes records with one sample per row and one pseudo-channel per column and returns
//! the estimated sources, one per column. Whether a solver handles complex records is a
//! capability: complex records handed to a real-only solver are rejected, never approximated.

use monoica::traits::{Fit, Predict};
use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::complex_fast_ica::{ComplexFastIca, ComplexGFunc};
use crate::error::{IcaError, Result};
use crate::fast_ica::{FastIca, GFunc};

/// Options the engine passes through to the solver unchanged
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    pub ncomponents: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub random_state: Option<usize>,
}

pub trait IcaSolver {
    /// Name used in error messages
    fn name(&self) -> &'static str;

    /// Whether [`solve_complex`](IcaSolver::solve_complex) is implemented
    fn supports_complex(&self) -> bool {
        false
    }

    fn solve_real(
        &self,
        records: ArrayView2<'_, f64>,
        options: &SolverOptions,
    ) -> Result<Array2<f64>>;

    fn solve_complex(
        &self,
        _records: ArrayView2<'_, Complex64>,
        _options: &SolverOptions,
    ) -> Result<Array2<Complex64>> {
        Err(IcaError::UnsupportedDataType {
            solver: self.name(),
            data: "complex",
        })
    }
}

/// Real-valued FastICA, see [`FastIca`]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastIcaSolver {
    pub gfunc: GFunc,
}

impl Default for FastIcaSolver {
    fn default() -> Self {
        FastIcaSolver {
            gfunc: GFunc::Logcosh(1.),
        }
    }
}

fn solve_fast_ica(
    gfunc: GFunc,
    records: ArrayView2<'_, f64>,
    options: &SolverOptions,
) -> Result<Array2<f64>> {
    let mut params = FastIca::params()
        .ncomponents(options.ncomponents)
        .gfunc(gfunc)
        .max_iter(options.max_iterations)
        .tol(options.tolerance);
    if let Some(seed) = options.random_state {
        params = params.random_state(seed);
    }
    let model: Result<FastIca> = params.fit(&records);

    Ok(model?.predict(&records))
}

impl IcaSolver for FastIcaSolver {
    fn name(&self) -> &'static str {
        "fast-ica"
    }

    fn solve_real(
        &self,
        records: ArrayView2<'_, f64>,
        options: &SolverOptions,
    ) -> Result<Array2<f64>> {
        solve_fast_ica(self.gfunc, records, options)
    }
}

/// Complex FastICA for complex records, real FastICA for real ones
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexFastIcaSolver {
    pub gfunc: ComplexGFunc,
    /// Contrast used on real records
    pub real_gfunc: GFunc,
}

impl Default for ComplexFastIcaSolver {
    fn default() -> Self {
        ComplexFastIcaSolver {
            gfunc: ComplexGFunc::Sqrt(0.1),
            real_gfunc: GFunc::Logcosh(1.),
        }
    }
}

impl IcaSolver for ComplexFastIcaSolver {
    fn name(&self) -> &'static str {
        "complex-fast-ica"
    }

    fn supports_complex(&self) -> bool {
        true
    }

    fn solve_real(
        &self,
        records: ArrayView2<'_, f64>,
        options: &SolverOptions,
    ) -> Result<Array2<f64>> {
        solve_fast_ica(self.real_gfunc, records, options)
    }

    fn solve_complex(
        &self,
        records: ArrayView2<'_, Complex64>,
        options: &SolverOptions,
    ) -> Result<Array2<Complex64>> {
        let mut params = ComplexFastIca::params()
            .ncomponents(options.ncomponents)
            .gfunc(self.gfunc)
            .max_iter(options.max_iterations)
            .tol(options.tolerance);
        if let Some(seed) = options.random_state {
            params = params.random_state(seed);
        }
        let model: Result<ComplexFastIca> = params.fit(&records);

        Ok(model?.predict(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<SolverOptions>();
        has_autotraits::<FastIcaSolver>();
        has_autotraits::<ComplexFastIcaSolver>();
    }

    #[test]
    fn real_solver_rejects_complex_records() {
        let solver = FastIcaSolver::default();
        assert!(!solver.supports_complex());

        let records = Array2::from_elem((8, 2), Complex64::new(1., 1.));
        let options = SolverOptions {
            ncomponents: 2,
            max_iterations: 10,
            tolerance: 1e-4,
            random_state: Some(0),
        };
        match solver.solve_complex(records.view(), &options) {
            Err(IcaError::UnsupportedDataType { solver, data }) => {
                assert_eq!(solver, "fast-ica");
                assert_eq!(data, "complex");
            }
            other => panic!("expected unsupported data type, got {:?}", other),
        }
        assert!(ComplexFastIcaSolver::default().supports_complex());
    }

    #[test]
    fn solvers_return_one_column_per_component() {
        let records = Array2::from_shape_fn((200, 3), |(t, k)| {
            let t = t as f64;
            let s1 = (0.31 * t).sin();
            let s2 = if (0.07 * t).sin() > 0. { 1. } else { -1. };
            (k as f64 + 1.) * s1 + (3. - k as f64) * s2
        });
        let options = SolverOptions {
            ncomponents: 2,
            max_iterations: 1000,
            tolerance: 1e-4,
            random_state: Some(42),
        };

        let sources = FastIcaSolver::default()
            .solve_real(records.view(), &options)
            .unwrap();
        assert_eq!(sources.dim(), (200, 2));

        let sources = ComplexFastIcaSolver::default()
            .solve_real(records.view(), &options)
            .unwrap();
        assert_eq!(sources.dim(), (200, 2));
    }
}
