use monoica::ParamGuard;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::{
    complex_fast_ica::{ComplexFastIca, ComplexGFunc},
    error::IcaError,
    fast_ica::{FastIca, GFunc},
};

/// Fast Independent Component Analysis (ICA)
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub struct FastIcaValidParams {
    ncomponents: Option<usize>,
    gfunc: GFunc,
    max_iter: usize,
    tol: f64,
    random_state: Option<usize>,
}

impl FastIcaValidParams {
    pub fn ncomponents(&self) -> &Option<usize> {
        &self.ncomponents
    }

    pub fn gfunc(&self) -> &GFunc {
        &self.gfunc
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    pub fn random_state(&self) -> &Option<usize> {
        &self.random_state
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub struct FastIcaParams(FastIcaValidParams);

impl Default for FastIcaParams {
    fn default() -> Self {
        Self::new()
    }
}

impl FastIca {
    pub fn params() -> FastIcaParams {
        FastIcaParams::new()
    }
}

impl FastIcaParams {
    /// Create new FastICA algorithm with default values for its parameters
    pub fn new() -> Self {
        Self(FastIcaValidParams {
            ncomponents: None,
            gfunc: GFunc::Logcosh(1.),
            max_iter: 200,
            tol: 1e-4,
            random_state: None,
        })
    }

    /// Set the number of components to use, if not set all are used
    pub fn ncomponents(mut self, ncomponents: usize) -> Self {
        self.0.ncomponents = Some(ncomponents);
        self
    }

    /// G function used in the approximation to neg-entropy, refer [`GFunc`]
    pub fn gfunc(mut self, gfunc: GFunc) -> Self {
        self.0.gfunc = gfunc;
        self
    }

    /// Set maximum number of iterations during fit
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.0.max_iter = max_iter;
        self
    }

    /// Set tolerance on update at each iteration
    pub fn tol(mut self, tol: f64) -> Self {
        self.0.tol = tol;
        self
    }

    /// Set seed for random number generator for reproducible results.
    pub fn random_state(mut self, random_state: usize) -> Self {
        self.0.random_state = Some(random_state);
        self
    }
}

fn check_iteration(max_iter: usize, tol: f64) -> Result<(), IcaError> {
    if !(tol > 0.) || !tol.is_finite() {
        Err(IcaError::InvalidTolerance(tol))
    } else if max_iter == 0 {
        Err(IcaError::InvalidValue(
            "max_iter must be at least one".into(),
        ))
    } else {
        Ok(())
    }
}

impl ParamGuard for FastIcaParams {
    type Checked = FastIcaValidParams;
    type Error = IcaError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        check_iteration(self.0.max_iter, self.0.tol)?;
        if let GFunc::Logcosh(alpha) = self.0.gfunc {
            if !(1.0..=2.0).contains(&alpha) {
                return Err(IcaError::InvalidValue(format!(
                    "alpha must be between 1 and 2 inclusive, got {}",
                    alpha
                )));
            }
        }

        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Complex-valued FastICA
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub struct ComplexFastIcaValidParams {
    ncomponents: Option<usize>,
    gfunc: ComplexGFunc,
    max_iter: usize,
    tol: f64,
    random_state: Option<usize>,
}

impl ComplexFastIcaValidParams {
    pub fn ncomponents(&self) -> &Option<usize> {
        &self.ncomponents
    }

    pub fn gfunc(&self) -> &ComplexGFunc {
        &self.gfunc
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    pub fn random_state(&self) -> &Option<usize> {
        &self.random_state
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub struct ComplexFastIcaParams(ComplexFastIcaValidParams);

impl Default for ComplexFastIcaParams {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplexFastIca {
    pub fn params() -> ComplexFastIcaParams {
        ComplexFastIcaParams::new()
    }
}

impl ComplexFastIcaParams {
    pub fn new() -> Self {
        Self(ComplexFastIcaValidParams {
            ncomponents: None,
            gfunc: ComplexGFunc::Sqrt(0.1),
            max_iter: 200,
            tol: 1e-4,
            random_state: None,
        })
    }

    pub fn ncomponents(mut self, ncomponents: usize) -> Self {
        self.0.ncomponents = Some(ncomponents);
        self
    }

    /// Contrast function, refer [`ComplexGFunc`]
    pub fn gfunc(mut self, gfunc: ComplexGFunc) -> Self {
        self.0.gfunc = gfunc;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.0.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.0.tol = tol;
        self
    }

    pub fn random_state(mut self, random_state: usize) -> Self {
        self.0.random_state = Some(random_state);
        self
    }
}

impl ParamGuard for ComplexFastIcaParams {
    type Checked = ComplexFastIcaValidParams;
    type Error = IcaError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        check_iteration(self.0.max_iter, self.0.tol)?;
        let a = self.0.gfunc.smoothing();
        if !(a > 0.) || !a.is_finite() {
            return Err(IcaError::InvalidValue(format!(
                "contrast smoothing constant must be positive, got {}",
                a
            )));
        }

        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}
