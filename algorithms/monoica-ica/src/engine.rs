//! Single-sensor ICA engine
//!
//! The engine embeds a mixture into pseudo-channels ([`SpectralEmbedding`]), hands the records
//! to an [`IcaSolver`] and maps the estimated sources back to the time domain.
use log::debug;
use monoica::traits::Fit;
use monoica::{Basis, BasisTransform, FrequencyRepresentation, ParamGuard};
use monoica_datasets::Mixture;
use ndarray::{Array1, Array2, ArrayView1};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::embedding::{IcaVariant, Records, SpectralEmbedding, WindowLayout};
use crate::error::{IcaError, Result};
use crate::solver::{FastIcaSolver, IcaSolver, SolverOptions};

/// Checked engine configuration
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct IcaEngineValidParams<S = FastIcaSolver> {
    variant: IcaVariant,
    window_len: usize,
    hop: usize,
    lags: Option<usize>,
    ncomponents: Option<usize>,
    max_iterations: usize,
    tolerance: f64,
    random_state: Option<usize>,
    solver: S,
}

impl<S> IcaEngineValidParams<S> {
    pub fn variant(&self) -> IcaVariant {
        self.variant
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Pseudo-channels per window, four for the time domain and one for the frequency variants
    /// unless set
    pub fn lags(&self) -> usize {
        match (self.lags, self.variant) {
            (Some(lags), _) => lags,
            (None, IcaVariant::TimeDomain) => 4,
            (None, _) => 1,
        }
    }

    pub fn ncomponents(&self) -> Option<usize> {
        self.ncomponents
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn random_state(&self) -> Option<usize> {
        self.random_state
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Layout the mixture is cut with
    pub fn layout(&self) -> Result<WindowLayout> {
        WindowLayout::new(self.window_len, self.hop)?.with_lags(self.lags())
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct IcaEngineParams<S = FastIcaSolver>(IcaEngineValidParams<S>);

/// Entry point for single-sensor ICA
///
/// ```
/// use monoica_ica::{IcaEngine, IcaVariant};
///
/// let params = IcaEngine::params(IcaVariant::TimeDomain)
///     .window_len(200)
///     .hop(200)
///     .max_iterations(500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcaEngine;

impl IcaEngine {
    pub fn params(variant: IcaVariant) -> IcaEngineParams {
        IcaEngineParams::new(variant)
    }
}

impl IcaEngineParams {
    /// Defaults
    /// * `window_len = hop = 256`
    /// * `lags`: 4 for the time domain, 1 otherwise
    /// * `ncomponents`: number of sources in the mixture, twice that with more than one lag
    /// * `max_iterations = 200`, `tolerance = 1e-4`
    /// * real-valued FastICA with the logcosh contrast
    pub fn new(variant: IcaVariant) -> Self {
        Self(IcaEngineValidParams {
            variant,
            window_len: 256,
            hop: 256,
            lags: None,
            ncomponents: None,
            max_iterations: 200,
            tolerance: 1e-4,
            random_state: None,
            solver: FastIcaSolver::default(),
        })
    }
}

impl<S> IcaEngineParams<S> {
    /// Length of every pseudo-channel, in samples
    pub fn window_len(mut self, window_len: usize) -> Self {
        self.0.window_len = window_len;
        self
    }

    /// Distance between the starts of consecutive windows
    pub fn hop(mut self, hop: usize) -> Self {
        self.0.hop = hop;
        self
    }

    /// Number of delayed copies of every window, the window itself included
    ///
    /// Only the time domain takes more than one.
    pub fn lags(mut self, lags: usize) -> Self {
        self.0.lags = Some(lags);
        self
    }

    pub fn ncomponents(mut self, ncomponents: usize) -> Self {
        self.0.ncomponents = Some(ncomponents);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.0.max_iterations = max_iterations;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.0.tolerance = tolerance;
        self
    }

    pub fn random_state(mut self, random_state: usize) -> Self {
        self.0.random_state = Some(random_state);
        self
    }

    /// Replace the solver, for example by one able to handle complex records
    pub fn solver<T: IcaSolver>(self, solver: T) -> IcaEngineParams<T> {
        let p = self.0;
        IcaEngineParams(IcaEngineValidParams {
            variant: p.variant,
            window_len: p.window_len,
            hop: p.hop,
            lags: p.lags,
            ncomponents: p.ncomponents,
            max_iterations: p.max_iterations,
            tolerance: p.tolerance,
            random_state: p.random_state,
            solver,
        })
    }
}

impl<S> ParamGuard for IcaEngineParams<S> {
    type Checked = IcaEngineValidParams<S>;
    type Error = IcaError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        self.0.layout()?;
        if self.0.variant.basis().is_some() && self.0.lags() > 1 {
            return Err(IcaError::InvalidValue(format!(
                "{:?} takes one channel per window, got {} lags",
                self.0.variant,
                self.0.lags()
            )));
        }
        if !(self.0.tolerance > 0.) || !self.0.tolerance.is_finite() {
            return Err(IcaError::InvalidTolerance(self.0.tolerance));
        }
        if self.0.max_iterations == 0 {
            return Err(IcaError::InvalidValue(
                "max_iterations must be at least one".into(),
            ));
        }
        if self.0.ncomponents == Some(0) {
            return Err(IcaError::InvalidValue(
                "at least one component is required".into(),
            ));
        }

        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

impl<S: IcaSolver> IcaEngineValidParams<S> {
    fn check_capability(&self) -> Result<()> {
        if self.variant.is_complex() && !self.solver.supports_complex() {
            return Err(IcaError::UnsupportedDataType {
                solver: self.solver.name(),
                data: "complex",
            });
        }

        Ok(())
    }
}

impl<S: IcaSolver> Fit<SpectralEmbedding, IcaError> for IcaEngineValidParams<S> {
    type Object = FittedIca;

    /// Separate an embedded recording
    ///
    /// # Errors
    ///
    /// * `BasisMismatch` if the embedding is not expressed in the variant's basis
    /// * `UnsupportedDataType` if the variant needs complex records the solver cannot handle
    /// * `InvalidValue` if the embedding was cut with another layout than the engine's, or the
    ///   number of components exceeds what the windows allow
    /// * any solver failure, `NotConverged` in particular
    fn fit(&self, embedding: &SpectralEmbedding) -> Result<FittedIca> {
        if embedding.basis() != self.variant.basis() {
            return Err(monoica::Error::BasisMismatch {
                expected: self.variant.basis(),
                found: embedding.basis(),
            }
            .into());
        }
        self.check_capability()?;
        let layout = self.layout()?;
        if embedding.layout() != layout {
            return Err(IcaError::InvalidValue(format!(
                "embedding cut with {:?}, the engine expects {:?}",
                embedding.layout(),
                layout
            )));
        }

        // a lagged tone spans a sine and a cosine direction
        let per_source = if layout.lags() > 1 { 2 } else { 1 };
        let (nrecords, nchannels) = embedding.records().dim();
        let ncomponents = self
            .ncomponents
            .or_else(|| embedding.num_sources().map(|n| n * per_source))
            .unwrap_or_else(|| nrecords.min(nchannels));
        if ncomponents == 0 || ncomponents > nrecords.min(nchannels) {
            return Err(IcaError::InvalidValue(format!(
                "{} components cannot be extracted from {} channels of {} records",
                ncomponents, nchannels, nrecords
            )));
        }

        let options = SolverOptions {
            ncomponents,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            random_state: self.random_state,
        };
        let window_len = embedding.layout().window_len();
        let sources = match embedding.records() {
            Records::Real(records) => {
                let sources = self.solver.solve_real(records.view(), &options)?;
                match self.variant.basis() {
                    None => sources.columns().into_iter().map(|c| c.to_owned()).collect(),
                    _ => {
                        let transform = BasisTransform::new(Basis::RealSineCosine, window_len)?;
                        sources
                            .columns()
                            .into_iter()
                            .map(|c| to_time_domain_real(&transform, c))
                            .collect::<Result<Vec<_>>>()?
                    }
                }
            }
            Records::Complex(records) => {
                let sources = self.solver.solve_complex(records.view(), &options)?;
                let transform = BasisTransform::new(Basis::ComplexExponential, window_len)?;
                sources
                    .columns()
                    .into_iter()
                    .map(|c| -> Result<Array1<f64>> {
                        let rep = FrequencyRepresentation::from_half_spectrum(
                            Basis::ComplexExponential,
                            window_len,
                            c,
                        )?;
                        Ok(transform.inverse(&rep)?)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };
        debug!(
            "{} separated {} components of {} samples ({:?})",
            self.solver.name(),
            sources.len(),
            window_len,
            self.variant
        );

        let components = sources
            .into_iter()
            .map(|samples| EstimatedComponent {
                samples,
                sample_rate: embedding.sample_rate(),
                variant: self.variant,
                basis: self.variant.basis(),
            })
            .collect();

        Ok(FittedIca {
            variant: self.variant,
            layout: embedding.layout(),
            solver: self.solver.name(),
            result: SeparationResult { components },
        })
    }
}

fn to_time_domain_real(transform: &BasisTransform, packed: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    let rep = FrequencyRepresentation::from_real_vector(transform.len(), packed)?;

    Ok(transform.inverse(&rep)?)
}

impl<S: IcaSolver> Fit<Mixture, IcaError> for IcaEngineValidParams<S> {
    type Object = FittedIca;

    /// Embed the mixture in the variant's basis and separate it
    ///
    /// The number of components defaults to the number of sources in the mixture, or twice that
    /// when every window comes with delayed copies.
    fn fit(&self, mixture: &Mixture) -> Result<FittedIca> {
        self.check_capability()?;
        let embedding = SpectralEmbedding::new(mixture, self.layout()?, self.variant.basis())?;

        Fit::<SpectralEmbedding, IcaError>::fit(self, &embedding)
    }
}

/// Estimated source signal in the time domain
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedComponent {
    samples: Array1<f64>,
    sample_rate: f64,
    variant: IcaVariant,
    basis: Option<Basis>,
}

impl EstimatedComponent {
    /// One window worth of the estimated source, up to scale and sign
    pub fn samples(&self) -> ArrayView1<'_, f64> {
        self.samples.view()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn variant(&self) -> IcaVariant {
        self.variant
    }

    pub fn basis(&self) -> Option<Basis> {
        self.basis
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Ordered estimated components of one fit
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationResult {
    components: Vec<EstimatedComponent>,
}

impl SeparationResult {
    pub fn components(&self) -> &[EstimatedComponent] {
        &self.components
    }

    /// Component samples, ready for [`SpectralAnalyzer::evaluate`](monoica::SpectralAnalyzer::evaluate)
    pub fn views(&self) -> Vec<ArrayView1<'_, f64>> {
        self.components.iter().map(|c| c.samples()).collect()
    }

    /// Components as the columns of one matrix
    pub fn to_matrix(&self) -> Array2<f64> {
        let len = self.components.first().map(|c| c.len()).unwrap_or(0);
        let mut matrix = Array2::zeros((len, self.components.len()));
        for (mut column, component) in matrix.columns_mut().into_iter().zip(&self.components) {
            column.assign(&component.samples);
        }

        matrix
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Fitted engine, terminal state of a separation
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct FittedIca {
    variant: IcaVariant,
    layout: WindowLayout,
    #[cfg_attr(feature = "serde", serde(skip_deserializing, default))]
    solver: &'static str,
    result: SeparationResult,
}

impl FittedIca {
    pub fn variant(&self) -> IcaVariant {
        self.variant
    }

    pub fn layout(&self) -> WindowLayout {
        self.layout
    }

    /// Name of the solver that produced the components
    pub fn solver(&self) -> &'static str {
        self.solver
    }

    pub fn result(&self) -> &SeparationResult {
        &self.result
    }

    pub fn into_result(self) -> SeparationResult {
        self.result
    }
}
