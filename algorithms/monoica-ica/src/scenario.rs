//! End-to-end scenario: pure clips to scored components
//!
//! One scenario moves a set of sources past the sensor, mixes what the sensor hears, separates
//! the mixture with one ICA variant and scores the components against the propagated sources.
//! Scenarios share nothing but the read-only [`WaveformStore`] and can be run in parallel.
use log::{info, warn};
use monoica::metrics::{Evaluation, SpectralAnalyzer};
use monoica::traits::Fit;
use monoica::{Basis, ParamGuard, WaveformStore};
use monoica_datasets::{Mixer, Mixture, MotionModel, Position, PropagationModel, Velocity};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::embedding::IcaVariant;
use crate::engine::{FittedIca, IcaEngine, SeparationResult};
use crate::error::{IcaError, Result};
use crate::solver::{FastIcaSolver, IcaSolver};

/// A source taking part in a scenario
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSource {
    /// Identifier of the clip in the waveform store
    pub id: String,
    pub initial_position: Position,
    pub velocity: Velocity,
}

/// Checked scenario configuration
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioValidParams<S = FastIcaSolver> {
    sample_rate: f64,
    duration: f64,
    amplitude_clamp: f64,
    sensor_position: Position,
    propagation_speed: f64,
    sources: Vec<ScenarioSource>,
    ica_variant: IcaVariant,
    basis: Option<Option<Basis>>,
    max_iterations: usize,
    convergence_tolerance: f64,
    similarity_threshold: f64,
    window_len: usize,
    hop: usize,
    lags: Option<usize>,
    segment_len: usize,
    random_state: Option<usize>,
    solver: S,
}

impl<S> ScenarioValidParams<S> {
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn amplitude_clamp(&self) -> f64 {
        self.amplitude_clamp
    }

    pub fn sensor_position(&self) -> Position {
        self.sensor_position
    }

    pub fn propagation_speed(&self) -> f64 {
        self.propagation_speed
    }

    pub fn sources(&self) -> &[ScenarioSource] {
        &self.sources
    }

    pub fn ica_variant(&self) -> IcaVariant {
        self.ica_variant
    }

    /// Basis the separation runs in
    pub fn basis(&self) -> Option<Basis> {
        self.ica_variant.basis()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn convergence_tolerance(&self) -> f64 {
        self.convergence_tolerance
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Delayed copies per window, `None` for the variant's default
    pub fn lags(&self) -> Option<usize> {
        self.lags
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    pub fn random_state(&self) -> Option<usize> {
        self.random_state
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }
}

/// Scenario configuration
///
/// ```
/// use monoica_datasets::{Position, Velocity};
/// use monoica_ica::{scenario::ScenarioParams, IcaVariant};
///
/// let scenario = ScenarioParams::new(1000., 4., 1.)
///     .source("ship-1", Position::new(-20., 10.), Velocity::new(20., 0.))
///     .source("ship-2", Position::new(-60., 10.), Velocity::new(20., 0.))
///     .ica_variant(IcaVariant::TimeDomain)
///     .window_len(200)
///     .hop(200);
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioParams<S = FastIcaSolver>(ScenarioValidParams<S>);

impl ScenarioParams {
    /// Start a scenario sampled at `sample_rate` for `duration` seconds
    ///
    /// Defaults
    /// * sensor at the origin, `propagation_speed = 1500` m/s
    /// * `ica_variant = TimeDomain`, basis following the variant
    /// * `max_iterations = 200`, `convergence_tolerance = 1e-4`
    /// * `similarity_threshold = 0.5`
    /// * `window_len = hop = segment_len = 256`, `lags` following the variant
    pub fn new(sample_rate: f64, duration: f64, amplitude_clamp: f64) -> Self {
        Self(ScenarioValidParams {
            sample_rate,
            duration,
            amplitude_clamp,
            sensor_position: Position::default(),
            propagation_speed: 1500.,
            sources: Vec::new(),
            ica_variant: IcaVariant::TimeDomain,
            basis: None,
            max_iterations: 200,
            convergence_tolerance: 1e-4,
            similarity_threshold: 0.5,
            window_len: 256,
            hop: 256,
            lags: None,
            segment_len: 256,
            random_state: None,
            solver: FastIcaSolver::default(),
        })
    }
}

impl<S> ScenarioParams<S> {
    /// Add a source moving in a straight line from `initial_position`
    pub fn source(
        mut self,
        id: impl Into<String>,
        initial_position: Position,
        velocity: Velocity,
    ) -> Self {
        self.0.sources.push(ScenarioSource {
            id: id.into(),
            initial_position,
            velocity,
        });
        self
    }

    pub fn sensor_position(mut self, sensor_position: Position) -> Self {
        self.0.sensor_position = sensor_position;
        self
    }

    pub fn propagation_speed(mut self, propagation_speed: f64) -> Self {
        self.0.propagation_speed = propagation_speed;
        self
    }

    pub fn ica_variant(mut self, ica_variant: IcaVariant) -> Self {
        self.0.ica_variant = ica_variant;
        self
    }

    /// Request a basis explicitly, `None` for the time domain
    ///
    /// It has to agree with the ICA variant.
    pub fn basis(mut self, basis: Option<Basis>) -> Self {
        self.0.basis = Some(basis);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.0.max_iterations = max_iterations;
        self
    }

    pub fn convergence_tolerance(mut self, convergence_tolerance: f64) -> Self {
        self.0.convergence_tolerance = convergence_tolerance;
        self
    }

    /// Components less similar than this to every source are reported as unidentified
    pub fn similarity_threshold(mut self, similarity_threshold: f64) -> Self {
        self.0.similarity_threshold = similarity_threshold;
        self
    }

    pub fn window_len(mut self, window_len: usize) -> Self {
        self.0.window_len = window_len;
        self
    }

    pub fn hop(mut self, hop: usize) -> Self {
        self.0.hop = hop;
        self
    }

    /// See [`IcaEngineParams::lags`](crate::IcaEngineParams::lags)
    pub fn lags(mut self, lags: usize) -> Self {
        self.0.lags = Some(lags);
        self
    }

    /// Segment length of the spectral estimates used for scoring
    pub fn segment_len(mut self, segment_len: usize) -> Self {
        self.0.segment_len = segment_len;
        self
    }

    pub fn random_state(mut self, random_state: usize) -> Self {
        self.0.random_state = Some(random_state);
        self
    }

    pub fn solver<T: IcaSolver>(self, solver: T) -> ScenarioParams<T> {
        let p = self.0;
        ScenarioParams(ScenarioValidParams {
            sample_rate: p.sample_rate,
            duration: p.duration,
            amplitude_clamp: p.amplitude_clamp,
            sensor_position: p.sensor_position,
            propagation_speed: p.propagation_speed,
            sources: p.sources,
            ica_variant: p.ica_variant,
            basis: p.basis,
            max_iterations: p.max_iterations,
            convergence_tolerance: p.convergence_tolerance,
            similarity_threshold: p.similarity_threshold,
            window_len: p.window_len,
            hop: p.hop,
            lags: p.lags,
            segment_len: p.segment_len,
            random_state: p.random_state,
            solver,
        })
    }
}

impl<S> ParamGuard for ScenarioParams<S> {
    type Checked = ScenarioValidParams<S>;
    type Error = IcaError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let p = &self.0;
        if p.sources.is_empty() {
            return Err(IcaError::InvalidValue(
                "a scenario needs at least one source".into(),
            ));
        }
        if let Some(basis) = p.basis {
            if basis != p.ica_variant.basis() {
                return Err(monoica::Error::BasisMismatch {
                    expected: p.ica_variant.basis(),
                    found: basis,
                }
                .into());
            }
        }
        if !(0.0..=1.0).contains(&p.similarity_threshold) {
            return Err(IcaError::InvalidValue(format!(
                "similarity threshold must be in [0, 1], got {}",
                p.similarity_threshold
            )));
        }

        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Everything one scenario run produces
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub mixture: Mixture,
    pub separation: SeparationResult,
    pub evaluation: Evaluation,
}

impl<S: IcaSolver + Clone> Fit<WaveformStore, IcaError> for ScenarioValidParams<S> {
    type Object = ScenarioOutcome;

    /// Run the scenario on clips taken from `store`
    ///
    /// The clips are truncated to the shortest one and to the scenario duration.
    ///
    /// # Errors
    ///
    /// * `SignalMismatch` if the store is not sampled at the scenario's rate
    /// * `InvalidParameter` for unknown clips and malformed motion or propagation settings
    /// * any failure of the ICA engine or of the scoring
    fn fit(&self, store: &WaveformStore) -> Result<ScenarioOutcome> {
        info!(
            "running {:?} scenario with {} sources over {} s",
            self.ica_variant,
            self.sources.len(),
            self.duration
        );

        let motion = MotionModel::new(self.sample_rate, self.duration)?;
        match store.sample_rate() {
            Some(rate) if (rate - self.sample_rate).abs() <= f64::EPSILON * rate => {}
            Some(rate) => {
                return Err(monoica::Error::SignalMismatch(format!(
                    "clips are sampled at {} Hz, the scenario at {} Hz",
                    rate, self.sample_rate
                ))
                .into())
            }
            None => {
                return Err(monoica::Error::InvalidParameter(
                    "the waveform store is empty".into(),
                )
                .into())
            }
        }

        let ids = self.sources.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        let num_samples = motion.num_samples();
        let clips = store
            .aligned(&ids)?
            .into_iter()
            .map(|clip| {
                if clip.len() > num_samples {
                    warn!(
                        "truncating clips of {} samples to the scenario's {} samples",
                        clip.len(),
                        num_samples
                    );
                    clip.truncated(num_samples)
                } else {
                    clip
                }
            })
            .collect::<Vec<_>>();

        let propagation = PropagationModel::params(self.amplitude_clamp)
            .sensor_position(self.sensor_position)
            .propagation_speed(self.propagation_speed)
            .check()?;
        let signals = self
            .sources
            .iter()
            .zip(clips.iter())
            .map(|(source, clip)| {
                let trajectory = motion.trajectory(source.initial_position, source.velocity)?;
                propagation.propagate(source.id.as_str(), clip, &trajectory)
            })
            .collect::<monoica::error::Result<Vec<_>>>()?;
        let mixture = Mixer::mix(signals)?;

        let engine = IcaEngine::params(self.ica_variant)
            .window_len(self.window_len)
            .hop(self.hop)
            .max_iterations(self.max_iterations)
            .tolerance(self.convergence_tolerance)
            .solver(self.solver.clone());
        let engine = match self.random_state {
            Some(seed) => engine.random_state(seed),
            None => engine,
        };
        let engine = match self.lags {
            Some(lags) => engine.lags(lags),
            None => engine,
        };
        let fitted: Result<FittedIca> = engine.fit(&mixture);
        let separation = fitted?.into_result();

        let analyzer = SpectralAnalyzer::params()
            .segment_len(self.segment_len)
            .similarity_threshold(self.similarity_threshold)
            .check()?;
        let references = mixture
            .sources()
            .iter()
            .map(|s| s.samples())
            .collect::<Vec<_>>();
        let evaluation =
            analyzer.evaluate(&separation.views(), &references, mixture.sample_rate())?;

        info!(
            "{:?} scenario identified {} of {} sources, score {:.3}",
            self.ica_variant,
            evaluation.identified_sources(),
            mixture.num_sources(),
            evaluation.score()
        );

        Ok(ScenarioOutcome {
            mixture,
            separation,
            evaluation,
        })
    }
}
