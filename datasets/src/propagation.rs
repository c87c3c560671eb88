//! Acoustic propagation from a moving source to the sensor
//!
//! The model is spherical spreading with a finite propagation speed: the amplitude falls off
//! inversely with distance (clamped close to the sensor) and every sample arrives after a delay
//! of `distance / speed` seconds.
use std::f64::consts::PI;

use log::debug;
use monoica::basis::{Basis, Coefficients, FrequencyRepresentation};
use monoica::error::{Error, Result};
use monoica::{ParamGuard, Waveform};
use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::motion::{Position, Trajectory};

/// Checked propagation model
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationModel {
    sensor_position: Position,
    propagation_speed: f64,
    reference_distance: f64,
    amplitude_clamp: f64,
    normalize_to_initial_distance: bool,
}

/// Unchecked propagation parameters
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationParams(PropagationModel);

impl PropagationParams {
    /// Start from the given amplitude clamp, the largest gain a source can have
    ///
    /// Defaults
    /// * `sensor_position = (0, 0)`
    /// * `propagation_speed = 1500` m/s, speed of sound in sea water
    /// * `reference_distance = 1` m
    /// * `normalize_to_initial_distance = false`
    pub fn new(amplitude_clamp: f64) -> Self {
        Self(PropagationModel {
            sensor_position: Position::default(),
            propagation_speed: 1500.,
            reference_distance: 1.,
            amplitude_clamp,
            normalize_to_initial_distance: false,
        })
    }

    pub fn sensor_position(mut self, sensor_position: Position) -> Self {
        self.0.sensor_position = sensor_position;
        self
    }

    pub fn propagation_speed(mut self, propagation_speed: f64) -> Self {
        self.0.propagation_speed = propagation_speed;
        self
    }

    /// Distance at which the gain is one
    pub fn reference_distance(mut self, reference_distance: f64) -> Self {
        self.0.reference_distance = reference_distance;
        self
    }

    /// Express gains relative to the source's initial distance (`r_init / r`) instead of the
    /// reference distance
    pub fn normalize_to_initial_distance(mut self, normalize: bool) -> Self {
        self.0.normalize_to_initial_distance = normalize;
        self
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "{} must be positive and finite, got {}",
            name, value
        )));
    }

    Ok(())
}

impl ParamGuard for PropagationParams {
    type Checked = PropagationModel;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        check_positive("propagation speed", self.0.propagation_speed)?;
        check_positive("reference distance", self.0.reference_distance)?;
        check_positive("amplitude clamp", self.0.amplitude_clamp)?;
        if !self.0.sensor_position.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "sensor position must be finite, got {:?}",
                self.0.sensor_position
            )));
        }

        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Waveform as received by the sensor, with the gains and delays it was derived from
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct PropagatedSignal {
    id: String,
    samples: Array1<f64>,
    amplitude: Array1<f64>,
    delay: Array1<f64>,
    sample_rate: f64,
}

impl PropagatedSignal {
    /// Identifier of the source clip
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn samples(&self) -> ArrayView1<'_, f64> {
        self.samples.view()
    }

    /// Gain applied at every sample
    pub fn amplitude(&self) -> ArrayView1<'_, f64> {
        self.amplitude.view()
    }

    /// Propagation delay at every sample, in seconds
    pub fn delay(&self) -> ArrayView1<'_, f64> {
        self.delay.view()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn to_waveform(&self) -> Result<Waveform> {
        Waveform::new(self.samples.clone(), self.sample_rate)
    }
}

impl PropagationModel {
    pub fn params(amplitude_clamp: f64) -> PropagationParams {
        PropagationParams::new(amplitude_clamp)
    }

    pub fn sensor_position(&self) -> Position {
        self.sensor_position
    }

    pub fn propagation_speed(&self) -> f64 {
        self.propagation_speed
    }

    pub fn reference_distance(&self) -> f64 {
        self.reference_distance
    }

    pub fn amplitude_clamp(&self) -> f64 {
        self.amplitude_clamp
    }

    pub fn normalize_to_initial_distance(&self) -> bool {
        self.normalize_to_initial_distance
    }

    /// Gain of a source at `distance`, relative to `reference`
    fn gain(&self, distance: f64, reference: f64) -> f64 {
        if distance <= 0.0 {
            self.amplitude_clamp
        } else {
            (reference / distance).min(self.amplitude_clamp)
        }
    }

    /// Gain of a source at `position`, relative to the reference distance
    pub fn amplitude(&self, position: Position) -> f64 {
        self.gain(
            position.distance(&self.sensor_position),
            self.reference_distance,
        )
    }

    /// Travel time from `position` to the sensor, in seconds
    pub fn delay(&self, position: Position) -> f64 {
        position.distance(&self.sensor_position) / self.propagation_speed
    }

    /// Received waveform of a clip emitted along `trajectory`
    ///
    /// The output has the length of the clip. Samples outside the trajectory's validity window
    /// are silent and report zero gain and delay.
    ///
    /// # Errors
    ///
    /// * If the clip and the trajectory are sampled at different rates
    /// * If gains are normalized to the initial distance and the source starts on the sensor
    pub fn propagate(
        &self,
        id: impl Into<String>,
        waveform: &Waveform,
        trajectory: &Trajectory,
    ) -> Result<PropagatedSignal> {
        let id = id.into();
        let fs = waveform.sample_rate();
        if (fs - trajectory.sample_rate()).abs() > f64::EPSILON * fs {
            return Err(Error::SignalMismatch(format!(
                "waveform sampled at {} Hz, trajectory at {} Hz",
                fs,
                trajectory.sample_rate()
            )));
        }

        let reference = if self.normalize_to_initial_distance {
            let initial = trajectory.initial().distance(&self.sensor_position);
            if initial <= 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "cannot normalize `{}` to its initial distance, it starts on the sensor",
                    id
                )));
            }
            initial
        } else {
            self.reference_distance
        };

        let source = waveform.samples();
        let len = source.len();
        let mut samples = Array1::zeros(len);
        let mut amplitude = Array1::zeros(len);
        let mut delay = Array1::zeros(len);
        for n in 0..len {
            let position = match trajectory.position_at_sample(n) {
                Some(position) => position,
                None => continue,
            };
            let distance = position.distance(&self.sensor_position);
            let gain = self.gain(distance, reference);
            let lag = distance / self.propagation_speed;

            samples[n] = gain * interpolate(source, n as f64 - lag * fs);
            amplitude[n] = gain;
            delay[n] = lag;
        }

        debug!(
            "propagated `{}` over {} samples, gain {:.3e}..{:.3e}",
            id,
            len,
            amplitude.iter().cloned().fold(f64::INFINITY, f64::min),
            amplitude.iter().cloned().fold(0.0, f64::max)
        );

        Ok(PropagatedSignal {
            id,
            samples,
            amplitude,
            delay,
            sample_rate: fs,
        })
    }

    /// Transfer function `amplitude * exp(-2πi f delay)` of a source held at `position`
    pub fn frequency_response(
        &self,
        position: Position,
        frequencies: ArrayView1<'_, f64>,
    ) -> Array1<Complex64> {
        let gain = self.amplitude(position);
        let delay = self.delay(position);

        frequencies.mapv(|f| Complex64::from_polar(gain, -2. * PI * f * delay))
    }

    /// Apply the transfer function of a source held at `position` bin by bin
    ///
    /// In the real basis the factor rotates every cosine/sine pair, in the complex basis the
    /// bins above `n/2` are treated as negative frequencies.
    pub fn propagate_spectrum(
        &self,
        rep: &FrequencyRepresentation,
        position: Position,
        sample_rate: f64,
    ) -> Result<FrequencyRepresentation> {
        check_positive("sample rate", sample_rate)?;
        let len = rep.len();
        let bin_width = sample_rate / len as f64;

        match rep.coefficients() {
            Coefficients::SineCosine { .. } => {
                let half = rep.half_spectrum();
                let frequencies = Array1::from_shape_fn(half.len(), |k| k as f64 * bin_width);
                let response = self.frequency_response(position, frequencies.view());

                FrequencyRepresentation::from_half_spectrum(
                    Basis::RealSineCosine,
                    len,
                    (&half * &response).view(),
                )
            }
            Coefficients::Exponential(coeffs) => {
                let frequencies = Array1::from_shape_fn(len, |k| {
                    if k <= len / 2 {
                        k as f64 * bin_width
                    } else {
                        (k as f64 - len as f64) * bin_width
                    }
                });
                let response = self.frequency_response(position, frequencies.view());

                Ok(FrequencyRepresentation::exponential(coeffs * &response))
            }
        }
    }
}

/// Linear interpolation of `x` at fractional index `t`, zero outside its support
fn interpolate(x: ArrayView1<'_, f64>, t: f64) -> f64 {
    let at = |i: i64| {
        if i < 0 || i as usize >= x.len() {
            0.0
        } else {
            x[i as usize]
        }
    };
    let i0 = t.floor();
    let frac = t - i0;
    let i0 = i0 as i64;

    if frac == 0.0 {
        at(i0)
    } else {
        (1.0 - frac) * at(i0) + frac * at(i0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{MotionModel, Velocity};
    use approx::assert_abs_diff_eq;
    use monoica::BasisTransform;

    fn ramp(len: usize, fs: f64) -> Waveform {
        Waveform::from_fn(len, fs, |t| 1.0 + t).unwrap()
    }

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<PropagationModel>();
        has_autotraits::<PropagationParams>();
        has_autotraits::<PropagatedSignal>();
    }

    #[test]
    fn invalid_params() {
        assert!(PropagationParams::new(0.).check().is_err());
        assert!(PropagationParams::new(1.)
            .propagation_speed(-1.)
            .check()
            .is_err());
        assert!(PropagationParams::new(1.)
            .reference_distance(f64::NAN)
            .check()
            .is_err());
        assert!(PropagationParams::new(1.)
            .sensor_position(Position::new(f64::INFINITY, 0.))
            .check()
            .is_err());
    }

    #[test]
    fn stationary_source() {
        let fs = 100.;
        let model = PropagationParams::new(10.)
            .propagation_speed(50.)
            .check()
            .unwrap();
        let trajectory = MotionModel::new(fs, 1.)
            .unwrap()
            .trajectory(Position::new(3., 4.), Velocity::default())
            .unwrap();
        let waveform = ramp(100, fs);

        let out = model.propagate("a", &waveform, &trajectory).unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(out.id(), "a");
        assert!(out.amplitude().iter().all(|&a| (a - 0.2).abs() < 1e-12));
        assert!(out.delay().iter().all(|&d| (d - 0.1).abs() < 1e-12));

        // a delay of exactly ten samples
        assert_eq!(out.samples()[5], 0.0);
        assert_abs_diff_eq!(
            out.samples()[50],
            0.2 * waveform.samples()[40],
            epsilon = 1e-12
        );
    }

    #[test]
    fn receding_source_fades() {
        let fs = 50.;
        let model = PropagationParams::new(1.).check().unwrap();
        let trajectory = MotionModel::new(fs, 2.)
            .unwrap()
            .trajectory(Position::new(0.5, 0.), Velocity::new(5., 1.))
            .unwrap();

        let out = model
            .propagate("b", &ramp(100, fs), &trajectory)
            .unwrap();
        let amp = out.amplitude();
        assert_eq!(amp[0], 1.0);
        assert!(amp.windows(2).into_iter().all(|w| w[1] <= w[0]));
        assert!(amp[99] < 0.2);
    }

    #[test]
    fn clamp_and_window() {
        let fs = 10.;
        let model = PropagationParams::new(4.)
            .propagation_speed(1e9)
            .check()
            .unwrap();
        // passes straight through the sensor
        let trajectory = MotionModel::new(fs, 1.)
            .unwrap()
            .with_start_time(0.5)
            .unwrap()
            .trajectory(Position::new(-0.5, 0.), Velocity::new(1., 0.))
            .unwrap();

        let out = model.propagate("c", &ramp(20, fs), &trajectory).unwrap();
        let amp = out.amplitude();
        assert_eq!(amp[4], 0.0);
        assert_eq!(out.samples()[4], 0.0);
        assert_eq!(amp[10], 4.0);
        assert_abs_diff_eq!(amp[5], 2.0, epsilon = 1e-12);
        assert_eq!(amp[15], 0.0);
    }

    #[test]
    fn initial_distance_normalisation() {
        let fs = 10.;
        let model = PropagationParams::new(100.)
            .normalize_to_initial_distance(true)
            .propagation_speed(1e9)
            .check()
            .unwrap();
        let trajectory = MotionModel::new(fs, 1.)
            .unwrap()
            .trajectory(Position::new(400., 0.), Velocity::new(400., 0.))
            .unwrap();

        let out = model.propagate("d", &ramp(10, fs), &trajectory).unwrap();
        assert_abs_diff_eq!(out.amplitude()[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out.amplitude()[5], 400. / 600., epsilon = 1e-9);
    }

    #[test]
    fn normalisation_needs_a_distant_start() {
        let fs = 10.;
        let model = PropagationParams::new(100.)
            .normalize_to_initial_distance(true)
            .check()
            .unwrap();
        let trajectory = MotionModel::new(fs, 1.)
            .unwrap()
            .trajectory(Position::default(), Velocity::new(10., 0.))
            .unwrap();

        assert!(matches!(
            model.propagate("f", &ramp(10, fs), &trajectory),
            Err(Error::InvalidParameter(_))
        ));

        // without normalisation the start is clamped
        let model = PropagationParams::new(100.).check().unwrap();
        let out = model.propagate("f", &ramp(10, fs), &trajectory).unwrap();
        assert_eq!(out.amplitude()[0], 100.);
    }

    #[test]
    fn rate_mismatch() {
        let model = PropagationParams::new(1.).check().unwrap();
        let trajectory = MotionModel::new(100., 1.)
            .unwrap()
            .trajectory(Position::new(1., 0.), Velocity::default())
            .unwrap();

        assert!(matches!(
            model.propagate("e", &ramp(10, 200.), &trajectory),
            Err(Error::SignalMismatch(_))
        ));
    }

    #[test]
    fn spectrum_matches_time_domain_for_whole_sample_delay() {
        let fs = 64.;
        let len = 64;
        let model = PropagationParams::new(1.)
            .propagation_speed(10.)
            .check()
            .unwrap();
        // 2 m away, 0.2 s = 12.8 samples; use a periodic signal to compare circular shifts
        let position = Position::new(2., 0.);
        let x = Array1::from_shape_fn(len, |n| (2. * PI * 3. * n as f64 / len as f64).sin());

        for &basis in &[Basis::RealSineCosine, Basis::ComplexExponential] {
            let transform = BasisTransform::new(basis, len).unwrap();
            let rep = transform.forward(x.view()).unwrap();
            let shifted = model.propagate_spectrum(&rep, position, fs).unwrap();
            assert_eq!(shifted.basis(), basis);
            let y = transform.inverse(&shifted).unwrap();

            let delay = model.delay(position) * fs;
            let expected = Array1::from_shape_fn(len, |n| {
                0.5 * (2. * PI * 3. * (n as f64 - delay) / len as f64).sin()
            });
            assert_abs_diff_eq!(y, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn frequency_response_magnitude() {
        let model = PropagationParams::new(1.).check().unwrap();
        let response =
            model.frequency_response(Position::new(0., 4.), ndarray::array![0., 10., 250.].view());
        assert!(response.iter().all(|c| (c.norm() - 0.25).abs() < 1e-12));
        assert_abs_diff_eq!(response[0].im, 0.0, epsilon = 1e-12);
    }
}
