//! Straight-line source motion
//!
//! Positions are two-dimensional, in metres, with the sensor usually at the origin. One
//! dimensional motion is expressed with `y = 0`.
use std::ops::{Add, Sub};

use monoica::error::{Error, Result};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// Position at `distance` from the origin in direction `azimuth` (radians)
    pub fn from_polar(distance: f64, azimuth: f64) -> Self {
        Position {
            x: distance * azimuth.cos(),
            y: distance * azimuth.sin(),
        }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Distance from the origin
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Where a source at this position is after moving with `velocity` for `dt` seconds
    pub fn advanced(&self, velocity: Velocity, dt: f64) -> Position {
        Position {
            x: self.x + velocity.x * dt,
            y: self.y + velocity.y * dt,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add<Velocity> for Position {
    type Output = Position;

    /// Displacement by one time unit
    fn add(self, velocity: Velocity) -> Position {
        self.advanced(velocity, 1.0)
    }
}

impl Sub for Position {
    type Output = Velocity;

    fn sub(self, other: Position) -> Velocity {
        Velocity {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

impl Velocity {
    pub fn new(x: f64, y: f64) -> Self {
        Velocity { x, y }
    }

    /// Velocity with the given speed along `heading` (radians)
    pub fn from_polar(speed: f64, heading: f64) -> Self {
        Velocity {
            x: speed * heading.cos(),
            y: speed * heading.sin(),
        }
    }

    pub fn speed(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Time grid on which trajectories are sampled
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct MotionModel {
    sample_rate: f64,
    duration: f64,
    start_time: f64,
}

impl MotionModel {
    /// Sample trajectories at `sample_rate` over `duration` seconds
    ///
    /// # Errors
    ///
    /// If either value is not positive and finite
    pub fn new(sample_rate: f64, duration: f64) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "sample rate must be positive and finite, got {}",
                sample_rate
            )));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "duration must be positive and finite, got {}",
                duration
            )));
        }

        Ok(MotionModel {
            sample_rate,
            duration,
            start_time: 0.0,
        })
    }

    /// Shift the validity window to `[start_time, start_time + duration)`
    pub fn with_start_time(mut self, start_time: f64) -> Result<Self> {
        if !start_time.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "start time must be finite, got {}",
                start_time
            )));
        }
        self.start_time = start_time;

        Ok(self)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Number of positions per trajectory
    pub fn num_samples(&self) -> usize {
        // absorb rounding noise in products like 4.0 * 1000.0
        (self.duration * self.sample_rate - 1e-9).ceil() as usize
    }

    /// Constant-velocity trajectory starting at `initial` at the start time
    pub fn trajectory(&self, initial: Position, velocity: Velocity) -> Result<Trajectory> {
        if !initial.is_finite() || !velocity.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "trajectory needs finite vectors, got position {:?} and velocity {:?}",
                initial, velocity
            )));
        }

        Ok(Trajectory {
            initial,
            velocity,
            sample_rate: self.sample_rate,
            start_time: self.start_time,
            duration: self.duration,
            num_samples: self.num_samples(),
        })
    }
}

/// Sampled straight-line motion of one source
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    initial: Position,
    velocity: Velocity,
    sample_rate: f64,
    start_time: f64,
    duration: f64,
    num_samples: usize,
}

impl Trajectory {
    pub fn initial(&self) -> Position {
        self.initial
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// One position per sample of the validity window
    ///
    /// The iterator is lazy and can be cloned to restart it.
    pub fn positions(&self) -> Positions {
        Positions {
            initial: self.initial,
            velocity: self.velocity,
            sample_rate: self.sample_rate,
            next: 0,
            end: self.num_samples,
        }
    }

    /// Position at absolute time `t`, `None` outside the validity window
    pub fn position_at(&self, t: f64) -> Option<Position> {
        let elapsed = t - self.start_time;
        if elapsed < 0.0 || elapsed >= self.duration || !elapsed.is_finite() {
            return None;
        }

        Some(self.initial.advanced(self.velocity, elapsed))
    }

    /// Position at sample `n` of a recording starting at time zero
    pub fn position_at_sample(&self, n: usize) -> Option<Position> {
        let offset = (self.start_time * self.sample_rate).round() as i64;
        let k = n as i64 - offset;
        if k < 0 || k as usize >= self.num_samples {
            return None;
        }

        Some(
            self.initial
                .advanced(self.velocity, k as f64 / self.sample_rate),
        )
    }
}

/// Iterator over the sampled positions of a [`Trajectory`]
#[derive(Debug, Clone)]
pub struct Positions {
    initial: Position,
    velocity: Velocity,
    sample_rate: f64,
    next: usize,
    end: usize,
}

impl Iterator for Positions {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        if self.next >= self.end {
            return None;
        }
        let position = self
            .initial
            .advanced(self.velocity, self.next as f64 / self.sample_rate);
        self.next += 1;

        Some(position)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Positions {}
