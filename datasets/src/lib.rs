//! `monoica-datasets` simulates what a single sensor records when several sound sources move
//! around it.
//!
//! ## The Big Picture
//!
//! The pipeline goes from pure source clips to a single observed channel:
//!
//! * [`MotionModel`] samples straight-line [`Trajectory`]s,
//! * [`PropagationModel`] turns a clip and a trajectory into the [`PropagatedSignal`] reaching the
//!   sensor (inverse-distance gain, propagation delay),
//! * [`Mixer`] sums the propagated signals into a [`Mixture`], which keeps them as ground truth.
//!
//! The [`generate`] module draws random scenarios and produces multi-time snapshot datasets.
//!
//! ## Example
//!
//! ```
//! use monoica::{ParamGuard, Waveform};
//! use monoica_datasets::{Mixer, MotionModel, Position, PropagationParams, Velocity};
//!
//! let fs = 1000.;
//! let motion = MotionModel::new(fs, 1.)?;
//! let propagation = PropagationParams::new(1.).check()?;
//!
//! let tone = Waveform::from_fn(1000, fs, |t| (2. * std::f64::consts::PI * 50. * t).sin())?;
//! let hum = Waveform::from_fn(1000, fs, |t| (2. * std::f64::consts::PI * 120. * t).sin())?;
//!
//! let a = propagation.propagate(
//!     "tone",
//!     &tone,
//!     &motion.trajectory(Position::new(-10., 5.), Velocity::new(20., 0.))?,
//! )?;
//! let b = propagation.propagate(
//!     "hum",
//!     &hum,
//!     &motion.trajectory(Position::new(3., -4.), Velocity::default())?,
//! )?;
//!
//! let mixture = Mixer::mix(vec![a, b])?;
//! assert_eq!(mixture.len(), 1000);
//! # Ok::<(), monoica::Error>(())
//! ```

pub mod generate;
mod mixer;
mod motion;
mod propagation;

pub use generate::{snapshots, ScenarioGenerator, SnapshotDataset, SourcePlacement};
pub use mixer::{Mixer, Mixture};
pub use motion::{MotionModel, Position, Positions, Trajectory, Velocity};
pub use propagation::{PropagatedSignal, PropagationModel, PropagationParams};
