//! Utility functions for randomly generating scenarios
//!
//! Sources start at a random azimuth and travel along a random heading. Distances are modeled
//! as `max(avg * Z, min)` where `Z` is Gaussian with mean 1 and standard deviation 0.1.

use std::f64::consts::PI;

use log::debug;
use monoica::error::{Error, Result};
use monoica::WaveformStore;
use ndarray::{s, Array2};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::motion::{Position, Velocity};

/// Random placement of sources around a sensor at the origin
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioGenerator {
    avg_init_dist: f64,
    min_init_dist: f64,
    avg_delta_dist: f64,
    min_delta_dist: f64,
}

impl Default for ScenarioGenerator {
    fn default() -> Self {
        ScenarioGenerator {
            avg_init_dist: 500.,
            min_init_dist: 400.,
            avg_delta_dist: 250.,
            min_delta_dist: 200.,
        }
    }
}

/// Starting point and displacement per time unit of one source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePlacement {
    pub initial: Position,
    pub step: Velocity,
}

impl ScenarioGenerator {
    /// # Errors
    ///
    /// If any of the distances is not positive and finite
    pub fn new(
        avg_init_dist: f64,
        min_init_dist: f64,
        avg_delta_dist: f64,
        min_delta_dist: f64,
    ) -> Result<Self> {
        let values = [
            ("average initial distance", avg_init_dist),
            ("minimum initial distance", min_init_dist),
            ("average travelled distance", avg_delta_dist),
            ("minimum travelled distance", min_delta_dist),
        ];
        for (name, value) in values.iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        Ok(ScenarioGenerator {
            avg_init_dist,
            min_init_dist,
            avg_delta_dist,
            min_delta_dist,
        })
    }

    pub fn min_init_dist(&self) -> f64 {
        self.min_init_dist
    }

    fn draw_distance(avg: f64, min: f64, rng: &mut impl Rng) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        (avg * (1.0 + 0.1 * z)).max(min)
    }

    fn draw_step(&self, rng: &mut impl Rng) -> Velocity {
        let delta = Self::draw_distance(self.avg_delta_dist, self.min_delta_dist, rng);
        Velocity::from_polar(delta, 2. * PI * rng.gen::<f64>())
    }

    /// Place `num_sources` sources at random distances
    pub fn place(&self, num_sources: usize, rng: &mut impl Rng) -> Vec<SourcePlacement> {
        (0..num_sources)
            .map(|_| {
                let step = self.draw_step(rng);
                let r = Self::draw_distance(self.avg_init_dist, self.min_init_dist, rng);
                let initial = Position::from_polar(r, 2. * PI * rng.gen::<f64>());

                SourcePlacement { initial, step }
            })
            .collect()
    }

    /// Place sources at known initial distances, azimuth and heading are still random
    pub fn place_at(&self, distances: &[f64], rng: &mut impl Rng) -> Result<Vec<SourcePlacement>> {
        distances
            .iter()
            .map(|&r| {
                if !r.is_finite() || r <= 0.0 {
                    return Err(Error::InvalidParameter(format!(
                        "source distance must be positive, got {}",
                        r
                    )));
                }
                let step = self.draw_step(rng);
                let initial = Position::from_polar(r, 2. * PI * rng.gen::<f64>());

                Ok(SourcePlacement { initial, step })
            })
            .collect()
    }
}

/// Observations of the same sources at several moments in time
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDataset {
    /// Received signal, one column per time point
    pub observations: Array2<f64>,
    /// Aligned source clips, one column per source
    pub sources: Array2<f64>,
    pub ids: Vec<String>,
    /// Start sample of the source clips used at every time point
    pub offsets: Vec<usize>,
    /// Source positions, one row per time point
    pub positions: Vec<Vec<Position>>,
    pub sample_rate: f64,
}

/// Record the sensor at `num_time_points` moments while the sources move
///
/// Source `j` contributes `s_j(t + offset_i) * r_init_j / r_ij` at time point `i`. With
/// `temporal_shift` the clips are read from a random offset of up to one second at every time
/// point after the first, which shortens the observations by one second. Time points at which a
/// source would be closer than the generator's minimum distance are pushed further along the
/// trajectories.
///
/// `distances` fixes the initial distance of every source, otherwise the generator draws them.
///
/// The observation matrix (samples x time points) is directly usable as FastICA input.
pub fn snapshots(
    store: &WaveformStore,
    ids: &[&str],
    generator: &ScenarioGenerator,
    distances: Option<&[f64]>,
    num_time_points: usize,
    temporal_shift: bool,
    rng: &mut impl Rng,
) -> Result<SnapshotDataset> {
    if num_time_points == 0 {
        return Err(Error::InvalidParameter(
            "number of time points must be positive".into(),
        ));
    }
    let clips = store.aligned(ids)?;
    let sample_rate = clips[0].sample_rate();
    let num_samples = clips[0].len();
    let shift = if temporal_shift {
        sample_rate.floor() as usize
    } else {
        0
    };
    if num_samples <= shift {
        return Err(Error::InvalidParameter(format!(
            "clips of {} samples are too short for a temporal shift of {} samples",
            num_samples, shift
        )));
    }
    let len = num_samples - shift;

    let mut sources = Array2::zeros((num_samples, clips.len()));
    for (mut column, clip) in sources.columns_mut().into_iter().zip(clips.iter()) {
        column.assign(&clip.samples());
    }

    let placements = match distances {
        Some(distances) if distances.len() != clips.len() => {
            return Err(Error::InvalidParameter(format!(
                "{} initial distances given for {} sources",
                distances.len(),
                clips.len()
            )));
        }
        Some(distances) => generator.place_at(distances, rng)?,
        None => generator.place(clips.len(), rng),
    };
    let r_init = placements
        .iter()
        .map(|p| p.initial.norm())
        .collect::<Vec<_>>();

    let mut positions = Vec::with_capacity(num_time_points);
    positions.push(placements.iter().map(|p| p.initial).collect::<Vec<_>>());
    for i in 1..num_time_points {
        let advance = |current: &[Position]| {
            current
                .iter()
                .zip(placements.iter())
                .map(|(pos, p)| *pos + p.step)
                .collect::<Vec<_>>()
        };
        let mut next = advance(&positions[i - 1]);
        while next
            .iter()
            .any(|pos| pos.norm() < generator.min_init_dist)
        {
            next = advance(&next);
        }
        positions.push(next);
    }

    let mut observations = Array2::zeros((len, num_time_points));
    let mut offsets = Vec::with_capacity(num_time_points);
    for (i, mut column) in observations.columns_mut().into_iter().enumerate() {
        let offset = if i > 0 && temporal_shift {
            rng.gen_range(0..shift.max(1))
        } else {
            0
        };
        for (j, clip) in clips.iter().enumerate() {
            let gain = r_init[j] / positions[i][j].norm();
            column.scaled_add(gain, &clip.samples().slice(s![offset..offset + len]));
        }
        offsets.push(offset);
    }
    debug!(
        "generated {} snapshots of {} samples from {} sources",
        num_time_points,
        len,
        clips.len()
    );

    Ok(SnapshotDataset {
        observations,
        sources,
        ids: ids.iter().map(|id| id.to_string()).collect(),
        offsets,
        positions,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use monoica::Waveform;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn store() -> WaveformStore {
        let mut store = WaveformStore::new();
        store
            .insert("a", Waveform::from_fn(300, 100., |t| (5. * t).sin()).unwrap())
            .unwrap();
        store
            .insert("b", Waveform::from_fn(250, 100., |t| (13. * t).cos()).unwrap())
            .unwrap();
        store
    }

    #[test]
    fn generator_validation() {
        assert!(ScenarioGenerator::new(0., 1., 1., 1.).is_err());
        assert!(ScenarioGenerator::new(1., 1., 1., -2.).is_err());
        assert!(ScenarioGenerator::new(1., 1., f64::NAN, 1.).is_err());
        assert!(ScenarioGenerator::new(10., 5., 3., 1.).is_ok());
    }

    #[test]
    fn placements_respect_minimums() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let generator = ScenarioGenerator::new(100., 95., 10., 9.5).unwrap();
        let placements = generator.place(200, &mut rng);

        assert_eq!(placements.len(), 200);
        for p in &placements {
            assert!(p.initial.norm() >= 95. - 1e-9);
            assert!(p.step.speed() >= 9.5 - 1e-9);
        }

        let fixed = generator.place_at(&[42., 7.], &mut rng).unwrap();
        assert_abs_diff_eq!(fixed[0].initial.norm(), 42., epsilon = 1e-9);
        assert!(generator.place_at(&[-1.], &mut rng).is_err());
    }

    #[test]
    fn snapshots_scale_sources_by_distance() {
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let generator = ScenarioGenerator::default();
        let data = snapshots(&store(), &["a", "b"], &generator, None, 4, false, &mut rng).unwrap();

        assert_eq!(data.observations.dim(), (250, 4));
        assert_eq!(data.sources.dim(), (250, 2));
        assert_eq!(data.offsets, vec![0; 4]);
        assert_eq!(data.positions.len(), 4);

        // first time point is the plain sum
        for n in 0..250 {
            assert_abs_diff_eq!(
                data.observations[(n, 0)],
                data.sources[(n, 0)] + data.sources[(n, 1)],
                epsilon = 1e-12
            );
        }

        for (i, row) in data.positions.iter().enumerate().skip(1) {
            assert!(row.iter().all(|p| p.norm() >= generator.min_init_dist()));
            let g0 = data.positions[0][0].norm() / row[0].norm();
            let g1 = data.positions[0][1].norm() / row[1].norm();
            assert_abs_diff_eq!(
                data.observations[(17, i)],
                g0 * data.sources[(17, 0)] + g1 * data.sources[(17, 1)],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn snapshots_at_known_distances() {
        let mut rng = Xoshiro256Plus::seed_from_u64(8);
        let generator = ScenarioGenerator::default();
        let distances = [600., 900.];
        let data = snapshots(
            &store(),
            &["a", "b"],
            &generator,
            Some(&distances[..]),
            3,
            false,
            &mut rng,
        )
        .unwrap();

        assert_abs_diff_eq!(data.positions[0][0].norm(), 600., epsilon = 1e-9);
        assert_abs_diff_eq!(data.positions[0][1].norm(), 900., epsilon = 1e-9);

        // gains are relative to the given distances
        for (i, row) in data.positions.iter().enumerate() {
            let g0 = 600. / row[0].norm();
            let g1 = 900. / row[1].norm();
            assert_abs_diff_eq!(
                data.observations[(40, i)],
                g0 * data.sources[(40, 0)] + g1 * data.sources[(40, 1)],
                epsilon = 1e-9
            );
        }

        assert!(snapshots(
            &store(),
            &["a", "b"],
            &generator,
            Some(&[600.][..]),
            3,
            false,
            &mut rng
        )
        .is_err());
        assert!(snapshots(
            &store(),
            &["a", "b"],
            &generator,
            Some(&[600., 0.][..]),
            3,
            false,
            &mut rng
        )
        .is_err());
    }

    #[test]
    fn temporal_shift_shortens_observations() {
        let mut rng = Xoshiro256Plus::seed_from_u64(5);
        let data = snapshots(
            &store(),
            &["a", "b"],
            &ScenarioGenerator::default(),
            None,
            3,
            true,
            &mut rng,
        )
        .unwrap();

        assert_eq!(data.observations.dim(), (150, 3));
        assert_eq!(data.offsets[0], 0);
        assert!(data.offsets.iter().all(|&o| o < 100));

        assert!(snapshots(
            &store(),
            &["a", "b"],
            &ScenarioGenerator::default(),
            None,
            0,
            false,
            &mut rng
        )
        .is_err());
    }
}
