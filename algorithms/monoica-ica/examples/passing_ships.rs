//! Two ships pass a hydrophone, the recording is separated with every ICA variant.
//!
//! Run with `RUST_LOG=info` to follow the pipeline.
use std::f64::consts::PI;

use monoica::metrics::Assignment;
use monoica::prelude::{Fit, Waveform, WaveformStore};
use monoica_datasets::{Position, Velocity};
use monoica_ica::scenario::{ScenarioOutcome, ScenarioParams};
use monoica_ica::{ComplexFastIcaSolver, IcaError, IcaVariant};

fn main() -> Result<(), IcaError> {
    let _ = env_logger::try_init();

    let fs = 1000.;
    let mut store = WaveformStore::new();
    store.insert(
        "engine",
        Waveform::from_fn(4000, fs, |t| (2. * PI * 50. * t).sin())?,
    )?;
    // the propeller drifts by a quarter period every 200 samples
    let propeller = (0..4000)
        .map(|n| 2. * (2. * PI * 135. * n as f64 / fs + (n / 200) as f64 * PI / 2.).sin())
        .collect();
    store.insert("propeller", Waveform::new(propeller, fs)?)?;

    let scenario = ScenarioParams::new(fs, 4., 1.)
        .source("engine", Position::new(-20., 10.), Velocity::new(20., 0.))
        .source("propeller", Position::new(-60., 10.), Velocity::new(20., 0.))
        .window_len(200)
        .hop(200)
        .segment_len(200)
        .max_iterations(1000)
        .random_state(42)
        .solver(ComplexFastIcaSolver::default());

    for variant in [
        IcaVariant::TimeDomain,
        IcaVariant::FrequencyReal,
        IcaVariant::FrequencyComplex,
    ]
    .iter()
    {
        let params = scenario.clone().ica_variant(*variant);
        let outcome: ScenarioOutcome = Fit::<WaveformStore, IcaError>::fit(&params, &store)?;

        println!("{:?}: score {:.3}", variant, outcome.evaluation.score());
        for assignment in outcome.evaluation.assignments() {
            match assignment {
                Assignment::Matched(score) => println!(
                    "  component {} -> {} (similarity {:.3}, correlation {:.3})",
                    score.component,
                    outcome.mixture.sources()[score.source].id(),
                    score.similarity,
                    score.correlation
                ),
                Assignment::Unidentified {
                    component,
                    best_similarity,
                } => println!(
                    "  component {} unidentified (best similarity {:.3})",
                    component, best_similarity
                ),
            }
        }
    }

    Ok(())
}
