mod common;

use anoph_sim_core::driver::{self, Phase};
use common::{forced_eir_scenario, model_for};

fn cli_with_checkpoint(path: &std::path::Path, stop: bool) -> anoph_sim_core::driver::Cli {
    let mut cli = anoph_sim_core::driver::Cli::default_for_test();
    cli.checkpoint = true;
    cli.checkpoint_file = Some(path.to_path_buf());
    cli.checkpoint_stop = stop;
    cli
}

/// A run interrupted mid-`MainPhase` by `--checkpoint-stop`, then resumed
/// from the checkpoint, must reach `EndSim` and reproduce byte-identical
/// survey output to an uninterrupted run with the same seed (§6
/// "Checkpoint format", §8 determinism).
#[test]
fn resuming_from_a_mid_run_checkpoint_reproduces_an_uninterrupted_run() {
    let scenario = forced_eir_scenario(60);
    let model = model_for(&scenario);
    let seed = 9;

    let mut straight_out = Vec::new();
    driver::run(&anoph_sim_core::driver::Cli::default_for_test(), &scenario, &model, Vec::new(), &mut straight_out, None, seed)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("run");

    let mut first_leg_out = Vec::new();
    let stopped = driver::run(&cli_with_checkpoint(&base, true), &scenario, &model, Vec::new(), &mut first_leg_out, None, seed)
        .unwrap();
    assert_ne!(stopped.phase, Phase::EndSim, "checkpoint-stop must interrupt before EndSim");

    let mut second_leg_out = Vec::new();
    let resumed = driver::run(&cli_with_checkpoint(&base, false), &scenario, &model, Vec::new(), &mut second_leg_out, None, seed)
        .unwrap();
    assert_eq!(resumed.phase, Phase::EndSim);

    let mut combined = first_leg_out;
    combined.extend(second_leg_out);
    assert_eq!(combined, straight_out);
}

#[test]
fn an_incomplete_checkpoint_file_falls_back_to_a_fresh_run() {
    let scenario = forced_eir_scenario(20);
    let model = model_for(&scenario);
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("run");

    // No checkpoint has ever been written at `base`; resuming from it
    // (rather than erroring out) falls back to a fresh `SimulationState`.
    let mut out = Vec::new();
    let state = driver::run(&cli_with_checkpoint(&base, false), &scenario, &model, Vec::new(), &mut out, None, 1).unwrap();
    assert_eq!(state.phase, Phase::EndSim);
}
