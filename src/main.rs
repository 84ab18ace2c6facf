//! CLI entry point: parse arguments, load the scenario, run the
//! simulation driver to completion and translate the result into a
//! process exit code (§6, §7).

use anoph_sim_core::driver::cli::Cli;
use anoph_sim_core::driver::{self, Model};
use anoph_sim_core::genotype::GenotypeRegistry;
use anoph_sim_core::scenario::{self, EntomologyMode};
use anoph_sim_core::time::TimeStep;
use anoph_sim_core::vector::{EmergenceModel, Species, SpeciesParams};
use clap::Parser;
use std::path::{Path, PathBuf};

fn resource_relative(resource_path: Option<&Path>, path: &Path) -> PathBuf {
    match resource_path {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn build_species(scenario: &scenario::Scenario, n_genotypes: usize) -> Vec<Species> {
    match &scenario.entomology {
        EntomologyMode::ForcedEir { .. } => Vec::new(),
        EntomologyMode::Vector { species } => species
            .iter()
            .map(|s| {
                let params = SpeciesParams {
                    theta_d: s.theta_d,
                    tau: s.tau,
                    theta_s: s.theta_s,
                    p_b: s.p_b,
                    p_c: s.p_c,
                    p_d: s.p_d,
                    p_e: s.p_e,
                    mu_va: s.mu_va,
                    human_blood_index: s.human_blood_index,
                    s_v_min: s.s_v_min,
                };
                // A zero schedule until `Phase::VectorFitting` installs the
                // fitted one (§4.2); `OneLifeSpan` runs this placeholder so
                // the delay arrays are warm by the time fitting samples them.
                Species::new(s.name.clone(), params, n_genotypes, EmergenceModel::Forced { n_v0: [0.0; 365] })
            })
            .collect(),
    }
}

/// Assemble the read-only `Model` from a validated scenario: drugs,
/// decision tree and treatment table are all optional scenario sections
/// (§6); absent any of them this core runs with no prescribable drugs
/// and/or no clinical decision tree, which is a legitimate scenario (a
/// pure natural-history run).
fn build_model(scenario: &scenario::Scenario) -> Result<Model, anoph_sim_core::CoreError> {
    let genotypes = GenotypeRegistry::build(scenario.genotypes.clone())?;
    let step = TimeStep::new(scenario.step_days)?;
    let drugs = scenario.build_drug_registry()?;
    let decision_tree = scenario.build_decision_tree()?;
    let treatment = scenario.build_treatment_table(decision_tree.as_ref(), &drugs)?;
    Ok(Model {
        genotypes,
        drugs,
        decision_tree,
        treatment,
        density_table: scenario.build_density_table(),
        immunity: scenario.immunity.clone(),
        pathogenesis: scenario.pathogenesis.clone(),
        age_group_bounds: scenario.monitoring.age_group_bounds_years.clone(),
        step,
    })
}

fn print_model(scenario: &scenario::Scenario, model: &Model) {
    println!("schema_version={}", scenario.schema_version);
    println!("step_days={}", scenario.step_days);
    println!("population_size={}", scenario.population_size);
    println!("end_time_days={}", scenario.end_time_days);
    println!("genotypes={}", model.genotypes.n());
    println!("age_group_bounds={:?}", model.age_group_bounds);
}

fn print_eir(scenario: &scenario::Scenario) {
    match &scenario.entomology {
        EntomologyMode::ForcedEir { daily_eir } => {
            for (day, eir) in daily_eir.iter().enumerate() {
                println!("{day}\t{eir}");
            }
        }
        EntomologyMode::Vector { species } => {
            for s in species {
                println!(
                    "{}\tannual_eir_target={}\trotate={}",
                    s.name, s.annual_eir_target, s.eir_rotate_angle
                );
            }
        }
    }
}

fn print_interventions(scenario: &scenario::Scenario) {
    for i in &scenario.interventions {
        println!("{}\t{}\t{:?}", i.time_days, i.duration_days, i.action);
    }
}

fn print_survey_times(scenario: &scenario::Scenario) {
    for t in &scenario.monitoring.survey_times_days {
        println!("{t}");
    }
}

fn print_genotypes(model: &Model) {
    for id in model.genotypes.ids() {
        println!("{}\t{}", id.0, model.genotypes.name(id));
    }
}

fn print_sample_interpolations() {
    // Demonstrates the Fourier-to-daily interpolation the fitter relies
    // on, independent of any loaded scenario.
    use anoph_sim_core::vector::FourierSeries;
    let series = FourierSeries { a0: 0.0, a: vec![-0.92, 0.0], b: vec![-0.69, 0.40] };
    for (day, value) in series.daily_values().iter().enumerate().step_by(30) {
        println!("{day}\t{value}");
    }
}

fn init_tracing(debug_vector_fitting: bool) {
    use tracing_subscriber::EnvFilter;
    let default_directive = if debug_vector_fitting {
        "info,anoph_sim_core::vector::fitting=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run() -> Result<(), anoph_sim_core::CoreError> {
    let cli = Cli::parse();
    init_tracing(cli.debug_vector_fitting);

    let scenario_path = cli.resolved_scenario_path().ok_or_else(|| anoph_sim_core::CoreError::Scenario {
        location: "command line".into(),
        message: "no scenario given: pass --scenario FILE or --name NAME".into(),
    })?;
    let scenario_path = resource_relative(cli.resource_path.as_deref(), &scenario_path);
    let scenario = scenario::load_from_json(&scenario_path)?;

    if cli.validate_only {
        println!("scenario is valid");
        return Ok(());
    }

    let model = build_model(&scenario)?;

    if cli.print_model {
        print_model(&scenario, &model);
        return Ok(());
    }
    if cli.print_eir {
        print_eir(&scenario);
        return Ok(());
    }
    if cli.print_interventions {
        print_interventions(&scenario);
        return Ok(());
    }
    if cli.print_survey_times {
        print_survey_times(&scenario);
        return Ok(());
    }
    if cli.print_genotypes {
        print_genotypes(&model);
        return Ok(());
    }
    if cli.sample_interpolations {
        print_sample_interpolations();
        return Ok(());
    }

    let species = build_species(&scenario, model.genotypes.n());
    let output_path = cli
        .resolved_output_path()
        .map(|p| resource_relative(cli.resource_path.as_deref(), &p))
        .ok_or_else(|| anoph_sim_core::CoreError::Scenario {
            location: "command line".into(),
            message: "no survey output path given: pass --output FILE or --name NAME".into(),
        })?;
    let mut survey_out = driver::survey::open_output(&output_path, cli.compress_output)?;

    let mut ctsout_file = match cli.resolved_ctsout_path() {
        Some(p) if scenario.monitoring.continuous_output_period_days.is_some() => {
            let p = resource_relative(cli.resource_path.as_deref(), &p);
            Some(std::io::BufWriter::new(std::fs::File::create(p)?))
        }
        _ => None,
    };

    let seed = 1;
    driver::run(
        &cli,
        &scenario,
        &model,
        species,
        &mut *survey_out,
        ctsout_file.as_mut().map(|w| w as &mut dyn std::io::Write),
        seed,
    )?;
    Ok(())
}

fn main() {
    let result = run();
    std::process::exit(driver::run_to_exit_code(result));
}
