use anoph_sim_core::clinical::PathogenesisParams;
use anoph_sim_core::driver::{Cli, Model};
use anoph_sim_core::genotype::{GenotypeDef, GenotypeRegistry};
use anoph_sim_core::scenario::{
    DemographyParams, EntomologyMode, MonitoringParams, Scenario, SpeciesScenario, CORE_SCHEMA_VERSION,
};
use anoph_sim_core::time::TimeStep;
use anoph_sim_core::within_host::ImmunityParams;

/// A 200-person, two-age-group scenario on a forced daily EIR series,
/// the cheapest entomology mode for whole-run integration tests.
pub fn forced_eir_scenario(end_time_days: i64) -> Scenario {
    Scenario {
        schema_version: CORE_SCHEMA_VERSION,
        step_days: 1,
        population_size: 200,
        end_time_days,
        demography: DemographyParams {
            age_group_bounds_years: vec![5.0, 15.0, 100.0],
            age_group_proportions: vec![0.15, 0.2, 0.65],
            max_age_years: 80.0,
        },
        entomology: EntomologyMode::ForcedEir { daily_eir: vec![0.5; 365] },
        genotypes: vec![GenotypeDef { name: "wild".into(), initial_frequency: 1.0, alleles: vec![] }],
        immunity: ImmunityParams::default(),
        pathogenesis: PathogenesisParams::default(),
        imported_infections: None,
        monitoring: MonitoringParams {
            survey_times_days: (30..=end_time_days).step_by(30).collect(),
            age_group_bounds_years: vec![5.0, 15.0, 100.0],
            continuous_output_period_days: Some(30),
        },
        duration_mean_days: 180.0,
        duration_sigma: 0.5,
        interventions: Vec::new(),
        drugs: Vec::new(),
        decisions: Vec::new(),
        treatment: None,
        density_table: None,
    }
}

/// A single-species mosquito-population scenario, exercising vector
/// fitting (§4.2) and the full `OneLifeSpan` -> `VectorFitting` ->
/// `MainPhase` phase sequence (§4.6).
pub fn vector_scenario(end_time_days: i64) -> Scenario {
    let mut s = forced_eir_scenario(end_time_days);
    s.entomology = EntomologyMode::Vector {
        species: vec![SpeciesScenario {
            name: "gambiae".into(),
            theta_d: 3.0,
            tau: 3,
            theta_s: 11,
            p_b: 0.95,
            p_c: 0.95,
            p_d: 0.95,
            p_e: 0.95,
            mu_va: 0.1,
            human_blood_index: 0.9,
            s_v_min: 1e-8,
            annual_eir_target: 10.0,
            fourier_a0: 0.0,
            fourier_a: vec![-0.9, 0.0],
            fourier_b: vec![-0.6, 0.3],
            eir_rotate_angle: 0.0,
        }],
    };
    s
}

pub fn model_for(scenario: &Scenario) -> Model {
    let drugs = scenario.build_drug_registry().unwrap();
    let decision_tree = scenario.build_decision_tree().unwrap();
    let treatment = scenario.build_treatment_table(decision_tree.as_ref(), &drugs).unwrap();
    Model {
        genotypes: GenotypeRegistry::build(scenario.genotypes.clone()).unwrap(),
        drugs,
        decision_tree,
        treatment,
        density_table: scenario.build_density_table(),
        immunity: scenario.immunity.clone(),
        pathogenesis: scenario.pathogenesis.clone(),
        age_group_bounds: scenario.monitoring.age_group_bounds_years.clone(),
        step: TimeStep::new(scenario.step_days).unwrap(),
    }
}

pub fn cli() -> Cli {
    Cli::default_for_test()
}

pub fn read_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.is_empty()).collect()
}
