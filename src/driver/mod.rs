//! The simulation driver: phase state machine, per-step loop, checkpoint
//! and survey I/O, and the top-level CLI entry point (§4.6, §5, §6, §7).

pub mod checkpoint;
pub mod cli;
pub mod continuous;
pub mod intervention;
pub mod phase;
pub mod survey;

pub use cli::Cli;
pub use continuous::ContinuousOutput;
pub use intervention::{InterventionAction, InterventionDeployment, InterventionManager};
pub use phase::Phase;
pub use survey::{SurveyBuffer, SurveyKey};

use crate::clinical::{self, mortality, DecisionTree};
use crate::error::CoreError;
use crate::genotype::GenotypeRegistry;
use crate::pkpd::dose::Dose;
use crate::pkpd::drug::{DrugId, DrugRegistry};
use crate::population::{self, Population};
use crate::rng::PopulationRng;
use crate::scenario::{EntomologyMode, Scenario};
use crate::time::{SimTime, TimeStep};
use crate::vector::species::DayInputs;
use crate::vector::{self, EmergenceModel, FittingConfig, FourierSeries, Species, SpeciesParams};
use crate::within_host::{DensityTable, ImmunityParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;

/// Stable survey measure ids (§6 "measure ids are a stable closed
/// enumeration"). Only the subset this core emits is listed; discontinued
/// ids are never reused.
pub mod measure {
    pub const NEW_INFECTIONS: u32 = 1;
    pub const PATENT_HOSTS: u32 = 2;
    pub const UNCOMPLICATED_EPISODES: u32 = 3;
    pub const SEVERE_EPISODES: u32 = 4;
    pub const INDIRECT_DEATHS: u32 = 5;
    pub const SIMULATED_EIR: u32 = 6;
}

/// Per-step aggregate values, sampled into the continuous-output stream
/// when the scenario configures a sampling period (§6 "Output files").
#[derive(Clone, Debug, Default)]
pub struct StepSummary {
    pub simulated_eir: f64,
    pub new_infections: u32,
    pub patent_hosts: u32,
}

/// Maps a decision tree's treatment outcome to a drug and a single dose;
/// scenario-specific regimen detail (split dosing, weight-based mg/kg
/// scaling) is left to the scenario loader that constructs this table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TreatmentTable {
    pub decision_bit_offset: u32,
    pub decision_bit_width: u32,
    pub dose_by_outcome: HashMap<u32, (DrugId, f64)>,
}

/// Everything read-only after construction, shared by every human (§5
/// "shared resource policy"). Not checkpointed: re-derivable from the
/// scenario (§4.6 design notes).
pub struct Model {
    pub genotypes: GenotypeRegistry,
    pub drugs: DrugRegistry,
    pub decision_tree: Option<DecisionTree>,
    pub treatment: Option<TreatmentTable>,
    pub density_table: DensityTable,
    pub immunity: ImmunityParams,
    pub pathogenesis: crate::clinical::PathogenesisParams,
    pub age_group_bounds: Vec<f64>,
    pub step: TimeStep,
}

/// Checkpointed simulation state (§6 "Checkpoint format" field order).
#[derive(Serialize, Deserialize)]
pub struct SimulationState {
    pub population: Population,
    pub species: Vec<Species>,
    pub maternal_window: mortality::MaternalPrevalenceWindow,
    pub survey: SurveyBuffer,
    pub now: SimTime,
    pub previous: SimTime,
    pub phase: Phase,
    pub rng: PopulationRng,
    pub interventions: InterventionManager,
    #[serde(skip)]
    pending_inputs: Vec<DayInputs>,
}

impl SimulationState {
    pub fn new(scenario: &Scenario, species: Vec<Species>, seed: u64) -> Self {
        let n_species = species.len();
        SimulationState {
            population: Population::new(),
            species,
            maternal_window: mortality::MaternalPrevalenceWindow::new(scenario.step_days),
            survey: SurveyBuffer::new(),
            now: SimTime::from_days(-(scenario.demography.max_age_years as i64) * 365),
            previous: SimTime::zero(),
            phase: Phase::Starting,
            rng: PopulationRng::seed_from_u64(seed),
            interventions: InterventionManager::new(),
            pending_inputs: vec![DayInputs::default(); n_species],
        }
    }

    fn ensure_pending_inputs(&mut self) {
        if self.pending_inputs.len() != self.species.len() {
            self.pending_inputs = vec![DayInputs::default(); self.species.len()];
        }
    }

    /// Run one time step of the per-step loop (§4.6).
    pub fn run_step(&mut self, model: &Model, scenario: &Scenario) -> Result<StepSummary, CoreError> {
        self.ensure_pending_inputs();
        self.previous = self.now;
        let day_of_year = self.now.rem_euclid(365) as usize;

        // 1. Interventions due today activate before the vector engine runs,
        // so their modifiers apply to this step's advance (§4.6 step 3).
        self.interventions.apply_due(
            &scenario.interventions,
            self.now,
            &mut self.population,
            &mut self.rng,
        );

        // 2. Vector engine: advance each species using inputs accumulated
        // during the previous step (mosquito state is fully updated before
        // any human draws EIR from it this step -- §5 ordering guarantees).
        let mut partial_eir_by_species: Vec<Vec<f64>> = Vec::with_capacity(self.species.len());
        if matches!(scenario.entomology, EntomologyMode::Vector { .. }) {
            for (i, species) in self.species.iter_mut().enumerate() {
                let mut inputs = std::mem::take(&mut self.pending_inputs[i]);
                let emergence_reduction = self.interventions.fold_into(i, &mut inputs);
                let out = species.advance_day(day_of_year, inputs, emergence_reduction)?;
                partial_eir_by_species.push(vector::partial_eir(&out));
            }
        }
        for inputs in self.pending_inputs.iter_mut() {
            *inputs = DayInputs::default();
        }

        let n_genotypes = model.genotypes.n();
        let mut total_eir_by_genotype = vec![0.0; n_genotypes];
        let forced_daily_eir = match &scenario.entomology {
            EntomologyMode::ForcedEir { daily_eir } => {
                let idx = (self.now.days().rem_euclid(daily_eir.len().max(1) as i64)) as usize;
                Some(daily_eir.get(idx).copied().unwrap_or(0.0))
            }
            EntomologyMode::Vector { .. } => {
                for species_eir in &partial_eir_by_species {
                    for (g, v) in species_eir.iter().enumerate() {
                        total_eir_by_genotype[g] += v;
                    }
                }
                None
            }
        };
        if let Some(eir) = forced_daily_eir {
            // Forced-EIR mode carries no per-genotype breakdown; weight it
            // by each genotype's initial frequency (§9 open question:
            // forced-EIR genotype split).
            for g in model.genotypes.ids() {
                total_eir_by_genotype[g.0] = eir * model.genotypes.initial_freq(g);
            }
        }

        // 3. Per-human updates, in stable population order.
        let n_age_groups = model.age_group_bounds.len() + 1;
        let mut new_infections_total = 0u32;
        let mut patent_total = 0u32;
        let mut indirect_deaths = 0u32;
        let mut pregnant_age_prevalence_sum = 0.0;
        let mut pregnant_age_count = 0u32;
        let mut new_infections_by_age = vec![0u32; n_age_groups];
        let mut patent_by_age = vec![0u32; n_age_groups];
        let mut uncomplicated_by_age = vec![0u32; n_age_groups];
        let mut severe_by_age = vec![0u32; n_age_groups];

        for human in self.population.iter_mut() {
            let age_years = human.age_years(self.now);
            let age_days = human.age_days(self.now);
            human.update_age_group(self.now, &model.age_group_bounds);
            let age_group = human.monitoring_age_group as u32;
            let eir = total_eir_by_genotype.iter().sum::<f64>() * human.availability_factor;

            let drug_factor =
                human.pk.advance_step(&model.drugs, &model.genotypes, scenario.step_days as f64)?;

            let wh_out = human.within_host.update_step(
                self.now,
                scenario.step_days,
                eir,
                human.availability_factor,
                &model.genotypes,
                &total_eir_by_genotype,
                &drug_factor,
                &model.density_table,
                &model.immunity,
                scenario.duration_mean_days,
                scenario.duration_sigma,
                age_years,
                None,
                &mut self.rng,
            )?;
            new_infections_total += wh_out.new_infections;
            new_infections_by_age[age_group as usize] += wh_out.new_infections;
            if wh_out.total_density > 0.0 {
                patent_total += 1;
                patent_by_age[age_group as usize] += 1;
            }

            // Feed this human's feeding/infectiousness contribution into
            // next step's vector inputs, weighted by species' human blood
            // index (§4.1 "inputs to one day update").
            for (i, species) in self.species.iter().enumerate() {
                let hbi = species.state.human_blood_index();
                let df = human.availability_factor * hbi;
                self.pending_inputs[i].sum_avail += human.availability_factor * hbi;
                self.pending_inputs[i].sigma_df += df;
                self.pending_inputs[i].sigma_dff += df;
                if self.pending_inputs[i].sigma_dif.len() != n_genotypes {
                    self.pending_inputs[i].sigma_dif = vec![0.0; n_genotypes];
                }
                let prob = wh_out.prob_transmission_to_mosquito;
                for v in self.pending_inputs[i].sigma_dif.iter_mut() {
                    *v += df * prob / n_genotypes.max(1) as f64;
                }
            }

            let clinical_out = clinical::update_step(
                &mut human.clinical,
                &model.pathogenesis,
                model.decision_tree.as_ref(),
                age_years,
                wh_out.total_density,
                &mut self.rng,
            );

            if let Some(event) = &clinical_out.displaced_event {
                count_event(
                    event,
                    &mut uncomplicated_by_age[age_group as usize],
                    &mut severe_by_age[age_group as usize],
                );
            }

            if let Some(value) = clinical_out.decision_value {
                if let Some(table) = &model.treatment {
                    let outcome = value.get(table.decision_bit_offset, table.decision_bit_width);
                    if let Some((drug, mg)) = table.dose_by_outcome.get(&outcome) {
                        human.pk.prescribe(Dose { drug: *drug, timing_offset: 0.0, mg: *mg });
                        if human.clinical.last_treatment == crate::clinical::NEVER {
                            human.within_host.penalise_immunity(model.immunity.treatment_immunity_penalty);
                        }
                        human.clinical.last_treatment = self.now;
                    }
                }
            }

            if (15.0..45.0).contains(&age_years) {
                pregnant_age_count += 1;
                pregnant_age_prevalence_sum += if wh_out.total_density > 0.0 { 1.0 } else { 0.0 };
            }

            let _ = age_days;
        }

        self.maternal_window.record(if pregnant_age_count > 0 {
            pregnant_age_prevalence_sum / pregnant_age_count as f64
        } else {
            0.0
        });

        // Imported infections bypass EIR sampling entirely.
        if let Some(params) = &scenario.imported_infections {
            population::apply_imported_infections(
                &mut self.population,
                &model.genotypes,
                params,
                self.now,
                &mut self.rng,
            );
        }

        // 4. Age bookkeeping: expire cohorts, tick doomed counters, kill,
        // compact, append newborns.
        let mut indirect_deaths_by_age = vec![0u32; n_age_groups];
        for human in self.population.iter_mut() {
            human.expire_cohorts(self.now);
            if mortality::tick_doomed_counter(&mut human.clinical.doomed_counter) {
                human.alive = false;
                indirect_deaths += 1;
                indirect_deaths_by_age[human.monitoring_age_group] += 1;
            }
            if human.age_days(self.now) > (scenario.demography.max_age_years * 365.0) as i64 {
                human.alive = false;
            }
        }
        self.population.compact();

        let expected_births = self.population.len() as f64 * scenario.step_days as f64
            / (scenario.demography.max_age_years * 365.0 * 2.0);
        let n_births = self.rng.poisson(expected_births.max(0.0));
        for _ in 0..n_births {
            let availability = self.rng.log_normal_mean_sigma(1.0, 0.5);
            let innate_immunity = self.rng.log_normal_mean_sigma(1.0, 0.3);
            let treatment_seeking = self.rng.log_normal_mean_sigma(1.0, 0.3);
            self.population.append_newborn(self.now, availability, innate_immunity, treatment_seeking);
        }

        // 5. Survey accumulation (flush happens at the driver's survey
        // boundary check, see `maybe_flush_survey`), broken down by each
        // human's monitoring age group (§3 "monitoring age-group index",
        // §6 "ageCohortId = 1000*cohortSetOutputId + ageGroup + 1").
        let key = |measure_id, age_group| SurveyKey { measure_id, age_group, cohort_set_output_id: 0 };
        for g in 0..n_age_groups as u32 {
            let i = g as usize;
            self.survey.accumulate(key(measure::NEW_INFECTIONS, g), new_infections_by_age[i] as f64);
            self.survey.accumulate(key(measure::PATENT_HOSTS, g), patent_by_age[i] as f64);
            self.survey
                .accumulate(key(measure::UNCOMPLICATED_EPISODES, g), uncomplicated_by_age[i] as f64);
            self.survey.accumulate(key(measure::SEVERE_EPISODES, g), severe_by_age[i] as f64);
            self.survey.accumulate(key(measure::INDIRECT_DEATHS, g), indirect_deaths_by_age[i] as f64);
        }
        let simulated_eir = forced_daily_eir.unwrap_or_else(|| total_eir_by_genotype.iter().sum());
        self.survey.accumulate(key(measure::SIMULATED_EIR, 0), simulated_eir);

        self.now += scenario.step_days;
        Ok(StepSummary { simulated_eir, new_infections: new_infections_total, patent_hosts: patent_total })
    }

    /// Flush the survey buffer if `self.now` lands on a configured survey
    /// time (§4.6 step 5).
    pub fn maybe_flush_survey(&mut self, scenario: &Scenario, writer: &mut dyn Write) -> Result<bool, CoreError> {
        if scenario.monitoring.survey_times_days.contains(&self.now.days()) {
            self.survey.flush(writer)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Fold one step's recorded population inputs into a day-of-year running
/// sum (§4.2 stage 2's `quinquennialP_dif` capture).
fn accumulate_day_inputs(acc: &mut DayInputs, sample: &DayInputs) {
    acc.sum_avail += sample.sum_avail;
    acc.sigma_df += sample.sigma_df;
    acc.sigma_dff += sample.sigma_dff;
    acc.nhh_avail += sample.nhh_avail;
    acc.nhh_sigma_df += sample.nhh_sigma_df;
    acc.nhh_sigma_dff += sample.nhh_sigma_dff;
    if acc.sigma_dif.len() != sample.sigma_dif.len() {
        acc.sigma_dif = vec![0.0; sample.sigma_dif.len()];
    }
    for (a, s) in acc.sigma_dif.iter_mut().zip(sample.sigma_dif.iter()) {
        *a += s;
    }
}

fn average_day_inputs(sum: &DayInputs, count: u32) -> DayInputs {
    if count == 0 {
        return DayInputs { oviposit_survival_modifier: 1.0, ..Default::default() };
    }
    let n = count as f64;
    DayInputs {
        sum_avail: sum.sum_avail / n,
        sigma_df: sum.sigma_df / n,
        sigma_dif: sum.sigma_dif.iter().map(|v| v / n).collect(),
        sigma_dff: sum.sigma_dff / n,
        nhh_avail: sum.nhh_avail / n,
        nhh_sigma_df: sum.nhh_sigma_df / n,
        nhh_sigma_dff: sum.nhh_sigma_dff / n,
        seeking_death_rate_increase: 0.0,
        oviposit_survival_modifier: 1.0,
        atsb_target_prob: None,
    }
}

fn species_params_from_scenario(sp: &crate::scenario::SpeciesScenario) -> SpeciesParams {
    SpeciesParams {
        theta_d: sp.theta_d,
        tau: sp.tau,
        theta_s: sp.theta_s,
        p_b: sp.p_b,
        p_c: sp.p_c,
        p_d: sp.p_d,
        p_e: sp.p_e,
        mu_va: sp.mu_va,
        human_blood_index: sp.human_blood_index,
        s_v_min: sp.s_v_min,
    }
}

/// Average effective host-seeking availability window across the fitted
/// year, used as the fitter's scalar `avail_divisor` (§4.2 stage 1).
fn estimate_avail_divisor(params: &SpeciesParams, inputs: &[DayInputs; 365]) -> f64 {
    let total: f64 = inputs
        .iter()
        .map(|day| {
            let nu_a = params.mu_va + day.sum_avail + day.nhh_avail;
            let p_a = (-nu_a * params.theta_d).exp();
            if nu_a > 0.0 {
                (1.0 - p_a) / nu_a
            } else {
                params.theta_d
            }
        })
        .sum();
    total / 365.0
}

fn count_event(event: &crate::clinical::ClinicalEvent, uncomplicated: &mut u32, severe: &mut u32) {
    use crate::clinical::{ClinicalEvent, Severity};
    match event {
        ClinicalEvent::Malaria(Severity::Uncomplicated) => *uncomplicated += 1,
        ClinicalEvent::Malaria(Severity::Severe) => *severe += 1,
        ClinicalEvent::NonMalariaFever => {}
    }
}

/// Run the phase state machine to completion, writing survey output and
/// (optionally) checkpoints, and return the final state for inspection
/// (§4.6 "Phase state machine").
pub fn run(
    cli: &Cli,
    scenario: &Scenario,
    model: &Model,
    species: Vec<Species>,
    survey_out: &mut dyn Write,
    ctsout: Option<&mut dyn Write>,
    seed: u64,
) -> Result<SimulationState, CoreError> {
    let mut continuous = ctsout.map(|w| {
        (w, ContinuousOutput::new(vec!["simulated_eir".into(), "new_infections".into(), "patent_hosts".into()]))
    });
    let forced_eir_only = matches!(scenario.entomology, EntomologyMode::ForcedEir { .. });
    let mut state = if let Some(checkpoint_base) = cli.checkpoint_file.as_deref() {
        match checkpoint::read_checkpoint::<SimulationState>(checkpoint_base) {
            Ok(mut restored) => {
                restored.ensure_pending_inputs();
                restored
            }
            Err(_) => SimulationState::new(scenario, species, seed),
        }
    } else {
        SimulationState::new(scenario, species, seed)
    };

    let one_life_span_steps = scenario.demography.max_age_years as i64 * 365 / scenario.step_days;
    let end_time = SimTime::from_days(scenario.end_time_days);

    // Per-species, per-day-of-year averages of the population-derived
    // vector inputs recorded during `OneLifeSpan`, consumed by the
    // fitter as the `quinquennialP_dif` table (§4.2 stage 2).
    let empty_year: [DayInputs; 365] = std::array::from_fn(|_| DayInputs::default());
    let mut quinquennial_sum: Vec<[DayInputs; 365]> = vec![empty_year; state.species.len()];
    let mut quinquennial_count: Vec<[u32; 365]> = vec![[0u32; 365]; state.species.len()];

    loop {
        match state.phase {
            Phase::Starting => {
                let mut ages = Vec::new();
                let n = scenario.population_size as usize;
                for i in 0..n {
                    let fraction = (i as f64 + 0.5) / n as f64;
                    let age_days = (fraction * scenario.demography.max_age_years * 365.0) as i64;
                    ages.push(age_days);
                }
                state.population.seed_from_age_pyramid(state.now, ages, &mut state.rng);
                state.phase = state.phase.next(forced_eir_only);
            }
            Phase::OneLifeSpan => {
                for _ in 0..one_life_span_steps {
                    state.run_step(model, scenario)?;
                    let day_of_year = state.now.rem_euclid(365) as usize;
                    for (i, acc) in quinquennial_sum.iter_mut().enumerate() {
                        accumulate_day_inputs(&mut acc[day_of_year], &state.pending_inputs[i]);
                        quinquennial_count[i][day_of_year] += 1;
                    }
                }
                state.phase = state.phase.next(forced_eir_only);
            }
            Phase::VectorFitting => {
                if let EntomologyMode::Vector { species: species_scenarios } = &scenario.entomology {
                    for (i, sp_scn) in species_scenarios.iter().enumerate() {
                        let quinquennial: [DayInputs; 365] = std::array::from_fn(|d| {
                            average_day_inputs(&quinquennial_sum[i][d], quinquennial_count[i][d])
                        });
                        let params = species_params_from_scenario(sp_scn);
                        let avail_divisor_estimate = estimate_avail_divisor(&params, &quinquennial);
                        let target = FourierSeries {
                            a0: sp_scn.fourier_a0,
                            a: sp_scn.fourier_a.clone(),
                            b: sp_scn.fourier_b.clone(),
                        }
                        .rotate(sp_scn.eir_rotate_angle);

                        let report = vector::fitting::fit(
                            &target,
                            &params,
                            &quinquennial,
                            avail_divisor_estimate,
                            &FittingConfig::default(),
                        )?;
                        tracing::info!(
                            species = %sp_scn.name,
                            iterations = report.iterations,
                            relative_error = report.final_relative_error,
                            "vector fitting converged"
                        );
                        if let Some(species) = state.species.get_mut(i) {
                            species.emergence = EmergenceModel::Forced { n_v0: report.n_v0 };
                        }
                    }
                }
                state.phase = state.phase.next(forced_eir_only);
            }
            Phase::MainPhase => {
                while state.now < end_time {
                    let summary = state.run_step(model, scenario)?;
                    if let (Some(period), Some((writer, output))) =
                        (scenario.monitoring.continuous_output_period_days, continuous.as_mut())
                    {
                        if period > 0 && state.now.days() % period == 0 {
                            output.write_row(
                                writer,
                                &[
                                    summary.simulated_eir,
                                    summary.new_infections as f64,
                                    summary.patent_hosts as f64,
                                ],
                            )?;
                        }
                    }
                    state.maybe_flush_survey(scenario, survey_out)?;
                    if cli.checkpoint {
                        if let Some(base) = cli.checkpoint_file.as_deref() {
                            checkpoint::write_checkpoint(base, &state)?;
                            if cli.checkpoint_stop {
                                return Ok(state);
                            }
                        }
                    }
                }
                state.phase = state.phase.next(forced_eir_only);
            }
            Phase::EndSim => {
                state.survey.flush(survey_out)?;
                return Ok(state);
            }
        }
    }
}

/// Convert a top-level run result into a process exit code (§7
/// "Propagation policy"): 0 on success, 1 on user/scenario error
/// (including help/version, handled upstream by `clap`), other non-zero
/// on internal error.
pub fn run_to_exit_code(result: Result<(), CoreError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err @ CoreError::Scenario { .. }) => {
            eprintln!("{err}");
            1
        }
        Err(err @ CoreError::Io(_)) => {
            eprintln!("{err}");
            1
        }
        Err(err) => {
            eprintln!("{err}");
            if let CoreError::Numerical { dump_path: Some(path), .. } = &err {
                eprintln!("diagnostic dump: {}", path.display());
            }
            2
        }
    }
}
