//! Timed interventions (§4.6 step 3, §6 "interventions list with
//! deployment times and sub-population rules").
//!
//! Each scenario intervention fires once at its deployment time and
//! either (a) modifies one vector species' parameters for a fixed
//! duration, or (b) enrolls a coverage-fraction of the living population
//! into a named sub-population with an expiry. Vector modifiers are
//! additive/multiplicative against the day's `DayInputs` the same way a
//! non-human host or baited trap would contribute (§4.1 "Any active
//! intervention modifiers").

use crate::population::Population;
use crate::rng::PopulationRng;
use crate::time::SimTime;
use crate::vector::DayInputs;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum InterventionAction {
    /// Multiplies the targeted species' daily emergence by `1 - reduction`.
    EmergenceReduction { reduction: f64 },
    /// Adds a constant hazard to the targeted species' seeking-death rate
    /// (`nu_A`, §4.1).
    SeekingDeathRateIncrease { rate: f64 },
    /// Multiplies the targeted species' oviposition survival by
    /// `1 - kill_prob`.
    ProbDeathOvipositing { kill_prob: f64 },
    /// Installs a sugar-bait-style target kill probability, consumed by
    /// the α_t root-finder (§4.1).
    SugarBait { target_kill_prob: f64 },
    /// Enrolls a `coverage` fraction of the living population into
    /// `cohort`, each membership expiring `duration_days` after
    /// enrollment. Applied once, at deployment time.
    CohortDeployment { cohort: String, coverage: f64 },
}

/// One scenario-declared intervention: a deployment time, an optional
/// species target (ignored by `CohortDeployment`), a duration for vector
/// modifiers, and the action itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InterventionDeployment {
    pub time_days: i64,
    pub species_index: usize,
    pub duration_days: i64,
    pub action: InterventionAction,
}

/// A vector-modifying intervention currently in effect, tracked so its
/// contribution can be withdrawn once `expiry` passes. Checkpointed
/// alongside the rest of the simulation state (§6 checkpoint format).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveVectorIntervention {
    pub species_index: usize,
    pub expiry: SimTime,
    pub action: InterventionAction,
}

/// Interventions currently deployed, and the index of the next
/// not-yet-applied entry in the scenario's deployment list (deployments
/// are processed in time order, matching the scenario's declaration
/// order for same-day ties).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InterventionManager {
    active: Vec<ActiveVectorIntervention>,
    next_deployment: usize,
}

impl InterventionManager {
    pub fn new() -> Self {
        InterventionManager::default()
    }

    /// Activate every deployment due at or before `now` that hasn't fired
    /// yet, expire any vector modifier whose duration has elapsed, and
    /// enroll cohort memberships immediately.
    pub fn apply_due(
        &mut self,
        deployments: &[InterventionDeployment],
        now: SimTime,
        population: &mut Population,
        rng: &mut PopulationRng,
    ) {
        while self.next_deployment < deployments.len()
            && deployments[self.next_deployment].time_days <= now.days()
        {
            let deployment = &deployments[self.next_deployment];
            match &deployment.action {
                InterventionAction::CohortDeployment { cohort, coverage } => {
                    let expiry = now + deployment.duration_days.max(0);
                    for human in population.iter_mut() {
                        if human.alive && rng.bernoulli(*coverage) {
                            human.join_cohort(cohort.clone(), expiry);
                        }
                    }
                }
                _ => {
                    self.active.push(ActiveVectorIntervention {
                        species_index: deployment.species_index,
                        expiry: now + deployment.duration_days.max(1),
                        action: deployment.action.clone(),
                    });
                }
            }
            self.next_deployment += 1;
        }

        self.active.retain(|a| a.expiry > now);
    }

    /// Fold every currently-active vector modifier targeting `species_index`
    /// into `inputs` (and return the combined emergence-reduction factor,
    /// since that one is consumed directly by `Species::advance_day`
    /// rather than stored on `DayInputs`).
    pub fn fold_into(&self, species_index: usize, inputs: &mut DayInputs) -> f64 {
        let mut emergence_reduction = 1.0;
        inputs.oviposit_survival_modifier = 1.0;
        for active in self.active.iter().filter(|a| a.species_index == species_index) {
            match &active.action {
                InterventionAction::EmergenceReduction { reduction } => {
                    emergence_reduction *= (1.0 - reduction).clamp(0.0, 1.0);
                }
                InterventionAction::SeekingDeathRateIncrease { rate } => {
                    inputs.seeking_death_rate_increase += rate;
                }
                InterventionAction::ProbDeathOvipositing { kill_prob } => {
                    inputs.oviposit_survival_modifier *= (1.0 - kill_prob).clamp(0.0, 1.0);
                }
                InterventionAction::SugarBait { target_kill_prob } => {
                    inputs.atsb_target_prob = Some(
                        inputs.atsb_target_prob.map_or(*target_kill_prob, |p| p.max(*target_kill_prob)),
                    );
                }
                InterventionAction::CohortDeployment { .. } => unreachable!(
                    "cohort deployments are applied directly in apply_due, never queued as active"
                ),
            }
        }
        emergence_reduction
    }
}
