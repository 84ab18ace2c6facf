//! §4.4 clinical engine: pathogenesis, decision tree, parasite tests and
//! indirect-mortality bookkeeping.

pub mod decision;
pub mod mortality;
pub mod pathogenesis;
pub mod state;
pub mod test;

pub use decision::{Decision, DecisionId, DecisionKind, DecisionTree, DecisionValue, HostFacts, InputKind};
pub use pathogenesis::{ClinicalEvent, PathogenesisParams, Severity};
pub use state::{ClinicalState, NEVER};
pub use test::ParasiteTest;

use crate::rng::PopulationRng;

/// Outcome of one human's clinical step: the event (if any) to fold into
/// the survey stream, and the decoded decision-tree outcome (if a tree
/// fired) for the driver to turn into doses via its treatment table.
#[derive(Default)]
pub struct ClinicalStepOutput {
    pub event: Option<ClinicalEvent>,
    pub displaced_event: Option<ClinicalEvent>,
    pub decision_value: Option<DecisionValue>,
}

/// Run one step of pathogenesis + decision-tree evaluation for a human.
/// Indirect-mortality countdown is driven separately by the driver once a
/// severe episode is known (see `mortality::arm_doomed_counter`).
pub fn update_step(
    clinical: &mut ClinicalState,
    pathogenesis_params: &PathogenesisParams,
    tree: Option<&DecisionTree>,
    age_years: f64,
    time_step_max_density: f64,
    rng: &mut PopulationRng,
) -> ClinicalStepOutput {
    clinical.pyrogenic_threshold.update(pathogenesis_params, time_step_max_density);

    let mut out = ClinicalStepOutput::default();
    let event = pathogenesis::sample_event(
        pathogenesis_params,
        clinical.pyrogenic_threshold,
        time_step_max_density,
        rng,
    );
    let Some(event) = event else { return out };

    if let ClinicalEvent::Malaria(Severity::Severe) = event {
        mortality::arm_doomed_counter(&mut clinical.doomed_counter, mortality::DEFAULT_DOOMED_DELAY_STEPS);
    }

    if let Some(tree) = tree {
        let facts = HostFacts {
            age_years,
            severity: match &event {
                ClinicalEvent::Malaria(sev) => Some(*sev),
                ClinicalEvent::NonMalariaFever => None,
            },
            parasite_density: time_step_max_density,
        };
        if let Ok(decision_value) = tree.evaluate(&facts, rng) {
            // Dose issuance from the decoded decision value is scenario-
            // specific (drug choice -> dose schedule mapping); left to the
            // driver, which owns the drug registry and prescribes doses
            // via `PkState::prescribe`.
            out.decision_value = Some(decision_value);
        }
    }

    out.displaced_event = clinical.displace_event(event.clone());
    out.event = Some(event);
    out
}
