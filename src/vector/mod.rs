//! §4.1, §4.2 vector transmission engine: per-species delay-difference
//! mosquito state, emergence model variants, the α_t root-finder and the
//! annual-EIR fitting procedure.

pub mod emergence;
pub mod fitting;
pub mod nonhuman;
pub mod rootfinder;
pub mod species;

pub use emergence::{EmergenceModel, OvipositHistory};
pub use fitting::{FitReport, FittingConfig, FourierSeries};
pub use nonhuman::{BaitedTrap, NonHumanHost};
pub use species::{DayInputs, DayOutputs, SpeciesParams, SpeciesState};

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// One simulated anopheles species: its delay-difference state, selected
/// emergence model, and the oviposition history the MPD variant needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub state: SpeciesState,
    pub emergence: EmergenceModel,
    pub oviposit_history: OvipositHistory,
    pub hosts: Vec<NonHumanHost>,
    pub traps: Vec<BaitedTrap>,
}

impl Species {
    pub fn new(name: impl Into<String>, params: SpeciesParams, n_genotypes: usize, emergence: EmergenceModel) -> Self {
        Species {
            name: name.into(),
            state: SpeciesState::new(params, n_genotypes),
            emergence,
            oviposit_history: OvipositHistory::new(120),
            hosts: Vec::new(),
            traps: Vec::new(),
        }
    }

    /// Advance this species by one day given the human-derived aggregate
    /// inputs; non-human hosts and traps are folded in here so the
    /// driver only has to aggregate human contributions.
    pub fn advance_day(
        &mut self,
        day_of_year: usize,
        mut inputs: DayInputs,
        emergence_reduction: f64,
    ) -> Result<DayOutputs, CoreError> {
        inputs.nhh_avail += nonhuman::sum_nonhuman_avail(&self.hosts, &self.traps);
        inputs.nhh_sigma_df += nonhuman::sum_nonhuman_df(&self.hosts);
        inputs.nhh_sigma_dff += nonhuman::sum_nonhuman_dff(&self.hosts);

        let new_emergence =
            self.emergence.new_emergence(day_of_year, &self.oviposit_history, emergence_reduction);
        let out = self.state.advance_day(new_emergence, &inputs)?;

        let p_dff_today = inputs.sigma_dff + inputs.nhh_sigma_dff;
        self.oviposit_history.push(p_dff_today * out.avail_divisor);
        Ok(out)
    }
}

/// Genotype-indexed per-species partial EIR contributed to the human
/// population for the current step (§4.1 "At the end of the time step").
pub fn partial_eir(outputs: &DayOutputs) -> Vec<f64> {
    outputs
        .sporozoite_infectious
        .iter()
        .map(|s_v| s_v * outputs.avail_divisor)
        .collect()
}
