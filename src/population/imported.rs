//! Imported infections: a background rate of infections seeded from
//! outside the simulated population, independent of local EIR
//! (supplemented from the original source material; not covered by the
//! distilled vector/within-host description but needed for realistic
//! elimination-scenario dynamics).

use crate::genotype::GenotypeRegistry;
use crate::population::Population;
use crate::rng::PopulationRng;
use crate::time::SimTime;
use crate::within_host::infection::Infection;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportedInfectionsParams {
    /// Mean number of imported infections per time step, population-wide.
    pub rate_per_step: f64,
    pub duration_mean_days: f64,
    pub duration_sigma: f64,
}

/// Seed imported infections directly into randomly-chosen humans'
/// within-host infection lists, bypassing EIR sampling entirely.
pub fn apply_imported_infections(
    population: &mut Population,
    genotypes: &GenotypeRegistry,
    params: &ImportedInfectionsParams,
    now: SimTime,
    rng: &mut PopulationRng,
) -> u32 {
    if params.rate_per_step <= 0.0 || population.is_empty() {
        return 0;
    }
    let n = rng.poisson(params.rate_per_step);
    let len = population.len();
    for _ in 0..n {
        let idx = rng.index(len);
        let genotype = genotypes.sample(rng.uniform01());
        let duration =
            rng.log_normal_mean_sigma(params.duration_mean_days, params.duration_sigma).max(1.0);
        if let Some(human) = population.iter_mut().nth(idx) {
            let infection = Infection::new(genotype, now, duration);
            human.within_host.insert_imported(infection);
        }
    }
    n
}
