//! Per-human within-host state and its per-step update (§3 "Within-host
//! state", §4.3).

use super::immunity::{DensityTable, ImmunityParams};
use super::infection::Infection;
use crate::error::CoreError;
use crate::genotype::{GenotypeId, GenotypeRegistry};
use crate::rng::PopulationRng;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Infection-list cap; overflow is silently dropped by contract (§4.3 step 2,
/// §7 range errors).
pub const MAX_INFECTIONS: usize = 21;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WithinHostStepOutput {
    pub total_density: f64,
    pub new_infections: u32,
    pub prob_transmission_to_mosquito: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithinHostState {
    infections: Vec<Infection>,
    cumulative_infections: u64,
    cumulative_x: f64,
    cumulative_h: f64,
    innate_immunity: f64,
    time_step_max_density: f64,
    patent_count: u32,
    recent_densities: VecDeque<f64>,
}

impl WithinHostState {
    pub fn new(innate_immunity: f64) -> Self {
        WithinHostState {
            infections: Vec::new(),
            cumulative_infections: 0,
            cumulative_x: 0.0,
            cumulative_h: 0.0,
            innate_immunity,
            time_step_max_density: 0.0,
            patent_count: 0,
            recent_densities: VecDeque::new(),
        }
    }

    pub fn infections(&self) -> &[Infection] {
        &self.infections
    }

    pub fn cumulative_infections(&self) -> u64 {
        self.cumulative_infections
    }

    pub fn patent_count(&self) -> u32 {
        self.patent_count
    }

    pub fn time_step_max_density(&self) -> f64 {
        self.time_step_max_density
    }

    /// Insert an infection that arrived via a route other than local EIR
    /// sampling (e.g. an imported infection), subject to the same
    /// `MAX_INFECTIONS` cap.
    pub fn insert_imported(&mut self, infection: Infection) {
        self.cumulative_infections += 1;
        if self.infections.len() < MAX_INFECTIONS {
            self.infections.push(infection);
        }
    }

    /// Apply a one-step reduction to accumulated pre-erythrocytic immunity
    /// following the "recent treatment suppresses immunity" variant
    /// (§4.3 "Immunity penalisation").
    pub fn penalise_immunity(&mut self, fraction: f64) {
        self.cumulative_x *= 1.0 - fraction.clamp(0.0, 1.0);
    }

    /// Run one time step of within-host dynamics for this human.
    ///
    /// `drug_factor` is the genotype-indexed per-step parasite survival
    /// factor from the PK/PD engine (§4.5); `genotype_weights` is this
    /// step's inoculation genotype breakdown (§4.1) used to sample new
    /// infections' genotypes.
    #[allow(clippy::too_many_arguments)]
    pub fn update_step(
        &mut self,
        now: SimTime,
        step_days: i64,
        eir: f64,
        availability: f64,
        genotypes: &GenotypeRegistry,
        genotype_weights: &[f64],
        drug_factor: &[f64],
        density_table: &DensityTable,
        immunity: &ImmunityParams,
        duration_mean_days: f64,
        duration_sigma: f64,
        age_years: f64,
        ipt_attenuation_factor: Option<f64>,
        rng: &mut PopulationRng,
    ) -> Result<WithinHostStepOutput, CoreError> {
        // 1. Age off cleared infections.
        self.infections.retain(|inf| !inf.is_expired(now));

        // 2. New infections: Poisson draw modulated by pre-erythrocytic
        // susceptibility.
        let susceptibility = immunity.susceptibility(self.cumulative_x, self.cumulative_h);
        let mean_inoculations = (eir * availability * susceptibility).max(0.0);
        let n_new = rng.poisson(mean_inoculations);
        let weight_sum: f64 = genotype_weights.iter().sum();
        for _ in 0..n_new {
            self.cumulative_infections += 1;
            if self.infections.len() >= MAX_INFECTIONS {
                continue; // silently truncated, §7 range error contract
            }
            let genotype = if weight_sum > 0.0 {
                let draw = rng.uniform_range(0.0, weight_sum);
                let mut cum = 0.0;
                let mut chosen = GenotypeId(genotype_weights.len() - 1);
                for (i, w) in genotype_weights.iter().enumerate() {
                    cum += w;
                    if draw < cum {
                        chosen = GenotypeId(i);
                        break;
                    }
                }
                chosen
            } else {
                genotypes.sample(rng.uniform01())
            };
            let duration = rng.log_normal_mean_sigma(duration_mean_days, duration_sigma).max(1.0);
            self.infections.push(Infection::new(genotype, now, duration));
        }

        // 3. Density update per infection.
        let maternal = immunity.maternal_protection(age_years);
        let noise_var = immunity.noise_variance(self.cumulative_x);
        let noise_sigma = noise_var.max(0.0).sqrt();
        for inf in &mut self.infections {
            let (age_bin, dur_bin) = inf.density_table_index(now);
            let mean_log = density_table.mean_log_density(age_bin, dur_bin);
            let mut density = mean_log.exp();
            density *= maternal;
            if noise_sigma > 0.0 {
                density = rng.log_normal_mean_sigma(density, noise_sigma);
            }
            let factor = drug_factor.get(inf.genotype.0).copied().unwrap_or(1.0);
            density *= factor;
            if inf.attenuated {
                if let Some(att) = ipt_attenuation_factor {
                    density *= att;
                }
            }
            inf.density = density.max(0.0);
            inf.cumulative_exposure += inf.density * step_days as f64;
        }

        // 4. Total density & patency.
        let raw_total: f64 = self.infections.iter().map(|i| i.density).sum();
        let bias = immunity.density_bias();
        let total_density = if raw_total > 0.0 {
            raw_total.max(immunity.detection_limit * bias)
        } else {
            0.0
        };
        self.time_step_max_density = total_density;
        self.patent_count = self
            .infections
            .iter()
            .filter(|i| i.is_patent(immunity.detection_limit))
            .count() as u32;

        // 5. Immunity accumulators.
        self.cumulative_x += total_density * step_days as f64;
        self.cumulative_h += n_new as f64;

        // 6. Infectiousness output: saturating function of a rolling mean.
        self.recent_densities.push_back(total_density);
        while self.recent_densities.len() > immunity.infectiousness_window_steps {
            self.recent_densities.pop_front();
        }
        let rolling_mean =
            self.recent_densities.iter().sum::<f64>() / self.recent_densities.len() as f64;
        let prob_transmission = immunity.infectiousness(rolling_mean, 1.0);

        Ok(WithinHostStepOutput {
            total_density,
            new_infections: n_new,
            prob_transmission_to_mosquito: prob_transmission,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::GenotypeDef;

    fn registry() -> GenotypeRegistry {
        GenotypeRegistry::build(vec![GenotypeDef {
            name: "wild".into(),
            initial_frequency: 1.0,
            alleles: vec![],
        }])
        .unwrap()
    }

    #[test]
    fn zero_eir_never_infects() {
        let genotypes = registry();
        let density_table = DensityTable::new(vec![vec![1.0]]);
        let immunity = ImmunityParams::default();
        let mut rng = PopulationRng::seed_from_u64(1);
        let mut host = WithinHostState::new(1.0);
        for day in 0..365 {
            let out = host
                .update_step(
                    SimTime::from_days(day),
                    1,
                    0.0,
                    1.0,
                    &genotypes,
                    &[1.0],
                    &[1.0],
                    &density_table,
                    &immunity,
                    100.0,
                    0.5,
                    20.0,
                    None,
                    &mut rng,
                )
                .unwrap();
            assert_eq!(out.new_infections, 0);
            assert_eq!(out.total_density, 0.0);
        }
        assert_eq!(host.cumulative_infections(), 0);
    }

    #[test]
    fn total_density_zero_iff_no_patent_infection() {
        let genotypes = registry();
        let density_table = DensityTable::new(vec![vec![5.0]]);
        let immunity = ImmunityParams::default();
        let mut rng = PopulationRng::seed_from_u64(2);
        let mut host = WithinHostState::new(1.0);
        let out = host
            .update_step(
                SimTime::zero(),
                1,
                1000.0,
                1.0,
                &genotypes,
                &[1.0],
                &[1.0],
                &density_table,
                &immunity,
                100.0,
                0.01,
                20.0,
                None,
                &mut rng,
            )
            .unwrap();
        if out.total_density == 0.0 {
            assert_eq!(host.patent_count(), 0);
        } else {
            assert!(host.patent_count() > 0);
        }
    }
}
