//! Per-species mosquito population state: the delay-difference arrays
//! and their daily update (§3 "Vector state", §4.1).
//!
//! Arrays are ring buffers of length `L_v = theta_s + tau`, indexed
//! modulo `L_v`. The incubation-completion term feeding `S_v` sums the
//! newly-infected cohort (`P_dif`) over the trailing `tau`-day window
//! ending at `d - theta_s`, each weighted by a cached product of `P_df`
//! spanning the `theta_s - tau` days between infection and incubation
//! completion — our reading of the spec's "cached f_τ sums" (see
//! DESIGN.md for the rationale; the exact bookkeeping of that cache was
//! left unspecified in the source material).

use super::rootfinder;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeciesParams {
    pub theta_d: f64,
    pub tau: usize,
    pub theta_s: usize,
    pub p_b: f64,
    pub p_c: f64,
    pub p_d: f64,
    pub p_e: f64,
    pub mu_va: f64,
    pub human_blood_index: f64,
    pub s_v_min: f64,
}

impl SpeciesParams {
    pub fn l_v(&self) -> usize {
        self.theta_s + self.tau
    }
}

/// Aggregate inputs to one day's update, summed across humans and any
/// non-human host populations (§4.1 "Inputs to one day update").
#[derive(Clone, Debug, Default)]
pub struct DayInputs {
    pub sum_avail: f64,
    pub sigma_df: f64,
    pub sigma_dif: Vec<f64>,
    pub sigma_dff: f64,
    pub nhh_avail: f64,
    pub nhh_sigma_df: f64,
    pub nhh_sigma_dff: f64,
    pub seeking_death_rate_increase: f64,
    /// Product of `(1 - oviposit-death modifier)` across active
    /// interventions.
    pub oviposit_survival_modifier: f64,
    /// Target kill probability for an active ATSB-style intervention, if
    /// any (§4.1).
    pub atsb_target_prob: Option<f64>,
}

/// One day's derived outputs, consumed by the driver to fold into the
/// next day's per-human EIR sampling.
#[derive(Clone, Debug, Default)]
pub struct DayOutputs {
    pub sporozoite_infectious: Vec<f64>, // per genotype, sum S_v[d][g]
    pub avail_divisor: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeciesState {
    params: SpeciesParams,
    n_genotypes: usize,
    day: i64,
    p_a: Vec<f64>,
    p_df: Vec<f64>,
    p_dff: Vec<f64>,
    p_dif: Vec<Vec<f64>>,
    n_v: Vec<f64>,
    o_v: Vec<Vec<f64>>,
    s_v: Vec<Vec<f64>>,
}

impl SpeciesState {
    pub fn new(params: SpeciesParams, n_genotypes: usize) -> Self {
        let l_v = params.l_v();
        SpeciesState {
            n_v: vec![0.0; l_v],
            o_v: vec![vec![0.0; n_genotypes]; l_v],
            s_v: vec![vec![0.0; n_genotypes]; l_v],
            p_a: vec![1.0; l_v],
            p_df: vec![0.0; l_v],
            p_dff: vec![0.0; l_v],
            p_dif: vec![vec![0.0; n_genotypes]; l_v],
            params,
            n_genotypes,
            day: -1,
        }
    }

    pub fn l_v(&self) -> usize {
        self.params.l_v()
    }

    fn idx(&self, day: i64) -> usize {
        day.rem_euclid(self.l_v() as i64) as usize
    }

    pub fn current_day(&self) -> i64 {
        self.day
    }

    pub fn human_blood_index(&self) -> f64 {
        self.params.human_blood_index
    }

    pub fn seed_equilibrium(&mut self, n_v: f64, o_v: &[f64], s_v: &[f64]) {
        for slot in self.n_v.iter_mut() {
            *slot = n_v;
        }
        for row in self.o_v.iter_mut() {
            row.copy_from_slice(o_v);
        }
        for row in self.s_v.iter_mut() {
            row.copy_from_slice(s_v);
        }
    }

    pub fn sum_sv(&self, day: i64, genotype: usize) -> f64 {
        self.s_v[self.idx(day)][genotype]
    }

    /// Product of `P_df` over the `n`-day window ending at `end_day`
    /// inclusive (the cached incubation-overlap survival term).
    fn p_df_window_product(&self, end_day: i64, n: usize) -> f64 {
        let mut product = 1.0;
        for k in 0..n as i64 {
            product *= self.p_df[self.idx(end_day - k)].max(1e-12);
        }
        product
    }

    /// Advance the species state by one day. `new_emergence` is the
    /// day's newly-emerging adult count from the selected emergence
    /// model (§4.1 "Emergence model variants").
    pub fn advance_day(
        &mut self,
        new_emergence: f64,
        inputs: &DayInputs,
    ) -> Result<DayOutputs, CoreError> {
        let d = self.day + 1;
        let l_v = self.l_v() as i64;
        let tau = self.params.tau as i64;
        let theta_s = self.params.theta_s as i64;

        let mut nu_a = self.params.mu_va
            + inputs.seeking_death_rate_increase
            + inputs.sum_avail
            + inputs.nhh_avail;

        if let Some(pi) = inputs.atsb_target_prob {
            let alpha_t = rootfinder::solve_alpha_t(nu_a, self.params.theta_d, pi)?;
            nu_a += alpha_t;
        }

        let p_a_d = (-nu_a * self.params.theta_d).exp();
        let avail_divisor = if nu_a > 0.0 {
            (1.0 - p_a_d) / nu_a
        } else {
            self.params.theta_d
        };
        let alpha_e = avail_divisor * self.params.p_e * inputs.oviposit_survival_modifier;

        let p_df_d = (inputs.sigma_df + inputs.nhh_sigma_df) * alpha_e;
        let p_dff_d = (inputs.sigma_dff + inputs.nhh_sigma_dff) * alpha_e;
        let p_dif_d: Vec<f64> = inputs.sigma_dif.iter().map(|s| s * alpha_e).collect();

        self.p_a[self.idx(d)] = p_a_d;
        self.p_df[self.idx(d)] = p_df_d;
        self.p_dff[self.idx(d)] = p_dff_d;
        self.p_dif[self.idx(d)] = p_dif_d.clone();

        let prev = self.idx(d - 1);
        let lag_tau = self.idx(d - tau);

        let n_v_new = new_emergence
            + self.p_a[prev] * self.n_v[prev]
            + self.p_dff[lag_tau].max(0.0) * self.n_v[lag_tau];
        self.n_v[self.idx(d)] = n_v_new.max(0.0);

        let uninfected_lag_tau = {
            let n = self.n_v[lag_tau];
            let infected: f64 = (0..self.n_genotypes)
                .map(|g| self.o_v[lag_tau][g] + self.s_v[lag_tau][g])
                .sum();
            (n - infected).max(0.0)
        };

        // Survival window between a mosquito becoming infected and
        // completing the feeding cycle already accounted for by the
        // `P_df[d-tau]` recursion term below (§4.1 "f_τ products").
        let graduation_window = (theta_s - tau).max(0) as usize;

        let mut sporozoite_infectious = vec![0.0; self.n_genotypes];
        for g in 0..self.n_genotypes {
            let o_v_new = self.p_dif[lag_tau][g] * uninfected_lag_tau
                + self.p_a[prev] * self.o_v[prev][g]
                + self.p_df[lag_tau] * self.o_v[lag_tau][g];

            let mut graduating = 0.0;
            for l in 0..tau {
                let day_l = d - theta_s - l;
                if day_l < 0 {
                    continue;
                }
                let lag_l = self.idx(day_l);
                let uninfected_l = (self.n_v[lag_l] - self.o_v[lag_l][g] - self.s_v[lag_l][g]).max(0.0);
                let survival = self.p_df_window_product(day_l + graduation_window as i64, graduation_window);
                graduating += self.p_dif[lag_l][g] * uninfected_l * survival;
            }
            let s_v_new = graduating + self.p_a[prev] * self.s_v[prev][g] + self.p_df[lag_tau] * self.s_v[lag_tau][g];

            let o_v_new = o_v_new.max(0.0);
            let mut s_v_new = s_v_new.max(0.0);
            if s_v_new < self.params.s_v_min {
                s_v_new = 0.0;
            }
            self.o_v[self.idx(d)][g] = o_v_new;
            self.s_v[self.idx(d)][g] = s_v_new;
            sporozoite_infectious[g] = s_v_new;
        }

        // §8 invariant 1: N_v must never fall below the infected+infectious
        // total. A violation here means the recursion itself is wrong, not
        // a rounding nit to silently paper over — surface it as the
        // numerical error §7/§8 call for.
        let total_infected: f64 = (0..self.n_genotypes)
            .map(|g| self.o_v[self.idx(d)][g] + self.s_v[self.idx(d)][g])
            .sum();
        if total_infected > self.n_v[self.idx(d)] + 1e-6 {
            return Err(CoreError::Numerical {
                message: format!(
                    "vector invariant violated on day {d}: N_v={} < infected+infectious total={total_infected}",
                    self.n_v[self.idx(d)]
                ),
                dump_path: None,
            });
        }

        self.day = d;
        let _ = l_v;
        Ok(DayOutputs { sporozoite_infectious, avail_divisor })
    }
}
