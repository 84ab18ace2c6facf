//! Pre-erythrocytic and blood-stage immunity saturation functions, and the
//! baseline age/duration density table (§4.3).

use serde::{Deserialize, Serialize};

/// Scenario-supplied immunity and density parameters (§4.3). Read-only
/// after scenario load, shared by every human (§5 shared resource policy).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImmunityParams {
    /// Half-saturation constant for cumulative exposure X in the
    /// pre-erythrocytic susceptibility function.
    pub x_star_p: f64,
    /// Half-saturation constant for cumulative inoculations h.
    pub h_star_p: f64,
    /// Baseline (unmodulated) log-density noise variance.
    pub sigma0_sq: f64,
    /// Scale of the exposure-dependent shrinkage of noise variance.
    pub sigma_x_scale: f64,
    pub decay_m: f64,
    pub detection_limit: f64,
    pub density_bias_garki: f64,
    pub density_bias_non_garki: f64,
    pub garki: bool,
    /// Number of trailing time steps folded into the infectiousness
    /// rolling window (§4.3 step 6).
    pub infectiousness_window_steps: usize,
    pub infectiousness_scale: f64,
    pub infectiousness_half_saturation: f64,
    /// Fraction of cumulative pre-erythrocytic exposure X wiped out on a
    /// human's first treatment event, in the "treatment suppresses
    /// acquired immunity" mode (§4.3 "Immunity penalisation"). Zero
    /// disables the effect.
    pub treatment_immunity_penalty: f64,
}

impl Default for ImmunityParams {
    fn default() -> Self {
        ImmunityParams {
            x_star_p: 1514.385853,
            h_star_p: 97.3361,
            sigma0_sq: 1.82625,
            sigma_x_scale: 0.655,
            decay_m: 2.411434,
            detection_limit: 2.0,
            density_bias_garki: 2.0,
            density_bias_non_garki: 1.0,
            garki: false,
            infectiousness_window_steps: 20,
            infectiousness_scale: 0.031,
            infectiousness_half_saturation: 1.0,
            treatment_immunity_penalty: 0.0,
        }
    }
}

impl ImmunityParams {
    pub fn density_bias(&self) -> f64 {
        if self.garki {
            self.density_bias_garki
        } else {
            self.density_bias_non_garki
        }
    }

    /// Saturating pre-erythrocytic susceptibility in [0, 1]; 1 when naive.
    pub fn susceptibility(&self, cumulative_x: f64, cumulative_h: f64) -> f64 {
        let sx = self.x_star_p / (self.x_star_p + cumulative_x);
        let sh = self.h_star_p / (self.h_star_p + cumulative_h);
        (sx * sh).clamp(0.0, 1.0)
    }

    /// Shrinking noise variance as cumulative exposure X grows.
    pub fn noise_variance(&self, cumulative_x: f64) -> f64 {
        self.sigma0_sq / (1.0 + cumulative_x / self.sigma_x_scale)
    }

    pub fn maternal_protection(&self, age_years: f64) -> f64 {
        if age_years >= 1.0 {
            1.0
        } else {
            (-self.decay_m * age_years).exp()
        }
    }

    /// Saturating onward-transmission probability from a rolling mean
    /// density (§4.3 step 6).
    pub fn infectiousness(&self, rolling_mean_density: f64, vaccine_factor: f64) -> f64 {
        if rolling_mean_density <= 0.0 {
            return 0.0;
        }
        let base = rolling_mean_density
            / (rolling_mean_density + self.infectiousness_half_saturation)
            * self.infectiousness_scale;
        (base * vaccine_factor).clamp(0.0, 1.0)
    }
}

/// Baseline mean log-parasite density indexed by `(age_bin, duration_bin)`
/// in 5-day bins, scenario-supplied (§4.3 step 3). Out-of-range indices
/// clamp to the nearest edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DensityTable {
    rows: Vec<Vec<f64>>,
}

impl DensityTable {
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        assert!(!rows.is_empty(), "density table must have at least one row");
        DensityTable { rows }
    }

    pub fn mean_log_density(&self, age_bin: usize, duration_bin: usize) -> f64 {
        let row = &self.rows[age_bin.min(self.rows.len() - 1)];
        row[duration_bin.min(row.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn susceptibility_is_one_when_naive() {
        let p = ImmunityParams::default();
        assert_abs_diff_eq!(p.susceptibility(0.0, 0.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn susceptibility_decreases_with_exposure() {
        let p = ImmunityParams::default();
        let naive = p.susceptibility(0.0, 0.0);
        let exposed = p.susceptibility(5000.0, 200.0);
        assert!(exposed < naive);
    }

    #[test]
    fn maternal_protection_saturates_at_one_year() {
        let p = ImmunityParams::default();
        assert_abs_diff_eq!(p.maternal_protection(1.0), 1.0, epsilon = 1e-9);
        assert!(p.maternal_protection(0.0) < 1.0);
    }

    #[test]
    fn density_table_clamps_out_of_range_indices() {
        let table = DensityTable::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(table.mean_log_density(99, 99), 4.0);
    }
}
