//! Non-human host populations and baited traps (§3 "non-human host
//! records"; supplemented from the original source material, which models
//! cattle/zoophily and ATSB-style baited traps as extra host-like
//! contributors to the same per-day aggregates).

use serde::{Deserialize, Serialize};

/// A non-human host population (e.g. cattle): contributes to the day's
/// seeking/feeding aggregates exactly like a human cohort, but is never
/// infected and so does not feed back into `P_dif`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NonHumanHost {
    pub name: String,
    pub relative_availability: f64,
    pub count: f64,
    pub p_b: f64,
    pub p_c: f64,
    pub p_d: f64,
    /// Fecundity multiplier applied to this host's contribution to
    /// `sigma_dff` (oviposition rate), 1.0 by default.
    pub fecundity_factor: f64,
}

impl NonHumanHost {
    pub fn avail_contribution(&self) -> f64 {
        self.relative_availability * self.count
    }

    pub fn df_contribution(&self) -> f64 {
        self.avail_contribution() * self.p_b * self.p_c * self.p_d
    }

    pub fn dff_contribution(&self) -> f64 {
        self.df_contribution() * self.fecundity_factor
    }
}

/// A baited trap: behaves like a non-human host for seeking/death
/// purposes but whose "feeding" always kills the mosquito rather than
/// releasing it to oviposit (so it contributes to `sum_avail`/seeking
/// death only, never to `sigma_df`/`sigma_dff`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaitedTrap {
    pub name: String,
    pub relative_availability: f64,
    pub count: f64,
}

impl BaitedTrap {
    pub fn avail_contribution(&self) -> f64 {
        self.relative_availability * self.count
    }
}

pub fn sum_nonhuman_avail(hosts: &[NonHumanHost], traps: &[BaitedTrap]) -> f64 {
    hosts.iter().map(NonHumanHost::avail_contribution).sum::<f64>()
        + traps.iter().map(BaitedTrap::avail_contribution).sum::<f64>()
}

pub fn sum_nonhuman_df(hosts: &[NonHumanHost]) -> f64 {
    hosts.iter().map(NonHumanHost::df_contribution).sum()
}

pub fn sum_nonhuman_dff(hosts: &[NonHumanHost]) -> f64 {
    hosts.iter().map(NonHumanHost::dff_contribution).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn baited_trap_contributes_avail_but_not_feeding() {
        let trap = BaitedTrap { name: "atsb1".into(), relative_availability: 0.2, count: 10.0 };
        assert_eq!(trap.avail_contribution(), 2.0);
    }

    #[test]
    fn nonhuman_host_feeding_chain_multiplies_probabilities() {
        let host = NonHumanHost {
            name: "cattle".into(),
            relative_availability: 1.0,
            count: 5.0,
            p_b: 0.9,
            p_c: 0.9,
            p_d: 0.9,
            fecundity_factor: 1.0,
        };
        assert_abs_diff_eq!(host.df_contribution(), 5.0 * 0.9 * 0.9 * 0.9, epsilon = 1e-9);
    }
}
