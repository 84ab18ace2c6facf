//! One simulated person (§3 "Human").

use crate::clinical::ClinicalState;
use crate::pkpd::PkState;
use crate::time::SimTime;
use crate::within_host::WithinHostState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HumanId(pub u64);

/// Named intervention cohort membership with an expiry time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubPopulationMembership {
    pub expiry: SimTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Human {
    pub id: HumanId,
    pub date_of_birth: SimTime,
    pub within_host: WithinHostState,
    pub clinical: ClinicalState,
    /// Log-normal, mean 1, drawn once at birth.
    pub availability_factor: f64,
    pub pk: PkState,
    pub sub_populations: HashMap<String, SubPopulationMembership>,
    pub monitoring_age_group: usize,
    pub alive: bool,
}

impl Human {
    pub fn new(
        id: HumanId,
        date_of_birth: SimTime,
        availability_factor: f64,
        innate_immunity: f64,
        treatment_seeking_factor: f64,
    ) -> Self {
        Human {
            id,
            date_of_birth,
            within_host: WithinHostState::new(innate_immunity),
            clinical: ClinicalState::new(treatment_seeking_factor),
            availability_factor,
            pk: PkState::default(),
            sub_populations: HashMap::new(),
            monitoring_age_group: 0,
            alive: true,
        }
    }

    pub fn age_days(&self, now: SimTime) -> i64 {
        (now - self.date_of_birth).max(0)
    }

    pub fn age_years(&self, now: SimTime) -> f64 {
        self.age_days(now) as f64 / 365.0
    }

    pub fn is_member(&self, cohort: &str, now: SimTime) -> bool {
        self.sub_populations
            .get(cohort)
            .map(|m| now.days() < m.expiry.days())
            .unwrap_or(false)
    }

    pub fn join_cohort(&mut self, cohort: impl Into<String>, expiry: SimTime) {
        self.sub_populations.insert(cohort.into(), SubPopulationMembership { expiry });
    }

    /// Drop cohort memberships whose expiry has passed.
    pub fn expire_cohorts(&mut self, now: SimTime) {
        self.sub_populations.retain(|_, m| now.days() < m.expiry.days());
    }

    /// Re-derive the monitoring age-group index from `bounds` (sorted
    /// upper bounds in years); returns `true` if the index changed.
    pub fn update_age_group(&mut self, now: SimTime, bounds: &[f64]) -> bool {
        let age = self.age_years(now);
        let new_group = bounds.iter().position(|&b| age < b).unwrap_or(bounds.len());
        let changed = new_group != self.monitoring_age_group;
        self.monitoring_age_group = new_group;
        changed
    }
}
