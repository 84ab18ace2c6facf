//! A single concurrent infection within one human's within-host state
//! (§3 "Infection", §4.3).

use crate::genotype::GenotypeId;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};

/// Infections are tracked in 5-day bins for both age and duration when
/// indexing the baseline density table (§4.3 step 3).
pub const DENSITY_BIN_DAYS: i64 = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Infection {
    pub genotype: GenotypeId,
    pub start: SimTime,
    /// Sampled total duration, in days.
    pub duration_days: f64,
    /// Parasites/µL, zero once cleared and awaiting removal.
    pub density: f64,
    /// Integral of density over time since infection start, used by the
    /// infection-level drug-pressure / immunity bookkeeping.
    pub cumulative_exposure: f64,
    pub attenuated: bool,
}

impl Infection {
    pub fn new(genotype: GenotypeId, start: SimTime, duration_days: f64) -> Self {
        debug_assert!(duration_days > 0.0);
        Infection {
            genotype,
            start,
            duration_days,
            density: 0.0,
            cumulative_exposure: 0.0,
            attenuated: false,
        }
    }

    pub fn age_days(&self, now: SimTime) -> i64 {
        (now - self.start).max(0)
    }

    pub fn is_expired(&self, now: SimTime) -> bool {
        (self.age_days(now) as f64) >= self.duration_days
    }

    pub fn is_patent(&self, detection_threshold: f64) -> bool {
        self.density >= detection_threshold
    }

    /// `(age_bin, duration_bin)` index into the baseline density table.
    pub fn density_table_index(&self, now: SimTime) -> (usize, usize) {
        let age_bin = (self.age_days(now) / DENSITY_BIN_DAYS).max(0) as usize;
        let duration_bin = ((self.duration_days as i64) / DENSITY_BIN_DAYS).max(0) as usize;
        (age_bin, duration_bin)
    }
}
