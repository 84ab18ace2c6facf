//! Integer day-count time and the simulation's fixed step length.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Days from the simulation epoch (the first simulated day). May be negative
/// during warm-up bookkeeping (e.g. "start - one lifespan").
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(i64);

impl SimTime {
    /// Sentinel for "never happened" (e.g. a human's last-treatment time
    /// before any treatment).
    pub const MIN: SimTime = SimTime(i64::MIN);

    pub const fn zero() -> Self {
        SimTime(0)
    }

    pub const fn from_days(days: i64) -> Self {
        SimTime(days)
    }

    pub const fn days(self) -> i64 {
        self.0
    }

    pub fn rem_euclid(self, modulus: i64) -> i64 {
        self.0.rem_euclid(modulus)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.0)
    }
}

impl Add<i64> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: i64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = i64;
    fn sub(self, rhs: SimTime) -> i64 {
        self.0 - rhs.0
    }
}

impl Sub<i64> for SimTime {
    type Output = SimTime;
    fn sub(self, rhs: i64) -> SimTime {
        SimTime(self.0 - rhs)
    }
}

impl AddAssign<i64> for SimTime {
    fn add_assign(&mut self, rhs: i64) {
        self.0 += rhs;
    }
}

/// Fixed time-step length in days, and the derived units the rest of the
/// core works with. `365` must be divisible by `step_days`; the scenario
/// loader is responsible for rejecting configurations that violate this.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStep {
    step_days: i64,
}

impl TimeStep {
    pub fn new(step_days: i64) -> Result<Self, crate::error::CoreError> {
        if step_days != 1 && step_days != 5 {
            return Err(crate::error::CoreError::Scenario {
                location: "scenario/model/parameters/@stepDays".into(),
                message: format!("stepDays must be 1 or 5, got {step_days}"),
            });
        }
        if 365 % step_days != 0 {
            return Err(crate::error::CoreError::Scenario {
                location: "scenario/model/parameters/@stepDays".into(),
                message: "365 is not divisible by stepDays".into(),
            });
        }
        Ok(TimeStep { step_days })
    }

    pub fn days(self) -> i64 {
        self.step_days
    }

    pub fn steps_per_year(self) -> i64 {
        365 / self.step_days
    }

    /// Number of whole steps represented by `t` (floor division).
    pub fn in_steps(self, t: SimTime) -> i64 {
        t.days().div_euclid(self.step_days)
    }

    pub fn one_step(self) -> i64 {
        self.step_days
    }

    pub fn one_year(self) -> i64 {
        365
    }
}

impl Default for TimeStep {
    fn default() -> Self {
        TimeStep { step_days: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_step_length() {
        assert!(TimeStep::new(3).is_err());
    }

    #[test]
    fn steps_per_year_five_day() {
        let ts = TimeStep::new(5).unwrap();
        assert_eq!(ts.steps_per_year(), 73);
    }

    #[test]
    fn sim_time_arithmetic() {
        let a = SimTime::from_days(10);
        let b = a + 5;
        assert_eq!(b.days(), 15);
        assert_eq!(b - a, 5);
    }

    #[test]
    fn rem_euclid_handles_negative() {
        let t = SimTime::from_days(-3);
        assert_eq!(t.rem_euclid(5), 2);
    }
}
