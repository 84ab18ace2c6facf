//! Indirect-mortality bookkeeping: the per-human doomed-counter countdown
//! and the population's rolling maternal-prevalence estimate used for
//! neonatal indirect mortality (§4.4 "Indirect mortality").

use crate::rng::PopulationRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of time steps a severe episode's indirect-mortality countdown
/// runs before the human is marked dead, absent scenario override.
pub const DEFAULT_DOOMED_DELAY_STEPS: u32 = 5;

/// Arm the doomed counter on a human following a resolved severe episode.
/// A previously-armed counter is not reset early (the first severe
/// episode's countdown wins).
pub fn arm_doomed_counter(current: &mut Option<u32>, delay_steps: u32) {
    if current.is_none() {
        *current = Some(delay_steps);
    }
}

/// Advance the doomed counter by one step; returns `true` exactly once,
/// on the step the countdown reaches zero.
pub fn tick_doomed_counter(current: &mut Option<u32>) -> bool {
    match current {
        Some(0) => {
            *current = None;
            true
        }
        Some(n) => {
            *n -= 1;
            false
        }
        None => false,
    }
}

/// Five-month (≈150 day) rolling record of population-wide parasite
/// prevalence among pregnant-age women, used to estimate neonatal
/// indirect-mortality risk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaternalPrevalenceWindow {
    window_steps: usize,
    samples: VecDeque<f64>,
}

impl MaternalPrevalenceWindow {
    pub fn new(step_days: i64) -> Self {
        let window_steps = ((150 + step_days - 1) / step_days).max(1) as usize;
        MaternalPrevalenceWindow {
            window_steps,
            samples: VecDeque::new(),
        }
    }

    pub fn record(&mut self, prevalence: f64) {
        self.samples.push_back(prevalence);
        while self.samples.len() > self.window_steps {
            self.samples.pop_front();
        }
    }

    pub fn rolling_mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// Neonatal indirect-mortality risk as a function of the rolling maternal
/// prevalence estimate (scenario-calibrated scale and floor).
pub fn neonatal_mortality_risk(rolling_maternal_prevalence: f64, scale: f64, floor: f64) -> f64 {
    (floor + scale * rolling_maternal_prevalence).clamp(0.0, 1.0)
}

pub fn sample_neonatal_death(
    rolling_maternal_prevalence: f64,
    scale: f64,
    floor: f64,
    rng: &mut PopulationRng,
) -> bool {
    rng.bernoulli(neonatal_mortality_risk(rolling_maternal_prevalence, scale, floor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doomed_counter_fires_after_exactly_d_steps() {
        let mut counter = None;
        arm_doomed_counter(&mut counter, 3);
        assert!(!tick_doomed_counter(&mut counter));
        assert!(!tick_doomed_counter(&mut counter));
        assert!(!tick_doomed_counter(&mut counter));
        assert!(tick_doomed_counter(&mut counter));
        assert!(counter.is_none());
    }

    #[test]
    fn doomed_counter_not_reset_by_second_arm() {
        let mut counter = None;
        arm_doomed_counter(&mut counter, 5);
        arm_doomed_counter(&mut counter, 1);
        assert_eq!(counter, Some(5));
    }

    #[test]
    fn rolling_window_caps_at_five_months() {
        let mut window = MaternalPrevalenceWindow::new(1);
        for _ in 0..200 {
            window.record(1.0);
        }
        assert!(window.samples.len() <= 150);
    }
}
