//! Mosquito emergence model variants, selected once at scenario load
//! (§4.1 "Emergence model variants").

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EmergenceModel {
    /// `new_emergence(d) = N_v0[d mod 365] * prod(1 - emergenceReduction)`.
    Forced { n_v0: [f64; 365] },
    /// Simple mosquito population dynamics: emergence is driven by larval
    /// development of `devDur` days from past oviposition.
    Mpd { n_v0_warmup: [f64; 365], dev_dur: usize, f_eggs: f64, larval_survival: f64 },
}

/// Rolling record of `ovipositing(d) = P_dff[d] * N_v[d]`, needed by the
/// MPD variant to look `dev_dur` days into the past.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OvipositHistory {
    history: VecDeque<f64>,
    capacity: usize,
}

impl OvipositHistory {
    pub fn new(capacity: usize) -> Self {
        OvipositHistory { history: VecDeque::with_capacity(capacity), capacity: capacity.max(1) }
    }

    pub fn push(&mut self, ovipositing: f64) {
        self.history.push_back(ovipositing);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Value `lag` days before the most recent push, or `None` if not
    /// enough history has accumulated yet (still warming up).
    pub fn lagged(&self, lag: usize) -> Option<f64> {
        if lag >= self.history.len() {
            return None;
        }
        let idx = self.history.len() - 1 - lag;
        self.history.get(idx).copied()
    }
}

impl EmergenceModel {
    /// Compute `new_emergence(d)`, `d` a zero-based simulation day.
    /// `emergence_reduction` is the product of `(1 - reduction)` across
    /// active interventions.
    pub fn new_emergence(
        &self,
        day_of_year: usize,
        oviposit_history: &OvipositHistory,
        emergence_reduction: f64,
    ) -> f64 {
        match self {
            EmergenceModel::Forced { n_v0 } => n_v0[day_of_year % 365] * emergence_reduction,
            EmergenceModel::Mpd { n_v0_warmup, dev_dur, f_eggs, larval_survival } => {
                match oviposit_history.lagged(*dev_dur) {
                    Some(ovipositing) => {
                        larval_survival.powi(*dev_dur as i32) * ovipositing * f_eggs
                    }
                    // During warm-up (not enough history yet), fall back
                    // to the forced formula, per §4.1.
                    None => n_v0_warmup[day_of_year % 365] * emergence_reduction,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpd_falls_back_to_forced_during_warmup() {
        let mut warmup = [0.0; 365];
        warmup[0] = 42.0;
        let model = EmergenceModel::Mpd {
            n_v0_warmup: warmup,
            dev_dur: 10,
            f_eggs: 1.0,
            larval_survival: 0.9,
        };
        let history = OvipositHistory::new(20);
        assert_eq!(model.new_emergence(0, &history, 1.0), 42.0);
    }

    #[test]
    fn mpd_uses_lagged_oviposition_once_warmed_up() {
        let model = EmergenceModel::Mpd {
            n_v0_warmup: [0.0; 365],
            dev_dur: 2,
            f_eggs: 2.0,
            larval_survival: 1.0,
        };
        let mut history = OvipositHistory::new(10);
        history.push(1.0);
        history.push(2.0);
        history.push(3.0); // lag 2 from here -> 1.0
        let value = model.new_emergence(5, &history, 1.0);
        assert_eq!(value, 2.0); // 1.0^2 * 1.0 * 2.0
    }

    #[test]
    fn oviposit_history_caps_at_capacity() {
        let mut history = OvipositHistory::new(3);
        for i in 0..10 {
            history.push(i as f64);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.lagged(0), Some(9.0));
    }
}
