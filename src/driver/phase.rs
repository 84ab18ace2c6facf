//! Simulation phase state machine (§4.6 "Phase state machine").

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Starting,
    OneLifeSpan,
    VectorFitting,
    MainPhase,
    EndSim,
}

impl Phase {
    /// The phase that follows this one, given whether the scenario is
    /// purely forced-EIR (in which case `VectorFitting` is skipped,
    /// §4.6 "VECTOR_FITTING").
    pub fn next(self, forced_eir_only: bool) -> Phase {
        match self {
            Phase::Starting => Phase::OneLifeSpan,
            Phase::OneLifeSpan => {
                if forced_eir_only {
                    Phase::MainPhase
                } else {
                    Phase::VectorFitting
                }
            }
            Phase::VectorFitting => Phase::MainPhase,
            Phase::MainPhase => Phase::EndSim,
            Phase::EndSim => Phase::EndSim,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_eir_run_skips_vector_fitting() {
        assert_eq!(Phase::OneLifeSpan.next(true), Phase::MainPhase);
    }

    #[test]
    fn vector_run_visits_fitting() {
        assert_eq!(Phase::OneLifeSpan.next(false), Phase::VectorFitting);
    }

    #[test]
    fn end_sim_is_terminal() {
        assert_eq!(Phase::EndSim.next(false), Phase::EndSim);
    }
}
