//! Per-human clinical state (§3 "Clinical state").

use super::pathogenesis::{ClinicalEvent, PyrogenicThreshold};
use crate::time::SimTime;
use serde::{Deserialize, Serialize};

pub const NEVER: SimTime = SimTime::MIN;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClinicalState {
    pub last_treatment: SimTime,
    /// Pending until displaced by a new event, at which point it is
    /// emitted to the survey stream.
    pub pending_event: Option<ClinicalEvent>,
    pub treatment_seeking_factor: f64,
    pub doomed_counter: Option<u32>,
    pub pyrogenic_threshold: PyrogenicThreshold,
}

impl ClinicalState {
    pub fn new(treatment_seeking_factor: f64) -> Self {
        ClinicalState {
            last_treatment: NEVER,
            pending_event: None,
            treatment_seeking_factor,
            doomed_counter: None,
            pyrogenic_threshold: PyrogenicThreshold::initial(),
        }
    }

    /// Replace the pending event, returning the previous one (to be
    /// flushed to the survey stream by the caller).
    pub fn displace_event(&mut self, event: ClinicalEvent) -> Option<ClinicalEvent> {
        self.pending_event.replace(event)
    }

    pub fn take_pending_event(&mut self) -> Option<ClinicalEvent> {
        self.pending_event.take()
    }
}
