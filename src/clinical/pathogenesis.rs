//! Pathogenesis: pyrogenic threshold, clinical-episode draw and severity
//! classification (§4.4 "Pathogenesis").

use crate::rng::PopulationRng;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Uncomplicated,
    Severe,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ClinicalEvent {
    Malaria(Severity),
    NonMalariaFever,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathogenesisParams {
    /// Scaling constant in the density -> episode-probability sigmoid.
    pub pyrogenic_scale: f64,
    /// Density threshold beyond which an episode is classified severe.
    pub severe_density_threshold: f64,
    /// Whether the per-human pyrogenic threshold itself evolves with
    /// cumulative exposure ("pyrogen" model variant).
    pub pyrogen_variant: bool,
    pub pyrogen_decay: f64,
    pub non_malaria_fever_rate_per_step: f64,
}

impl Default for PathogenesisParams {
    fn default() -> Self {
        PathogenesisParams {
            pyrogenic_scale: 0.05,
            severe_density_threshold: 2_000_000.0,
            pyrogen_variant: false,
            pyrogen_decay: 0.0102,
            non_malaria_fever_rate_per_step: 0.0,
        }
    }
}

/// Per-human pyrogenic threshold, evolving in the "pyrogen" variant.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct PyrogenicThreshold(pub f64);

impl PyrogenicThreshold {
    pub fn initial() -> Self {
        PyrogenicThreshold(1.0)
    }

    pub fn update(&mut self, params: &PathogenesisParams, time_step_max_density: f64) {
        if !params.pyrogen_variant {
            return;
        }
        self.0 += params.pyrogen_decay * (time_step_max_density.max(1.0).ln() - self.0);
    }
}

/// Probability of a clinical episode given `time_step_max_density` and the
/// human's current pyrogenic threshold; a logistic saturating function.
pub fn episode_probability(
    params: &PathogenesisParams,
    threshold: PyrogenicThreshold,
    time_step_max_density: f64,
) -> f64 {
    if time_step_max_density <= 0.0 {
        return 0.0;
    }
    let x = params.pyrogenic_scale * (time_step_max_density / threshold.0.max(1e-6)).ln().max(0.0);
    (x / (1.0 + x)).clamp(0.0, 1.0)
}

/// Draw whether a malaria episode, a non-malaria fever, or nothing occurs
/// this step.
pub fn sample_event(
    params: &PathogenesisParams,
    threshold: PyrogenicThreshold,
    time_step_max_density: f64,
    rng: &mut PopulationRng,
) -> Option<ClinicalEvent> {
    let p_episode = episode_probability(params, threshold, time_step_max_density);
    if rng.bernoulli(p_episode) {
        let severity = if time_step_max_density >= params.severe_density_threshold {
            Severity::Severe
        } else {
            Severity::Uncomplicated
        };
        return Some(ClinicalEvent::Malaria(severity));
    }
    if params.non_malaria_fever_rate_per_step > 0.0
        && rng.bernoulli(params.non_malaria_fever_rate_per_step)
    {
        return Some(ClinicalEvent::NonMalariaFever);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_density_never_triggers_episode() {
        let params = PathogenesisParams::default();
        assert_eq!(episode_probability(&params, PyrogenicThreshold::initial(), 0.0), 0.0);
    }

    #[test]
    fn high_density_classified_severe() {
        let params = PathogenesisParams::default();
        let mut rng = PopulationRng::seed_from_u64(5);
        let event = sample_event(&params, PyrogenicThreshold::initial(), 1e9, &mut rng);
        if let Some(ClinicalEvent::Malaria(sev)) = event {
            assert_eq!(sev, Severity::Severe);
        }
    }
}
