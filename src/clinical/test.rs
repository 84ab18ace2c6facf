//! Parasite test sensitivity/specificity tables (§4.4 "Parasite test
//! semantics"). These numbers are part of the core contract, not tunable
//! scenario parameters.

use crate::rng::PopulationRng;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParasiteTest {
    Microscopy,
    Rdt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TestResult {
    Positive,
    Negative,
}

/// RDT sensitivity bands from Murray et al. 2008: `(density threshold,
/// sensitivity)`, density thresholds non-decreasing.
const RDT_BANDS: [(f64, f64); 5] = [
    (0.0, 0.539),
    (100.0, 0.892),
    (500.0, 0.926),
    (1000.0, 0.992),
    (5000.0, 0.997),
];

impl ParasiteTest {
    pub fn sensitivity(&self, density: f64) -> f64 {
        match self {
            ParasiteTest::Microscopy => {
                if density <= 100.0 {
                    0.75
                } else {
                    0.90
                }
            }
            ParasiteTest::Rdt => {
                let mut s = RDT_BANDS[0].1;
                for (threshold, sens) in RDT_BANDS {
                    if density >= threshold {
                        s = sens;
                    }
                }
                s
            }
        }
    }

    pub fn specificity(&self) -> f64 {
        match self {
            ParasiteTest::Microscopy => 0.75,
            ParasiteTest::Rdt => 0.942,
        }
    }

    /// Draw a (possibly false) test result for a human with the given
    /// true parasite density (0 = not infected).
    pub fn sample(&self, density: f64, rng: &mut PopulationRng) -> TestResult {
        let p_positive = if density > 0.0 {
            self.sensitivity(density)
        } else {
            1.0 - self.specificity()
        };
        if rng.bernoulli(p_positive) {
            TestResult::Positive
        } else {
            TestResult::Negative
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn microscopy_sensitivity_steps_at_100() {
        assert_eq!(ParasiteTest::Microscopy.sensitivity(50.0), 0.75);
        assert_eq!(ParasiteTest::Microscopy.sensitivity(101.0), 0.90);
    }

    #[test]
    fn rdt_sensitivity_tiers_by_density() {
        assert_eq!(ParasiteTest::Rdt.sensitivity(0.0), 0.539);
        assert_eq!(ParasiteTest::Rdt.sensitivity(100.0), 0.892);
        assert_eq!(ParasiteTest::Rdt.sensitivity(5000.0), 0.997);
        assert_eq!(ParasiteTest::Rdt.sensitivity(20000.0), 0.997);
    }

    #[test]
    fn specificities_match_contract() {
        assert_eq!(ParasiteTest::Microscopy.specificity(), 0.75);
        assert_eq!(ParasiteTest::Rdt.specificity(), 0.942);
    }

    #[test]
    fn uninfected_human_rarely_tests_positive_by_specificity() {
        let mut rng = PopulationRng::seed_from_u64(3);
        let positives = (0..5000)
            .filter(|_| ParasiteTest::Rdt.sample(0.0, &mut rng) == TestResult::Positive)
            .count();
        let rate = positives as f64 / 5000.0;
        assert_abs_diff_eq!(rate, 1.0 - 0.942, epsilon = 0.02);
    }
}
