//! Scenario data model and its JSON boundary loader.
//!
//! Real scenario input is XML validated against a fixed schema version
//! (§6 "Scenario input"); XML parsing is explicitly out of scope for this
//! core. These `serde::Deserialize` structs and `load_from_json` stand in
//! for the XML adapter's output: a production build wires an XML-to-JSON
//! (or XML-to-struct) translation ahead of this boundary.

use crate::clinical::PathogenesisParams;
use crate::driver::intervention::InterventionDeployment;
use crate::error::CoreError;
use crate::genotype::GenotypeDef;
use crate::pkpd::drug::CompartmentModel;
use crate::population::ImportedInfectionsParams;
use crate::within_host::ImmunityParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const CORE_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DemographyParams {
    pub age_group_bounds_years: Vec<f64>,
    pub age_group_proportions: Vec<f64>,
    pub max_age_years: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EntomologyMode {
    ForcedEir { daily_eir: Vec<f64> },
    Vector { species: Vec<SpeciesScenario> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeciesScenario {
    pub name: String,
    pub theta_d: f64,
    pub tau: usize,
    pub theta_s: usize,
    pub p_b: f64,
    pub p_c: f64,
    pub p_d: f64,
    pub p_e: f64,
    pub mu_va: f64,
    pub human_blood_index: f64,
    pub s_v_min: f64,
    pub annual_eir_target: f64,
    pub fourier_a0: f64,
    pub fourier_a: Vec<f64>,
    pub fourier_b: Vec<f64>,
    pub eir_rotate_angle: f64,
}

/// Per-phenotype Hill-function PD parameters for one drug (§4.5, §6 "drug
/// descriptions with PK and per-phenotype PD parameters").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhenotypePdScenario {
    pub phenotype: usize,
    pub max_killing_rate: f64,
    pub ic50: f64,
    pub slope: f64,
}

/// One drug type as carried on the scenario boundary: PK compartment
/// model plus per-phenotype PD and the phenotype restriction that maps
/// each genotype (by name, resolved against `Scenario::genotypes`) to the
/// phenotype governing its response (§4.5 "phenotype->genotype
/// restrictions").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrugScenario {
    pub abbrev: String,
    pub volume_of_distribution: f64,
    pub negligible_concentration: f64,
    pub model: CompartmentModel,
    #[serde(default)]
    pub phenotype_pd: Vec<PhenotypePdScenario>,
    /// genotype name -> phenotype id
    #[serde(default)]
    pub genotype_phenotype: Vec<(String, usize)>,
}

/// Decision-tree node shapes on the scenario boundary (§3 "Decision
/// tree"). `Random`'s dependency list and cumulative-probability table
/// reference sibling decisions by name and outcomes by plain `u32`
/// indices rather than the packed-bitfield encoding, which is assigned
/// once the full tree is built (`DecisionTree::build`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DecisionKindScenario {
    Age { bounds: Vec<(f64, u32)> },
    Random { depends_on: Vec<String>, table: Vec<(Vec<u32>, Vec<f64>)> },
    CaseSeverity,
    ParasiteTest(crate::clinical::test::ParasiteTest),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionScenario {
    pub name: String,
    pub n_values: u32,
    pub kind: DecisionKindScenario,
}

/// Maps a decision outcome to a drug (by index into `Scenario::drugs`)
/// and a single dose in mg (§4.6 `TreatmentTable`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreatmentScenario {
    pub decision_name: String,
    pub dose_by_outcome: Vec<(u32, usize, f64)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitoringParams {
    pub survey_times_days: Vec<i64>,
    pub age_group_bounds_years: Vec<f64>,
    pub continuous_output_period_days: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub schema_version: u32,
    pub step_days: i64,
    pub population_size: u32,
    pub end_time_days: i64,
    pub demography: DemographyParams,
    pub entomology: EntomologyMode,
    pub genotypes: Vec<GenotypeDef>,
    pub immunity: ImmunityParams,
    pub pathogenesis: PathogenesisParams,
    #[serde(default)]
    pub imported_infections: Option<ImportedInfectionsParams>,
    pub monitoring: MonitoringParams,
    pub duration_mean_days: f64,
    pub duration_sigma: f64,
    /// Timed vector-parameter and sub-population deployments (§4.1, §4.6
    /// step 3). Declaration order is the activation tie-break order for
    /// deployments sharing a day.
    #[serde(default)]
    pub interventions: Vec<InterventionDeployment>,
    /// Drug descriptions (§4.5, §6). Empty for a pure natural-history,
    /// no-prescribing scenario.
    #[serde(default)]
    pub drugs: Vec<DrugScenario>,
    /// The clinical decision tree (§4.4, §6), in dependency-topological
    /// order (a decision may only name earlier decisions in
    /// `depends_on`). Absent for a scenario with no case management.
    #[serde(default)]
    pub decisions: Vec<DecisionScenario>,
    /// Decision-outcome -> drug/dose mapping (§4.6 `TreatmentTable`).
    /// Requires `decisions` to be non-empty.
    #[serde(default)]
    pub treatment: Option<TreatmentScenario>,
    /// Baseline mean log-parasite density by `(age-in-5-days,
    /// duration-in-5-days)` bin (§4.3 step 3). Falls back to a flat
    /// baseline of `1.0` when absent, matching a scenario with no
    /// empirical density table.
    #[serde(default)]
    pub density_table: Option<Vec<Vec<f64>>>,
}

impl Scenario {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.schema_version > CORE_SCHEMA_VERSION {
            return Err(CoreError::Scenario {
                location: "scenario/@schemaVersion".into(),
                message: format!(
                    "schema version {} is newer than this core supports ({})",
                    self.schema_version, CORE_SCHEMA_VERSION
                ),
            });
        }
        if self.schema_version < CORE_SCHEMA_VERSION {
            tracing::warn!(
                found = self.schema_version,
                supported = CORE_SCHEMA_VERSION,
                "scenario schema version older than core; proceeding"
            );
        }
        if self.population_size == 0 {
            return Err(CoreError::Scenario {
                location: "scenario/demography/@populationSize".into(),
                message: "population size must be positive".into(),
            });
        }
        let sum: f64 = self.demography.age_group_proportions.iter().sum();
        if (sum - 1.0).abs() > 1e-3 {
            return Err(CoreError::Scenario {
                location: "scenario/demography/ageGroup".into(),
                message: format!("age group proportions must sum to 1, got {sum}"),
            });
        }
        if self.treatment.is_some() && self.decisions.is_empty() {
            return Err(CoreError::Scenario {
                location: "scenario/treatment".into(),
                message: "treatment table given but no decision tree is defined".into(),
            });
        }
        Ok(())
    }

    /// Build the drug registry from `self.drugs` (§4.5, §6). Each drug's
    /// `genotype_phenotype` restriction is resolved against
    /// `self.genotypes` by name.
    pub fn build_drug_registry(&self) -> Result<crate::pkpd::drug::DrugRegistry, CoreError> {
        use crate::pkpd::drug::{DrugRegistry, DrugType, PdParams, PhenotypeId};

        let mut registry = DrugRegistry::default();
        let genotype_names: Vec<&str> = self.genotypes.iter().map(|g| g.name.as_str()).collect();
        for drug_scn in &self.drugs {
            let mut drug = DrugType::new(
                crate::pkpd::drug::DrugId(0), // overwritten by `DrugRegistry::push`
                drug_scn.abbrev.clone(),
                drug_scn.volume_of_distribution,
                drug_scn.negligible_concentration,
                drug_scn.model.clone(),
            );
            for pd in &drug_scn.phenotype_pd {
                drug.set_phenotype_pd(
                    PhenotypeId(pd.phenotype),
                    PdParams { max_killing_rate: pd.max_killing_rate, ic50: pd.ic50, slope: pd.slope },
                );
            }
            for (genotype_name, phenotype) in &drug_scn.genotype_phenotype {
                let index = genotype_names.iter().position(|n| n == genotype_name).ok_or_else(|| {
                    CoreError::Scenario {
                        location: format!("scenario/drugs/{}/genotypeRestriction", drug_scn.abbrev),
                        message: format!("unknown genotype name '{genotype_name}'"),
                    }
                })?;
                drug.restrict_genotype(crate::genotype::GenotypeId(index), PhenotypeId(*phenotype));
            }
            registry.push(drug);
        }
        Ok(registry)
    }

    /// Build the clinical decision tree from `self.decisions` (§3, §4.4).
    /// `None` when the scenario defines no decisions (a pure
    /// natural-history run with no case management).
    pub fn build_decision_tree(&self) -> Result<Option<crate::clinical::DecisionTree>, CoreError> {
        use crate::clinical::decision::{Decision, DecisionId, DecisionKind, DecisionTree, InputKind};

        if self.decisions.is_empty() {
            return Ok(None);
        }
        let name_to_id: HashMap<&str, DecisionId> = self
            .decisions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), DecisionId(i)))
            .collect();
        let mut decisions = Vec::with_capacity(self.decisions.len());
        for (i, d) in self.decisions.iter().enumerate() {
            let kind = match &d.kind {
                DecisionKindScenario::Age { bounds } => DecisionKind::Age { bounds: bounds.clone() },
                DecisionKindScenario::CaseSeverity => DecisionKind::Input(InputKind::CaseSeverity),
                DecisionKindScenario::ParasiteTest(test) => DecisionKind::Input(InputKind::ParasiteTest(*test)),
                DecisionKindScenario::Random { depends_on, table } => {
                    let depends_on = depends_on
                        .iter()
                        .map(|name| {
                            let dep = name_to_id.get(name.as_str()).copied().ok_or_else(|| CoreError::Scenario {
                                location: format!("scenario/decisions/{}/dependsOn", d.name),
                                message: format!("unknown dependency decision '{name}'"),
                            })?;
                            if dep.0 >= i {
                                return Err(CoreError::Scenario {
                                    location: format!("scenario/decisions/{}/dependsOn", d.name),
                                    message: format!(
                                        "dependency '{name}' is not declared before '{}' (decisions must be \
                                         in dependency-topological order)",
                                        d.name
                                    ),
                                });
                            }
                            Ok(dep)
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    let table = table.iter().cloned().collect();
                    DecisionKind::Random { depends_on, table }
                }
            };
            decisions.push(Decision {
                id: DecisionId(i),
                name: d.name.clone(),
                n_values: d.n_values,
                bit_offset: 0,
                bit_width: 0,
                kind,
            });
        }
        let built = DecisionTree::build(decisions)?;
        tracing::debug!(decisions = self.decisions.len(), "decision tree constructed");
        Ok(Some(built))
    }

    /// Build the decision-outcome -> drug/dose table (§4.6 `TreatmentTable`),
    /// resolving `decision_name` against the decision tree's bit layout.
    pub fn build_treatment_table(
        &self,
        tree: Option<&crate::clinical::DecisionTree>,
        drugs: &crate::pkpd::drug::DrugRegistry,
    ) -> Result<Option<crate::driver::TreatmentTable>, CoreError> {
        use crate::driver::TreatmentTable;
        use crate::pkpd::drug::DrugId;

        let Some(treatment) = &self.treatment else { return Ok(None) };
        let tree = tree.ok_or_else(|| CoreError::Scenario {
            location: "scenario/treatment".into(),
            message: "treatment table given but no decision tree was built".into(),
        })?;
        let decision_id = tree.find_by_name(&treatment.decision_name).ok_or_else(|| CoreError::Scenario {
            location: "scenario/treatment/@decisionName".into(),
            message: format!("unknown decision '{}'", treatment.decision_name),
        })?;
        let decision = tree.decision(decision_id);
        let mut dose_by_outcome = HashMap::new();
        for (outcome, drug_index, mg) in &treatment.dose_by_outcome {
            if *drug_index >= drugs.len() {
                return Err(CoreError::Scenario {
                    location: "scenario/treatment/doseByOutcome".into(),
                    message: format!("drug index {drug_index} out of range"),
                });
            }
            dose_by_outcome.insert(*outcome, (DrugId(*drug_index), *mg));
        }
        Ok(Some(TreatmentTable {
            decision_bit_offset: decision.bit_offset,
            decision_bit_width: decision.bit_width,
            dose_by_outcome,
        }))
    }

    /// Build the baseline density-by-age/duration table (§4.3 step 3),
    /// falling back to a flat `1.0` baseline when the scenario supplies
    /// none.
    pub fn build_density_table(&self) -> crate::within_host::DensityTable {
        match &self.density_table {
            Some(rows) if !rows.is_empty() => crate::within_host::DensityTable::new(rows.clone()),
            _ => crate::within_host::DensityTable::new(vec![vec![1.0]]),
        }
    }
}

/// Load a scenario from the JSON boundary representation and validate it.
pub fn load_from_json(path: &Path) -> Result<Scenario, CoreError> {
    let text = std::fs::read_to_string(path)?;
    let scenario: Scenario = serde_json::from_str(&text).map_err(|e| CoreError::Scenario {
        location: path.display().to_string(),
        message: e.to_string(),
    })?;
    scenario.validate()?;
    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_scenario() -> Scenario {
        Scenario {
            schema_version: CORE_SCHEMA_VERSION,
            step_days: 1,
            population_size: 100,
            end_time_days: 365,
            demography: DemographyParams {
                age_group_bounds_years: vec![5.0, 100.0],
                age_group_proportions: vec![0.2, 0.8],
                max_age_years: 100.0,
            },
            entomology: EntomologyMode::ForcedEir { daily_eir: vec![1.0; 365] },
            genotypes: vec![GenotypeDef {
                name: "wild".into(),
                initial_frequency: 1.0,
                alleles: vec![],
            }],
            immunity: ImmunityParams::default(),
            pathogenesis: PathogenesisParams::default(),
            imported_infections: None,
            monitoring: MonitoringParams {
                survey_times_days: vec![365],
                age_group_bounds_years: vec![5.0, 100.0],
                continuous_output_period_days: None,
            },
            duration_mean_days: 100.0,
            duration_sigma: 0.5,
            interventions: Vec::new(),
            drugs: Vec::new(),
            decisions: Vec::new(),
            treatment: None,
            density_table: None,
        }
    }

    #[test]
    fn rejects_newer_schema_version() {
        let mut s = minimal_scenario();
        s.schema_version = CORE_SCHEMA_VERSION + 1;
        assert!(s.validate().is_err());
    }

    #[test]
    fn accepts_older_schema_version_with_warning() {
        let mut s = minimal_scenario();
        s.schema_version = 0;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_age_group_proportions_not_summing_to_one() {
        let mut s = minimal_scenario();
        s.demography.age_group_proportions = vec![0.1, 0.1];
        assert!(s.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let s = minimal_scenario();
        let json = serde_json::to_string(&s).unwrap();
        let reloaded: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.population_size, s.population_size);
    }

    #[test]
    fn omitted_optional_sections_deserialize_from_json() {
        // A hand-written scenario document that never mentions drugs,
        // decisions, treatment or density_table must still deserialize
        // (§serde(default) on each) rather than erroring "missing field".
        let json = serde_json::to_string(&minimal_scenario()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("drugs");
        obj.remove("decisions");
        obj.remove("treatment");
        obj.remove("density_table");
        obj.remove("imported_infections");
        let reloaded: Scenario = serde_json::from_value(value).unwrap();
        assert!(reloaded.drugs.is_empty());
        assert!(reloaded.decisions.is_empty());
        assert!(reloaded.treatment.is_none());
        assert!(reloaded.density_table.is_none());
        assert!(reloaded.imported_infections.is_none());
    }

    #[test]
    fn builds_empty_drug_registry_and_no_tree_by_default() {
        let s = minimal_scenario();
        assert!(s.build_drug_registry().unwrap().is_empty());
        assert!(s.build_decision_tree().unwrap().is_none());
        assert_eq!(s.build_density_table().mean_log_density(9, 9), 1.0);
    }

    #[test]
    fn rejects_treatment_table_without_a_decision_tree() {
        let mut s = minimal_scenario();
        s.treatment = Some(TreatmentScenario { decision_name: "drug".into(), dose_by_outcome: vec![] });
        assert!(s.validate().is_err());
    }

    #[test]
    fn builds_drug_registry_with_genotype_restriction() {
        use crate::pkpd::drug::CompartmentModel;

        let mut s = minimal_scenario();
        s.genotypes = vec![
            crate::genotype::GenotypeDef { name: "wild".into(), initial_frequency: 0.5, alleles: vec![] },
            crate::genotype::GenotypeDef { name: "resistant".into(), initial_frequency: 0.5, alleles: vec![] },
        ];
        s.drugs = vec![DrugScenario {
            abbrev: "AL".into(),
            volume_of_distribution: 1.0,
            negligible_concentration: 1e-3,
            model: CompartmentModel::OneCompartment { elimination_rate: 0.0693 },
            phenotype_pd: vec![PhenotypePdScenario { phenotype: 0, max_killing_rate: 4.0, ic50: 0.1, slope: 2.0 }],
            genotype_phenotype: vec![("wild".into(), 0)],
        }];
        let registry = s.build_drug_registry().unwrap();
        assert_eq!(registry.len(), 1);
        let drug = registry.get(crate::pkpd::drug::DrugId(0));
        assert!(drug.pd_for_genotype(crate::genotype::GenotypeId(0)).is_some());
        assert!(drug.pd_for_genotype(crate::genotype::GenotypeId(1)).is_none());
    }

    #[test]
    fn rejects_drug_genotype_restriction_naming_unknown_genotype() {
        use crate::pkpd::drug::CompartmentModel;

        let mut s = minimal_scenario();
        s.drugs = vec![DrugScenario {
            abbrev: "AL".into(),
            volume_of_distribution: 1.0,
            negligible_concentration: 1e-3,
            model: CompartmentModel::OneCompartment { elimination_rate: 0.0693 },
            phenotype_pd: vec![],
            genotype_phenotype: vec![("nonexistent".into(), 0)],
        }];
        assert!(s.build_drug_registry().is_err());
    }

    /// Builds the §8 scenario-3 decision tree (age/result/drug) straight
    /// from scenario DTOs and a treatment table, end to end.
    #[test]
    fn builds_decision_tree_and_treatment_table_from_scenario() {
        use crate::pkpd::drug::CompartmentModel;

        let mut s = minimal_scenario();
        s.drugs = vec![DrugScenario {
            abbrev: "AL".into(),
            volume_of_distribution: 1.0,
            negligible_concentration: 1e-3,
            model: CompartmentModel::OneCompartment { elimination_rate: 0.0693 },
            phenotype_pd: vec![],
            genotype_phenotype: vec![],
        }];
        s.decisions = vec![
            DecisionScenario {
                name: "age".into(),
                n_values: 2,
                kind: DecisionKindScenario::Age { bounds: vec![(5.0, 0), (f64::INFINITY, 1)] },
            },
            DecisionScenario {
                name: "result".into(),
                n_values: 2,
                kind: DecisionKindScenario::ParasiteTest(crate::clinical::test::ParasiteTest::Microscopy),
            },
            DecisionScenario {
                name: "drug".into(),
                n_values: 2,
                kind: DecisionKindScenario::Random {
                    depends_on: vec!["age".into(), "result".into()],
                    table: vec![
                        (vec![0, 1], vec![0.7, 1.0]),
                        (vec![0, 0], vec![0.0, 1.0]),
                        (vec![1, 0], vec![0.0, 1.0]),
                        (vec![1, 1], vec![0.0, 1.0]),
                    ],
                },
            },
        ];
        s.treatment =
            Some(TreatmentScenario { decision_name: "drug".into(), dose_by_outcome: vec![(0, 0, 20.0)] });

        let tree = s.build_decision_tree().unwrap().unwrap();
        assert!(tree.find_by_name("drug").is_some());
        let drugs = s.build_drug_registry().unwrap();
        let treatment = s.build_treatment_table(Some(&tree), &drugs).unwrap().unwrap();
        assert_eq!(treatment.dose_by_outcome.len(), 1);
        let (drug_id, mg) = treatment.dose_by_outcome.get(&0).unwrap();
        assert_eq!(*drug_id, crate::pkpd::drug::DrugId(0));
        assert_eq!(*mg, 20.0);
    }

    #[test]
    fn rejects_decision_tree_with_unknown_dependency_name() {
        let mut s = minimal_scenario();
        s.decisions = vec![DecisionScenario {
            name: "drug".into(),
            n_values: 2,
            kind: DecisionKindScenario::Random { depends_on: vec!["nonexistent".into()], table: vec![] },
        }];
        assert!(s.build_decision_tree().is_err());
    }
}
