//! Drug type registry: PK compartment parameters and per-phenotype PD
//! (Hill-function kill rate) parameters (§4.5).

use crate::genotype::GenotypeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrugId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhenotypeId(pub usize);

/// Hill-function pharmacodynamic parameters for one (drug, phenotype) pair:
/// kill rate `V * C^n / (C^n + K^n)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PdParams {
    pub max_killing_rate: f64, // V
    pub ic50: f64,             // K
    pub slope: f64,            // n
}

impl PdParams {
    pub fn kill_rate(&self, concentration: f64) -> f64 {
        if concentration <= 0.0 {
            return 0.0;
        }
        let cn = concentration.powf(self.slope);
        let kn = self.ic50.powf(self.slope);
        self.max_killing_rate * cn / (cn + kn)
    }
}

/// Selected PK compartment model (§4.5). A tagged union, not dynamic
/// dispatch, per the redesign flag on dynamic dispatch over drug types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CompartmentModel {
    OneCompartment {
        elimination_rate: f64, // k = ln2/halfLife, possibly scaled by body mass upstream
    },
    MultiCompartment {
        /// Coefficients of `A exp(-a t) + B exp(-b t) + C exp(-g t)`; the
        /// third term is zero for a pure two-compartment model.
        a: f64,
        alpha: f64,
        b: f64,
        beta: f64,
        c: f64,
        gamma: f64,
    },
    Conversion {
        /// Parent absorption (gut -> blood), elimination and conversion.
        absorption_rate: f64,
        elimination_rate: f64,
        conversion_rate: f64,
        /// Metabolite elimination rate.
        metabolite_elimination_rate: f64,
        metabolite_drug: DrugId,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrugType {
    pub id: DrugId,
    pub abbrev: String,
    pub volume_of_distribution: f64,
    pub negligible_concentration: f64,
    pub model: CompartmentModel,
    pd_by_phenotype: HashMap<PhenotypeId, PdParams>,
    /// Many-to-one: multiple genotypes share a phenotype's drug response.
    genotype_to_phenotype: HashMap<GenotypeId, PhenotypeId>,
}

impl DrugType {
    pub fn new(
        id: DrugId,
        abbrev: impl Into<String>,
        volume_of_distribution: f64,
        negligible_concentration: f64,
        model: CompartmentModel,
    ) -> Self {
        DrugType {
            id,
            abbrev: abbrev.into(),
            volume_of_distribution,
            negligible_concentration,
            model,
            pd_by_phenotype: HashMap::new(),
            genotype_to_phenotype: HashMap::new(),
        }
    }

    pub fn set_phenotype_pd(&mut self, phenotype: PhenotypeId, params: PdParams) {
        self.pd_by_phenotype.insert(phenotype, params);
    }

    pub fn restrict_genotype(&mut self, genotype: GenotypeId, phenotype: PhenotypeId) {
        self.genotype_to_phenotype.insert(genotype, phenotype);
    }

    pub fn pd_for_genotype(&self, genotype: GenotypeId) -> Option<&PdParams> {
        let phenotype = self.genotype_to_phenotype.get(&genotype)?;
        self.pd_by_phenotype.get(phenotype)
    }
}

/// Read-only after scenario load (§5); indexed by `DrugId`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DrugRegistry {
    drugs: Vec<DrugType>,
}

impl DrugRegistry {
    pub fn push(&mut self, drug: DrugType) -> DrugId {
        let id = DrugId(self.drugs.len());
        let mut drug = drug;
        drug.id = id;
        self.drugs.push(drug);
        id
    }

    pub fn get(&self, id: DrugId) -> &DrugType {
        &self.drugs[id.0]
    }

    pub fn len(&self) -> usize {
        self.drugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty()
    }

    pub fn find_by_abbrev(&self, abbrev: &str) -> Option<DrugId> {
        self.drugs.iter().position(|d| d.abbrev == abbrev).map(DrugId)
    }
}
