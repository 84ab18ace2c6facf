//! The process-wide parasite genotype registry (§3 "Genotype registry").

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Index into the genotype registry. Cheap to copy, used as an array index
/// throughout the vector and within-host engines.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenotypeId(pub usize);

/// One (locus, allele) pair carried by a genotype.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusAllele {
    pub locus: String,
    pub allele: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenotypeDef {
    pub name: String,
    pub initial_frequency: f64,
    pub alleles: Vec<LocusAllele>,
}

/// Read-only after construction (§5 shared resource policy); not
/// checkpointed because it is re-derivable from the scenario.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenotypeRegistry {
    genotypes: Vec<GenotypeDef>,
}

impl GenotypeRegistry {
    pub fn build(genotypes: Vec<GenotypeDef>) -> Result<Self, CoreError> {
        if genotypes.is_empty() {
            return Err(CoreError::Scenario {
                location: "scenario/parasiteGenetics/locus".into(),
                message: "at least one genotype must be defined".into(),
            });
        }
        let sum: f64 = genotypes.iter().map(|g| g.initial_frequency).sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(CoreError::Scenario {
                location: "scenario/parasiteGenetics".into(),
                message: format!("initial genotype frequencies must sum to 1, got {sum}"),
            });
        }
        Ok(GenotypeRegistry { genotypes })
    }

    pub fn n(&self) -> usize {
        self.genotypes.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = GenotypeId> {
        (0..self.genotypes.len()).map(GenotypeId)
    }

    pub fn initial_freq(&self, id: GenotypeId) -> f64 {
        self.genotypes[id.0].initial_frequency
    }

    pub fn name(&self, id: GenotypeId) -> &str {
        &self.genotypes[id.0].name
    }

    pub fn get(&self, id: GenotypeId) -> &GenotypeDef {
        &self.genotypes[id.0]
    }

    pub fn find_by_name(&self, name: &str) -> Option<GenotypeId> {
        self.genotypes.iter().position(|g| g.name == name).map(GenotypeId)
    }

    /// Sample a genotype according to the initial-frequency distribution,
    /// used when assigning a genotype to a newly sampled infection that
    /// didn't arrive via a specific mosquito inoculation breakdown.
    pub fn sample(&self, draw: f64) -> GenotypeId {
        let mut cum = 0.0;
        for (i, g) in self.genotypes.iter().enumerate() {
            cum += g.initial_frequency;
            if draw < cum {
                return GenotypeId(i);
            }
        }
        GenotypeId(self.genotypes.len() - 1)
    }
}
