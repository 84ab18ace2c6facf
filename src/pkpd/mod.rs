//! §4.5 PK/PD engine: per-human drug concentration state and the
//! genotype-specific drug factor consumed by the within-host engine.

pub mod drug;
pub mod dose;
pub mod quadrature;

use crate::error::CoreError;
use crate::genotype::GenotypeRegistry;
use dose::{Dose, DrugRecord};
use drug::{CompartmentModel, DrugId, DrugRegistry};
use serde::{Deserialize, Serialize};

/// Per-human PK state: a small open-addressed map keyed by drug id (§3
/// Human). Implemented as a flat `Vec` since scenarios carry at most a
/// handful of distinct drug types in use at once — a linear scan beats a
/// hash map's overhead at this size.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PkState {
    entries: Vec<(DrugId, DrugRecord)>,
}

impl PkState {
    fn index_of(&self, drug: DrugId) -> Option<usize> {
        self.entries.iter().position(|(id, _)| *id == drug)
    }

    fn entry_mut(&mut self, drug: DrugId) -> usize {
        match self.index_of(drug) {
            Some(i) => i,
            None => {
                self.entries.push((drug, DrugRecord::default()));
                self.entries.len() - 1
            }
        }
    }

    /// Add a dose to the drug's pending-dose list, sorted by timing offset.
    pub fn prescribe(&mut self, dose: Dose) {
        let idx = self.entry_mut(dose.drug);
        let doses = &mut self.entries[idx].1.pending_doses;
        let pos = doses
            .iter()
            .position(|d| d.timing_offset > dose.timing_offset)
            .unwrap_or(doses.len());
        doses.insert(pos, dose);
    }

    /// Advance every drug by `step_days`, consuming due doses in order, and
    /// return the per-genotype drug factor (product of all active drugs'
    /// survival factors over the step) indexed by `GenotypeId.0`.
    ///
    /// Doses with `timing_offset >= 1` are retained and decremented by 1
    /// (§4.5 "Dose prescription"), i.e. rolled into the next step.
    pub fn advance_step(
        &mut self,
        registry: &DrugRegistry,
        genotypes: &GenotypeRegistry,
        step_days: f64,
    ) -> Result<Vec<f64>, CoreError> {
        let mut factors = vec![1.0; genotypes.n()];

        for i in 0..self.entries.len() {
            let drug_id = self.entries[i].0;
            let drug = registry.get(drug_id);

            // Split due (offset < step_days) vs carried-over doses.
            let (mut due, carry): (Vec<Dose>, Vec<Dose>) = self.entries[i]
                .1
                .pending_doses
                .drain(..)
                .partition(|d| d.timing_offset < step_days);
            due.sort_by(|a, b| a.timing_offset.partial_cmp(&b.timing_offset).unwrap());

            let metabolite_id = match &drug.model {
                CompartmentModel::Conversion { metabolite_drug, .. } => Some(*metabolite_drug),
                _ => None,
            };

            // Walk due doses in chronological order: advance the elapsed
            // gap with no dose, then apply the dose instantaneously
            // (dt=0), then continue to the next dose or the step end.
            let mut t = 0.0;
            for dose in &due {
                let dt = (dose.timing_offset - t).max(0.0);
                self.advance_one(registry, genotypes, drug_id, metabolite_id, dt, 0.0, &mut factors)?;
                self.advance_one(registry, genotypes, drug_id, metabolite_id, 0.0, dose.mg, &mut factors)?;
                t = dose.timing_offset;
            }
            let remaining = (step_days - t).max(0.0);
            self.advance_one(registry, genotypes, drug_id, metabolite_id, remaining, 0.0, &mut factors)?;

            let mut carry = carry;
            for d in &mut carry {
                d.timing_offset -= step_days;
            }
            self.entries[i].1.pending_doses = carry;
        }

        self.entries.retain(|(id, rec)| !rec.is_negligible(registry.get(*id)));
        Ok(factors)
    }

    /// Advance one drug (and its metabolite, if any) by `dt` days with a
    /// single dose of `dose_mg` applied once at the start of the interval,
    /// multiplying every genotype's running survival factor by the result.
    fn advance_one(
        &mut self,
        registry: &DrugRegistry,
        genotypes: &GenotypeRegistry,
        drug_id: DrugId,
        metabolite_id: Option<DrugId>,
        dt: f64,
        dose_mg: f64,
        factors: &mut [f64],
    ) -> Result<(), CoreError> {
        let drug = registry.get(drug_id);
        let i = self.index_of(drug_id).expect("entry must exist");

        let survivals = match metabolite_id {
            None => {
                let (_, record) = &mut self.entries[i];
                dose::advance(drug, genotypes, record, None, dose_mg, dt)?
            }
            Some(meta_id) => {
                let meta_idx = self.entry_mut(meta_id);
                let i = self.index_of(drug_id).expect("entry must exist");
                let (lo, hi) = if i < meta_idx { (i, meta_idx) } else { (meta_idx, i) };
                let (left, right) = self.entries.split_at_mut(hi);
                let (record_i, record_meta) = if i < meta_idx {
                    (&mut left[lo].1, &mut right[0].1)
                } else {
                    (&mut right[0].1, &mut left[lo].1)
                };
                let meta_drug = registry.get(meta_id);
                dose::advance(drug, genotypes, record_i, Some((meta_drug, record_meta)), dose_mg, dt)?
            }
        };

        for g in genotypes.ids() {
            factors[g.0] *= survivals[g.0];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::GenotypeDef;
    use approx::assert_abs_diff_eq;
    use drug::{CompartmentModel, DrugType};

    #[test]
    fn single_dose_applied_once_regardless_of_genotype_count() {
        let mut registry = DrugRegistry::default();
        let id = registry.push(DrugType::new(
            DrugId(0),
            "TD",
            2.0,
            1e-6,
            CompartmentModel::OneCompartment { elimination_rate: 0.0 },
        ));
        let genotypes = GenotypeRegistry::build(vec![
            GenotypeDef { name: "a".into(), initial_frequency: 0.5, alleles: vec![] },
            GenotypeDef { name: "b".into(), initial_frequency: 0.5, alleles: vec![] },
            GenotypeDef { name: "c".into(), initial_frequency: 0.0, alleles: vec![] },
        ])
        .unwrap();

        let mut pk = PkState::default();
        pk.prescribe(Dose { drug: id, timing_offset: 0.0, mg: 100.0 });
        let _ = pk.advance_step(&registry, &genotypes, 1.0).unwrap();

        let rec = &pk.entries[pk.index_of(id).unwrap()].1;
        // 100mg / Vd=2 => 50, regardless of there being 3 genotypes.
        assert_abs_diff_eq!(rec.concentration, 50.0, epsilon = 1e-9);
    }
}
