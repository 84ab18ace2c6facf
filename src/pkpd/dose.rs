//! Dose prescriptions and the per-human, per-drug concentration record
//! (§4.5 "Dose prescription").

use super::drug::{CompartmentModel, DrugType, PdParams};
use super::quadrature;
use crate::error::CoreError;
use crate::genotype::{GenotypeId, GenotypeRegistry};
use serde::{Deserialize, Serialize};

/// `(drug_id, timing_offset_in_day, mg)`. `timing_offset` is in days
/// (fractional), relative to the start of the current time step; doses
/// with offset >= 1 roll over to future steps (see `PkState::advance_step`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Dose {
    pub drug: super::drug::DrugId,
    pub timing_offset: f64,
    pub mg: f64,
}

/// Blood (and, for conversion drugs, metabolite) concentration plus the
/// still-pending doses for one drug in one human. This is the value type
/// stored in the human's small open-addressed drug map (§3 Human).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DrugRecord {
    pub concentration: f64,
    /// Only used by `CompartmentModel::MultiCompartment` (peripheral
    /// compartments) and `CompartmentModel::Conversion` (metabolite).
    pub concentration2: f64,
    pub concentration3: f64,
    pub pending_doses: Vec<Dose>,
}

impl DrugRecord {
    pub fn is_negligible(&self, drug: &DrugType) -> bool {
        self.concentration < drug.negligible_concentration
            && self.concentration2 < drug.negligible_concentration
            && self.concentration3 < drug.negligible_concentration
            && self.pending_doses.is_empty()
    }
}

fn decay_one_compartment(c0: f64, k: f64, dt: f64) -> f64 {
    c0 * (-k * dt).exp()
}

/// Per-genotype survival factors, indexed like `GenotypeRegistry::ids`.
fn survival_over(
    genotypes: &GenotypeRegistry,
    dt: f64,
    pd_lookup: impl Fn(GenotypeId) -> Option<&PdParams>,
    conc_at: impl Fn(f64) -> f64,
) -> Result<Vec<f64>, CoreError> {
    let mut out = Vec::with_capacity(genotypes.n());
    for g in genotypes.ids() {
        let factor = match pd_lookup(g) {
            None => 1.0,
            Some(pd) => {
                let integral =
                    quadrature::integrate(|t| pd.kill_rate(conc_at(t)), 0.0, dt, None, None)?;
                (-integral).exp()
            }
        };
        out.push(factor);
    }
    Ok(out)
}

/// Advance a one-compartment concentration over `[0, dt]`, applying a dose
/// of `mg` once at `t=0` (absorption assumed instantaneous per §4.5), and
/// return the per-genotype survival factor over the interval.
fn step_one_compartment(
    drug: &DrugType,
    elimination_rate: f64,
    genotypes: &GenotypeRegistry,
    record: &mut DrugRecord,
    dose_mg: f64,
    dt: f64,
) -> Result<Vec<f64>, CoreError> {
    record.concentration += dose_mg / drug.volume_of_distribution;
    let c0 = record.concentration;
    let factors = survival_over(
        genotypes,
        dt,
        |g| drug.pd_for_genotype(g),
        |t| decay_one_compartment(c0, elimination_rate, t),
    )?;
    record.concentration = decay_one_compartment(c0, elimination_rate, dt);
    Ok(factors)
}

#[allow(clippy::too_many_arguments)]
fn step_multi_compartment(
    drug: &DrugType,
    a: f64,
    alpha: f64,
    b: f64,
    beta: f64,
    c: f64,
    gamma: f64,
    genotypes: &GenotypeRegistry,
    record: &mut DrugRecord,
    dose_mg: f64,
    dt: f64,
) -> Result<Vec<f64>, CoreError> {
    // The closed-form triexponential is carried as three independent
    // amplitudes; a dose adds `mg / Vd` split across the steady-state
    // proportions implied by the coefficients.
    let total = a + b + c;
    let scale = if total.abs() > 1e-12 { 1.0 / total } else { 1.0 };
    let add = dose_mg / drug.volume_of_distribution;
    record.concentration += add * a * scale;
    record.concentration2 += add * b * scale;
    record.concentration3 += add * c * scale;

    let c1_0 = record.concentration;
    let c2_0 = record.concentration2;
    let c3_0 = record.concentration3;
    let conc_at = |t: f64| -> f64 {
        c1_0 * (-alpha * t).exp() + c2_0 * (-beta * t).exp() + c3_0 * (-gamma * t).exp()
    };
    let factors = survival_over(genotypes, dt, |g| drug.pd_for_genotype(g), conc_at)?;
    record.concentration = c1_0 * (-alpha * dt).exp();
    record.concentration2 = c2_0 * (-beta * dt).exp();
    record.concentration3 = c3_0 * (-gamma * dt).exp();
    Ok(factors)
}

#[allow(clippy::too_many_arguments)]
fn step_conversion(
    drug: &DrugType,
    metabolite: &DrugType,
    absorption_rate: f64,
    elimination_rate: f64,
    conversion_rate: f64,
    metabolite_elimination_rate: f64,
    genotypes: &GenotypeRegistry,
    record: &mut DrugRecord,
    metabolite_record: &mut DrugRecord,
    dose_mg: f64,
    dt: f64,
) -> Result<Vec<f64>, CoreError> {
    // concentration  = gut compartment; concentration2 = parent in blood.
    record.concentration += dose_mg / drug.volume_of_distribution;
    let gut0 = record.concentration;
    let parent0 = record.concentration2;
    let meta0 = metabolite_record.concentration;

    let parent_at = |t: f64| -> f64 {
        if (absorption_rate - elimination_rate).abs() < 1e-9 {
            (parent0 + gut0 * absorption_rate * t) * (-elimination_rate * t).exp()
        } else {
            let gut_term = gut0 * absorption_rate / (absorption_rate - elimination_rate)
                * ((-elimination_rate * t).exp() - (-absorption_rate * t).exp());
            parent0 * (-elimination_rate * t).exp() + gut_term
        }
    };
    let meta_at = |t: f64| -> f64 {
        if (elimination_rate - metabolite_elimination_rate).abs() < 1e-9 {
            (meta0 + parent0 * conversion_rate * t) * (-metabolite_elimination_rate * t).exp()
        } else {
            let parent_term = parent0 * conversion_rate
                / (elimination_rate - metabolite_elimination_rate)
                * ((-metabolite_elimination_rate * t).exp() - (-elimination_rate * t).exp());
            meta0 * (-metabolite_elimination_rate * t).exp() + parent_term
        }
    };

    let mut factors = Vec::with_capacity(genotypes.n());
    for g in genotypes.ids() {
        let pd_parent = drug.pd_for_genotype(g);
        let pd_meta = metabolite.pd_for_genotype(g);
        let factor = if pd_parent.is_none() && pd_meta.is_none() {
            1.0
        } else {
            let integrand = |t: f64| -> f64 {
                let kp = pd_parent.map(|p| p.kill_rate(parent_at(t))).unwrap_or(0.0);
                let km = pd_meta.map(|p| p.kill_rate(meta_at(t))).unwrap_or(0.0);
                kp.max(km)
            };
            let integral = quadrature::integrate(integrand, 0.0, dt, None, None)?;
            (-integral).exp()
        };
        factors.push(factor);
    }

    record.concentration = gut0 * (-absorption_rate * dt).exp();
    record.concentration2 = parent_at(dt);
    metabolite_record.concentration = meta_at(dt);
    Ok(factors)
}

/// Advance one drug's concentration by `dt` days, applying `dose_mg` once
/// at the start of the interval, and return the per-genotype survival
/// factor vector (1.0 for genotypes the drug has no PD data for).
///
/// `metabolite` is `Some` only for `CompartmentModel::Conversion`.
pub fn advance(
    drug: &DrugType,
    genotypes: &GenotypeRegistry,
    record: &mut DrugRecord,
    metabolite: Option<(&DrugType, &mut DrugRecord)>,
    dose_mg: f64,
    dt: f64,
) -> Result<Vec<f64>, CoreError> {
    match &drug.model {
        CompartmentModel::OneCompartment { elimination_rate } => {
            step_one_compartment(drug, *elimination_rate, genotypes, record, dose_mg, dt)
        }
        CompartmentModel::MultiCompartment {
            a,
            alpha,
            b,
            beta,
            c,
            gamma,
        } => step_multi_compartment(
            drug, *a, *alpha, *b, *beta, *c, *gamma, genotypes, record, dose_mg, dt,
        ),
        CompartmentModel::Conversion {
            absorption_rate,
            elimination_rate,
            conversion_rate,
            metabolite_elimination_rate,
            ..
        } => {
            let (meta_drug, meta_record) =
                metabolite.expect("conversion model needs metabolite record");
            step_conversion(
                drug,
                meta_drug,
                *absorption_rate,
                *elimination_rate,
                *conversion_rate,
                *metabolite_elimination_rate,
                genotypes,
                record,
                meta_record,
                dose_mg,
                dt,
            )
        }
    }
}
