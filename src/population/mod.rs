//! The human population: an append-only ordered vector with a stable
//! "oldest first, then birth order" iteration contract (§3 "Human", §5
//! "Ordering guarantees").

pub mod human;
pub mod imported;

pub use human::{Human, HumanId, SubPopulationMembership};
pub use imported::{apply_imported_infections, ImportedInfectionsParams};

use crate::id::IdGenerator;
use crate::rng::PopulationRng;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Population {
    humans: Vec<Human>,
    #[serde(skip, default = "IdGenerator::new")]
    ids: IdGenerator,
}

impl Population {
    pub fn new() -> Self {
        Population { humans: Vec::new(), ids: IdGenerator::new() }
    }

    pub fn len(&self) -> usize {
        self.humans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.humans.is_empty()
    }

    /// Stable iteration order: oldest first, then birth order for equal
    /// ages (i.e. insertion order, since newborns are always appended).
    pub fn iter(&self) -> impl Iterator<Item = &Human> {
        self.humans.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Human> {
        self.humans.iter_mut()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Human> {
        self.humans.iter().filter(|h| h.alive)
    }

    /// Append a newborn at the tail. New births added mid-step are not
    /// updated until the next step (§5 ordering guarantees) -- the
    /// caller is responsible for deferring this call to step end.
    pub fn append_newborn(
        &mut self,
        now: SimTime,
        availability_factor: f64,
        innate_immunity: f64,
        treatment_seeking_factor: f64,
    ) -> HumanId {
        let id = HumanId(self.ids.next_id());
        self.humans.push(Human::new(id, now, availability_factor, innate_immunity, treatment_seeking_factor));
        id
    }

    /// Seed the initial population from an age pyramid: `ages_days` in
    /// oldest-first order, matching the iteration contract from the
    /// first step onward.
    pub fn seed_from_age_pyramid(
        &mut self,
        now: SimTime,
        mut ages_days: Vec<i64>,
        rng: &mut PopulationRng,
    ) {
        ages_days.sort_by(|a, b| b.cmp(a)); // oldest (largest age) first
        for age_days in ages_days {
            let availability = rng.log_normal_mean_sigma(1.0, 0.5);
            let innate_immunity = rng.log_normal_mean_sigma(1.0, 0.3);
            let treatment_seeking = rng.log_normal_mean_sigma(1.0, 0.3);
            let dob = now - age_days;
            let id = HumanId(self.ids.next_id());
            self.humans.push(Human::new(id, dob, availability, innate_immunity, treatment_seeking));
        }
    }

    /// Mark humans whose doomed counter has reached zero, or whose age
    /// exceeds `max_age_days`, as dead. Dead humans stay in their slot
    /// (preserving order) until the next `compact`.
    pub fn kill_if(&mut self, mut predicate: impl FnMut(&Human) -> bool) {
        for h in self.humans.iter_mut().filter(|h| h.alive) {
            if predicate(h) {
                h.alive = false;
            }
        }
    }

    /// Remove dead humans, preserving the relative order of survivors.
    pub fn compact(&mut self) {
        self.humans.retain(|h| h.alive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newborns_append_at_tail_preserving_order() {
        let mut pop = Population::new();
        let a = pop.append_newborn(SimTime::zero(), 1.0, 1.0, 1.0);
        let b = pop.append_newborn(SimTime::from_days(1), 1.0, 1.0, 1.0);
        let ids: Vec<HumanId> = pop.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn compact_preserves_survivor_order() {
        let mut pop = Population::new();
        let a = pop.append_newborn(SimTime::zero(), 1.0, 1.0, 1.0);
        let _b = pop.append_newborn(SimTime::zero(), 1.0, 1.0, 1.0);
        let c = pop.append_newborn(SimTime::zero(), 1.0, 1.0, 1.0);
        pop.kill_if(|h| h.id == HumanId(2));
        pop.compact();
        let ids: Vec<HumanId> = pop.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn seed_from_age_pyramid_orders_oldest_first() {
        let mut pop = Population::new();
        let mut rng = PopulationRng::seed_from_u64(1);
        pop.seed_from_age_pyramid(SimTime::from_days(1000), vec![100, 500, 50], &mut rng);
        let ages: Vec<i64> = pop.iter().map(|h| h.age_days(SimTime::from_days(1000))).collect();
        assert_eq!(ages, vec![500, 100, 50]);
    }
}
