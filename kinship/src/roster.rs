//! Working copies of the pawns being edited
//!
//! Intents and groups refer to pawns by [`PawnId`]; the roster owns the
//! actual [`Individual`] records.

use std::collections::HashMap;

use crate::components::{Gender, PawnId, PawnKind, PawnRef};
use crate::engine::PawnGenerator;
use crate::error::{KinshipError, Result};

/// Editor-side view of one pawn.
#[derive(Debug, Clone)]
pub struct Individual {
    pub id: PawnId,
    /// Host record this working copy was taken from.
    pub pawn: PawnRef,
    pub name: String,
    biological_age: u32,
    chronological_age: u32,
    pub gender: Option<Gender>,
    pub kind: PawnKind,
    /// Display index for hidden and temporary pawns ("Unknown 1", ...).
    pub index: Option<u32>,
    pub kind_template: String,
    pub life_expectancy: f32,
}

impl Individual {
    /// Read a host pawn into a working copy.
    pub fn load<G: PawnGenerator + ?Sized>(host: &G, pawn: PawnRef, kind: PawnKind) -> Result<Self> {
        let snapshot = host
            .snapshot(pawn)
            .ok_or_else(|| KinshipError::Generation(format!("no pawn behind {:?}", pawn)))?;
        Ok(Self {
            id: snapshot.id,
            pawn,
            name: snapshot.name,
            biological_age: snapshot.biological_age,
            chronological_age: snapshot.chronological_age.max(snapshot.biological_age),
            gender: snapshot.gender,
            kind,
            index: None,
            kind_template: snapshot.kind_template,
            life_expectancy: snapshot.life_expectancy,
        })
    }

    pub fn biological_age(&self) -> u32 {
        self.biological_age
    }

    pub fn chronological_age(&self) -> u32 {
        self.chronological_age
    }

    /// Years between chronological and biological age.
    pub fn age_gap(&self) -> u32 {
        self.chronological_age - self.biological_age
    }

    /// Change biological age and move chronological age with it.
    pub fn set_biological_age(&mut self, age: u32) {
        let gap = self.age_gap();
        self.biological_age = age;
        self.chronological_age = age + gap;
    }

    /// Set both ages explicitly, resetting the gap.
    pub fn reset_ages(&mut self, biological: u32, chronological: u32) {
        self.biological_age = biological;
        self.chronological_age = chronological.max(biological);
    }

    pub fn is_hidden(&self) -> bool {
        self.kind.is_hidden()
    }
}

/// Owns every working copy in the session, and the ordered list of pawns
/// taking part in parent/child editing.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pawns: HashMap<PawnId, Individual>,
    members: Vec<PawnId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a pawn without listing it as a member.
    pub fn insert(&mut self, individual: Individual) -> PawnId {
        let id = individual.id;
        self.pawns.insert(id, individual);
        id
    }

    /// Store a pawn and list it as a member.
    pub fn add_member(&mut self, individual: Individual) -> PawnId {
        let id = self.insert(individual);
        if !self.members.contains(&id) {
            self.members.push(id);
        }
        id
    }

    /// List an already stored pawn as a member.
    pub fn enlist(&mut self, id: PawnId) -> bool {
        if !self.pawns.contains_key(&id) {
            return false;
        }
        if !self.members.contains(&id) {
            self.members.push(id);
        }
        true
    }

    pub fn get(&self, id: PawnId) -> Option<&Individual> {
        self.pawns.get(&id)
    }

    pub fn get_mut(&mut self, id: PawnId) -> Option<&mut Individual> {
        self.pawns.get_mut(&id)
    }

    pub fn contains(&self, id: PawnId) -> bool {
        self.pawns.contains_key(&id)
    }

    pub fn remove(&mut self, id: PawnId) -> Option<Individual> {
        self.members.retain(|member| *member != id);
        self.pawns.remove(&id)
    }

    /// Every stored pawn, members or not, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Individual> {
        self.pawns.values()
    }

    /// Members in the order they were added.
    pub fn members(&self) -> impl Iterator<Item = &Individual> {
        self.members.iter().filter_map(|id| self.pawns.get(id))
    }

    pub fn colony_and_world_pawns(&self) -> impl Iterator<Item = &Individual> {
        self.members().filter(|individual| !individual.is_hidden())
    }

    pub fn hidden_pawns(&self) -> impl Iterator<Item = &Individual> {
        self.members().filter(|individual| individual.is_hidden())
    }

    pub fn len(&self) -> usize {
        self.pawns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pawns.is_empty()
    }

    pub fn clear(&mut self) {
        self.pawns.clear();
        self.members.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Bare individual for tests that never touch a host.
    pub(crate) fn individual(id: u64, gender: Option<Gender>, age: u32, kind: PawnKind) -> Individual {
        Individual {
            id: PawnId(id),
            pawn: PawnRef(id),
            name: format!("Pawn {}", id),
            biological_age: age,
            chronological_age: age,
            gender,
            kind,
            index: None,
            kind_template: "Colonist".to_string(),
            life_expectancy: 80.0,
        }
    }

    #[test]
    fn test_age_gap_preserved() {
        let mut pawn = individual(1, Some(Gender::Male), 30, PawnKind::Hidden);
        pawn.reset_ages(30, 42);
        pawn.set_biological_age(50);
        assert_eq!(pawn.biological_age(), 50);
        assert_eq!(pawn.chronological_age(), 62);
        assert_eq!(pawn.age_gap(), 12);
    }

    #[test]
    fn test_member_views() {
        let mut roster = Roster::new();
        roster.add_member(individual(1, None, 20, PawnKind::Colonist));
        roster.add_member(individual(2, None, 60, PawnKind::Hidden));
        roster.add_member(individual(3, None, 60, PawnKind::Temporary));
        roster.insert(individual(4, None, 60, PawnKind::Temporary));

        assert_eq!(roster.members().count(), 3);
        assert_eq!(roster.colony_and_world_pawns().count(), 1);
        assert_eq!(roster.hidden_pawns().count(), 2);

        roster.remove(PawnId(2));
        assert_eq!(roster.hidden_pawns().count(), 1);
        assert_eq!(roster.len(), 3);
    }
}
