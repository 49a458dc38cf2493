//! Simulation World - in-process host for the relationship builder
//!
//! Pawns are hecs entities. This is the storage the builder commits into,
//! reached only through the [`crate::engine`] traits.

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::debug;

use crate::components::*;
use crate::engine::{GenerationRequest, PawnGenerator, PawnSnapshot, RelationStore, WorldRegistry};
use crate::error::{KinshipError, Result};
use crate::names;
use crate::synthesis::gaussian_asymmetric;

pub const DEFAULT_KIND_TEMPLATE: &str = "Colonist";
pub const DEFAULT_LIFE_EXPECTANCY: f32 = 80.0;

/// Everything needed to spawn a pawn by hand.
#[derive(Debug, Clone)]
pub struct PawnSpec {
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub biological_age: u32,
    pub chronological_age: u32,
    pub kind_template: String,
}

impl PawnSpec {
    pub fn new(first_name: impl Into<String>, gender: Gender, biological_age: u32) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: String::new(),
            gender,
            biological_age,
            chronological_age: biological_age,
            kind_template: DEFAULT_KIND_TEMPLATE.to_string(),
        }
    }

    pub fn chronological(mut self, age: u32) -> Self {
        self.chronological_age = age;
        self
    }

    pub fn kind_template(mut self, template: impl Into<String>) -> Self {
        self.kind_template = template.into();
        self
    }
}

pub struct SimulationWorld {
    pub world: World,
    next_pawn_id: u64,
    next_id_number: u64,
    factions: Vec<Faction>,
    ancients: FactionId,
    races: HashMap<String, f32>,
    rng: StdRng,
}

impl SimulationWorld {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic world for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let colony = Faction {
            id: FactionId(1),
            name: "Colony".to_string(),
            is_player: true,
            humanlike: true,
            hidden: false,
        };
        let ancients = Faction {
            id: FactionId(2),
            name: "Ancients".to_string(),
            is_player: false,
            humanlike: true,
            hidden: true,
        };
        let mut races = HashMap::new();
        races.insert(DEFAULT_KIND_TEMPLATE.to_string(), DEFAULT_LIFE_EXPECTANCY);

        Self {
            world: World::new(),
            next_pawn_id: 1,
            next_id_number: 1,
            factions: vec![colony, ancients],
            ancients: FactionId(2),
            races,
            rng,
        }
    }

    pub fn add_faction(&mut self, name: impl Into<String>, humanlike: bool) -> FactionId {
        let id = FactionId(self.factions.len() as u64 + 1);
        self.factions.push(Faction {
            id,
            name: name.into(),
            is_player: false,
            humanlike,
            hidden: false,
        });
        id
    }

    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.iter().find(|f| f.id == id)
    }

    pub fn add_race(&mut self, kind_template: impl Into<String>, life_expectancy: f32) {
        self.races.insert(kind_template.into(), life_expectancy);
    }

    pub fn remove_race(&mut self, kind_template: &str) -> bool {
        self.races.remove(kind_template).is_some()
    }

    /// Spawn a living pawn that is not registered as a world pawn.
    pub fn spawn_pawn(&mut self, spec: PawnSpec) -> PawnRef {
        let life_expectancy = self
            .races
            .get(&spec.kind_template)
            .copied()
            .unwrap_or(DEFAULT_LIFE_EXPECTANCY);
        let id = PawnId(self.next_pawn_id);
        self.next_pawn_id += 1;
        let number = self.next_id_number();

        let entity = self.world.spawn((
            Person {
                id,
                first_name: spec.first_name,
                last_name: spec.last_name,
            },
            spec.gender,
            Age::new(spec.biological_age, spec.chronological_age),
            Race {
                kind_template: spec.kind_template,
                life_expectancy,
            },
            IdNumber(number),
            Relations::default(),
            Alive,
        ));
        Self::pawn_ref(entity)
    }

    pub fn spawn_world_pawn(&mut self, spec: PawnSpec) -> PawnRef {
        let pawn = self.spawn_pawn(spec);
        self.register_world_pawn(pawn);
        pawn
    }

    pub fn register_world_pawn(&mut self, pawn: PawnRef) -> bool {
        match self.entity(pawn) {
            Some(entity) => self.world.insert_one(entity, WorldPawn).is_ok(),
            None => false,
        }
    }

    /// Detached working copy of a pawn: same id and attributes, no relations,
    /// never registered.
    pub fn snapshot_copy(&mut self, pawn: PawnRef) -> Option<PawnRef> {
        let entity = self.entity(pawn)?;
        let person = (*self.world.get::<&Person>(entity).ok()?).clone();
        let gender = *self.world.get::<&Gender>(entity).ok()?;
        let age = *self.world.get::<&Age>(entity).ok()?;
        let race = (*self.world.get::<&Race>(entity).ok()?).clone();
        let number = *self.world.get::<&IdNumber>(entity).ok()?;
        let dead = self.world.get::<&Dead>(entity).is_ok();

        let copy = self
            .world
            .spawn((person, gender, age, race, number, Relations::default()));
        if dead {
            let _ = self.world.insert_one(copy, Dead);
        } else {
            let _ = self.world.insert_one(copy, Alive);
        }
        Some(Self::pawn_ref(copy))
    }

    pub fn despawn(&mut self, pawn: PawnRef) -> bool {
        match self.entity(pawn) {
            Some(entity) => self.world.despawn(entity).is_ok(),
            None => false,
        }
    }

    /// Number of pawn entities, registered or not.
    pub fn pawn_count(&self) -> usize {
        self.world.query::<&Person>().iter().count()
    }

    pub fn world_pawn_count(&self) -> usize {
        self.world.query::<&Person>().with::<&WorldPawn>().iter().count()
    }

    pub fn pawn_id(&self, pawn: PawnRef) -> Option<PawnId> {
        let entity = self.entity(pawn)?;
        let person = self.world.get::<&Person>(entity).ok()?;
        Some(person.id)
    }

    pub fn age(&self, pawn: PawnRef) -> Option<Age> {
        let entity = self.entity(pawn)?;
        let age = self.world.get::<&Age>(entity).ok()?;
        Some(*age)
    }

    pub fn faction_of(&self, pawn: PawnRef) -> Option<FactionId> {
        let entity = self.entity(pawn)?;
        let member = self.world.get::<&FactionMember>(entity).ok()?;
        Some(member.0)
    }

    pub fn is_dead(&self, pawn: PawnRef) -> bool {
        self.entity(pawn)
            .map(|entity| self.world.get::<&Dead>(entity).is_ok())
            .unwrap_or(false)
    }

    fn entity(&self, pawn: PawnRef) -> Option<Entity> {
        Entity::from_bits(pawn.0).filter(|entity| self.world.contains(*entity))
    }

    fn pawn_ref(entity: Entity) -> PawnRef {
        PawnRef(entity.to_bits().get())
    }
}

impl Default for SimulationWorld {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Engine traits
// ============================================================================

impl RelationStore for SimulationWorld {
    fn contains(&self, pawn: PawnRef) -> bool {
        self.entity(pawn).is_some()
    }

    fn direct_relations(&self, pawn: PawnRef) -> Vec<DirectRelation> {
        self.entity(pawn)
            .and_then(|entity| self.world.get::<&Relations>(entity).ok())
            .map(|relations| relations.direct.clone())
            .unwrap_or_default()
    }

    fn add_direct_relation(&mut self, pawn: PawnRef, relation: DirectRelation) {
        let Some(entity) = self.entity(pawn) else {
            return;
        };
        if let Ok(mut relations) = self.world.get::<&mut Relations>(entity) {
            let exists = relations
                .direct
                .iter()
                .any(|r| r.def == relation.def && r.other == relation.other);
            if !exists {
                relations.direct.push(relation);
            }
        }
    }

    fn add_known_by(&mut self, pawn: PawnRef, other: PawnRef) {
        let Some(entity) = self.entity(pawn) else {
            return;
        };
        if let Ok(mut relations) = self.world.get::<&mut Relations>(entity) {
            relations.known_by.insert(other);
        }
    }

    fn clear_relations(&mut self, pawn: PawnRef) {
        let Some(entity) = self.entity(pawn) else {
            return;
        };
        let (direct, known_by) = match self.world.get::<&mut Relations>(entity) {
            Ok(mut relations) => (
                std::mem::take(&mut relations.direct),
                std::mem::take(&mut relations.known_by),
            ),
            Err(_) => return,
        };

        // Drop the back references on both sides.
        for relation in direct {
            if let Some(other) = self.entity(relation.other) {
                if let Ok(mut relations) = self.world.get::<&mut Relations>(other) {
                    relations.known_by.remove(&pawn);
                }
            }
        }
        for holder in known_by {
            if let Some(other) = self.entity(holder) {
                if let Ok(mut relations) = self.world.get::<&mut Relations>(other) {
                    relations.direct.retain(|r| r.other != pawn);
                }
            }
        }
    }

    fn id_number(&self, pawn: PawnRef) -> Option<u64> {
        let entity = self.entity(pawn)?;
        let number = self.world.get::<&IdNumber>(entity).ok()?;
        Some(number.0)
    }

    fn set_id_number(&mut self, pawn: PawnRef, number: u64) {
        if let Some(entity) = self.entity(pawn) {
            if let Ok(mut current) = self.world.get::<&mut IdNumber>(entity) {
                current.0 = number;
            }
        }
    }

    fn compatibility_offset(&self, pawn: PawnRef, other_number: u64) -> f32 {
        let own = self.id_number(pawn).unwrap_or(0);
        let mut rng = StdRng::seed_from_u64((own ^ other_number).wrapping_mul(37));
        gaussian_asymmetric(&mut rng, 0.3, 1.0, 1.4)
    }

    fn set_ages(&mut self, pawn: PawnRef, biological: u32, chronological: u32) {
        if let Some(entity) = self.entity(pawn) {
            if let Ok(mut age) = self.world.get::<&mut Age>(entity) {
                *age = Age::new(biological, chronological);
            }
        }
    }
}

impl PawnGenerator for SimulationWorld {
    fn generate(&mut self, request: &GenerationRequest) -> Result<PawnRef> {
        let template = request
            .kind_template
            .clone()
            .unwrap_or_else(|| DEFAULT_KIND_TEMPLATE.to_string());
        if !self.races.contains_key(&template) {
            return Err(KinshipError::Generation(format!(
                "unknown kind template {}",
                template
            )));
        }

        let gender = request.fixed_gender.unwrap_or_else(|| {
            if self.rng.gen::<bool>() {
                Gender::Male
            } else {
                Gender::Female
            }
        });
        let biological = request
            .fixed_biological_age
            .unwrap_or_else(|| self.rng.gen_range(18..50));
        let chronological = biological + self.rng.gen_range(0..3);
        let first_name = names::random_first_name(Some(gender), &mut self.rng).to_string();
        let last_name = names::random_last_name(&mut self.rng).to_string();

        let pawn = self.spawn_pawn(PawnSpec {
            first_name,
            last_name,
            gender,
            biological_age: biological,
            chronological_age: chronological,
            kind_template: template,
        });
        debug!(pawn = ?pawn, age = biological, ?gender, "Generated pawn");
        Ok(pawn)
    }

    fn snapshot(&self, pawn: PawnRef) -> Option<PawnSnapshot> {
        let entity = self.entity(pawn)?;
        let person = self.world.get::<&Person>(entity).ok()?;
        let age = self.world.get::<&Age>(entity).ok()?;
        let race = self.world.get::<&Race>(entity).ok()?;
        let gender = self.world.get::<&Gender>(entity).ok().map(|g| *g);
        Some(PawnSnapshot {
            id: person.id,
            name: person.full_name(),
            biological_age: age.biological,
            chronological_age: age.chronological,
            gender,
            kind_template: race.kind_template.clone(),
            life_expectancy: race.life_expectancy,
        })
    }

    fn kill(&mut self, pawn: PawnRef) {
        if let Some(entity) = self.entity(pawn) {
            let _ = self.world.remove_one::<Alive>(entity);
            let _ = self.world.insert_one(entity, Dead);
        }
    }

    fn discard(&mut self, pawn: PawnRef) {
        self.despawn(pawn);
    }
}

impl WorldRegistry for SimulationWorld {
    fn random_non_colony_faction(&mut self) -> Option<FactionId> {
        let candidates: Vec<FactionId> = self
            .factions
            .iter()
            .filter(|f| !f.is_player && f.humanlike && !f.hidden)
            .map(|f| f.id)
            .collect();
        candidates.choose(&mut self.rng).copied()
    }

    fn ancients_faction(&self) -> Option<FactionId> {
        Some(self.ancients)
    }

    fn set_faction(&mut self, pawn: PawnRef, faction: FactionId) {
        if let Some(entity) = self.entity(pawn) {
            let _ = self.world.insert_one(entity, FactionMember(faction));
        }
    }

    fn next_id_number(&mut self) -> u64 {
        let number = self.next_id_number;
        self.next_id_number += 1;
        number
    }

    fn find_world_pawn(&self, id: PawnId) -> Option<PawnRef> {
        self.world
            .query::<&Person>()
            .with::<&WorldPawn>()
            .iter()
            .find(|(_, person)| person.id == id)
            .map(|(entity, _)| Self::pawn_ref(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_snapshot() {
        let mut world = SimulationWorld::with_seed(1);
        let pawn = world.spawn_pawn(PawnSpec::new("Ada", Gender::Female, 30).chronological(34));

        let snapshot = world.snapshot(pawn).unwrap();
        assert_eq!(snapshot.name, "Ada");
        assert_eq!(snapshot.biological_age, 30);
        assert_eq!(snapshot.chronological_age, 34);
        assert_eq!(snapshot.gender, Some(Gender::Female));
        assert_eq!(snapshot.life_expectancy, DEFAULT_LIFE_EXPECTANCY);
    }

    #[test]
    fn test_clear_relations_both_sides() {
        let mut world = SimulationWorld::with_seed(1);
        let a = world.spawn_pawn(PawnSpec::new("A", Gender::Male, 30));
        let b = world.spawn_pawn(PawnSpec::new("B", Gender::Female, 30));
        world.add_direct_relation(b, DirectRelation::new("Rival", a));
        world.add_known_by(a, b);

        world.clear_relations(a);

        assert!(world.direct_relations(b).is_empty());
        assert!(world.direct_relations(a).is_empty());
    }

    #[test]
    fn test_duplicate_relation_ignored() {
        let mut world = SimulationWorld::with_seed(1);
        let a = world.spawn_pawn(PawnSpec::new("A", Gender::Male, 30));
        let b = world.spawn_pawn(PawnSpec::new("B", Gender::Female, 30));
        world.add_direct_relation(a, DirectRelation::new("Spouse", b));
        world.add_direct_relation(a, DirectRelation::new("Spouse", b));
        assert_eq!(world.direct_relations(a).len(), 1);
    }

    #[test]
    fn test_generate_honours_request() {
        let mut world = SimulationWorld::with_seed(3);
        let pawn = world
            .generate(&GenerationRequest {
                fixed_biological_age: Some(61),
                fixed_gender: Some(Gender::Male),
                kind_template: None,
            })
            .unwrap();
        let snapshot = world.snapshot(pawn).unwrap();
        assert_eq!(snapshot.biological_age, 61);
        assert_eq!(snapshot.gender, Some(Gender::Male));
        assert!(snapshot.chronological_age >= 61);
    }

    #[test]
    fn test_custom_race_life_expectancy() {
        let mut world = SimulationWorld::with_seed(3);
        world.add_race("Elf", 400.0);
        let pawn = world.spawn_pawn(PawnSpec::new("Lir", Gender::Female, 120).kind_template("Elf"));
        let snapshot = world.snapshot(pawn).unwrap();
        assert_eq!(snapshot.kind_template, "Elf");
        assert_eq!(snapshot.life_expectancy, 400.0);

        assert!(world.remove_race("Elf"));
        assert!(!world.remove_race("Elf"));
    }

    #[test]
    fn test_generate_unknown_template_fails() {
        let mut world = SimulationWorld::with_seed(3);
        let result = world.generate(&GenerationRequest {
            kind_template: Some("Dragon".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(KinshipError::Generation(_))));
    }

    #[test]
    fn test_world_pawn_lookup_skips_copies() {
        let mut world = SimulationWorld::with_seed(1);
        let original = world.spawn_world_pawn(PawnSpec::new("Old", Gender::Male, 70));
        let copy = world.snapshot_copy(original).unwrap();
        let id = world.pawn_id(original).unwrap();

        assert_eq!(world.pawn_id(copy), Some(id));
        assert_eq!(world.find_world_pawn(id), Some(original));
        assert_eq!(world.world_pawn_count(), 1);
    }

    #[test]
    fn test_compatibility_is_deterministic() {
        let mut world = SimulationWorld::with_seed(1);
        let a = world.spawn_pawn(PawnSpec::new("A", Gender::Male, 30));
        assert_eq!(
            world.compatibility_offset(a, 1234),
            world.compatibility_offset(a, 1234)
        );
    }

    #[test]
    fn test_random_faction_excludes_player_and_hidden() {
        let mut world = SimulationWorld::with_seed(1);
        assert_eq!(world.random_non_colony_faction(), None);

        let outlanders = world.add_faction("Outlanders", true);
        world.add_faction("Wolves", false);
        for _ in 0..10 {
            assert_eq!(world.random_non_colony_faction(), Some(outlanders));
        }
    }
}
