//! Host engine interfaces
//!
//! The builder never touches host storage directly. Everything it needs from
//! the simulation goes through these traits, implemented by the host (see
//! [`crate::world::SimulationWorld`] for the in-process reference host).

use crate::components::{DirectRelation, FactionId, Gender, PawnId, PawnRef};
use crate::error::Result;

/// Mutation and queries over a pawn's relation storage.
pub trait RelationStore {
    fn contains(&self, pawn: PawnRef) -> bool;

    fn direct_relations(&self, pawn: PawnRef) -> Vec<DirectRelation>;

    /// Relation types `other` holds toward `pawn` ("other is pawn's ...").
    fn relations_between(&self, pawn: PawnRef, other: PawnRef) -> Vec<String> {
        self.direct_relations(pawn)
            .into_iter()
            .filter(|r| r.other == other)
            .map(|r| r.def)
            .collect()
    }

    fn add_direct_relation(&mut self, pawn: PawnRef, relation: DirectRelation);

    /// Record that `other` holds a direct relation pointing at `pawn`.
    fn add_known_by(&mut self, pawn: PawnRef, other: PawnRef);

    fn clear_relations(&mut self, pawn: PawnRef);

    fn id_number(&self, pawn: PawnRef) -> Option<u64>;

    fn set_id_number(&mut self, pawn: PawnRef, number: u64);

    /// Pair-compatibility score of `pawn` against a pawn holding `other_number`.
    fn compatibility_offset(&self, pawn: PawnRef, other_number: u64) -> f32;

    fn set_ages(&mut self, pawn: PawnRef, biological: u32, chronological: u32);
}

/// Pawn generation options. `None` leaves the choice to the host.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub fixed_biological_age: Option<u32>,
    pub fixed_gender: Option<Gender>,
    pub kind_template: Option<String>,
}

/// What the builder reads back about a host pawn.
#[derive(Debug, Clone)]
pub struct PawnSnapshot {
    pub id: PawnId,
    pub name: String,
    pub biological_age: u32,
    pub chronological_age: u32,
    pub gender: Option<Gender>,
    pub kind_template: String,
    pub life_expectancy: f32,
}

pub trait PawnGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<PawnRef>;

    fn snapshot(&self, pawn: PawnRef) -> Option<PawnSnapshot>;

    fn kill(&mut self, pawn: PawnRef);

    /// Remove a pawn that was never registered anywhere.
    fn discard(&mut self, pawn: PawnRef);
}

pub trait WorldRegistry {
    fn random_non_colony_faction(&mut self) -> Option<FactionId>;

    fn ancients_faction(&self) -> Option<FactionId>;

    fn set_faction(&mut self, pawn: PawnRef, faction: FactionId);

    /// Next globally unique id number.
    fn next_id_number(&mut self) -> u64;

    /// Registered world pawn with this id, alive or dead.
    fn find_world_pawn(&self, id: PawnId) -> Option<PawnRef>;
}

/// Everything the builder needs from the host.
pub trait Engine: RelationStore + PawnGenerator + WorldRegistry {}

impl<T: RelationStore + PawnGenerator + WorldRegistry> Engine for T {}
