//! Identity types and ECS components for pawns
//!
//! Shared by the editing model and the hecs-backed host world.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Identity
// ============================================================================

/// Stable unique load id of a pawn. Survives snapshots and id-number swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PawnId(pub u64);

impl std::fmt::Display for PawnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pawn_{}", self.0)
    }
}

/// Opaque handle to a pawn record inside the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PawnRef(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactionId(pub u64);

// ============================================================================
// Pawn attributes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn opposite(self) -> Self {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

/// Where a pawn comes from, which decides how it is resolved at commit time
/// and whether it gets a display index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PawnKind {
    /// Starting colonist, edited directly.
    Colonist,
    /// Visible pawn that lives in the world outside the colony.
    World,
    /// Detached copy of an already registered world pawn.
    Hidden,
    /// Placeholder generated by the editor.
    Temporary,
}

impl PawnKind {
    /// Hidden and temporary pawns are not shown as real characters.
    pub fn is_hidden(self) -> bool {
        matches!(self, PawnKind::Hidden | PawnKind::Temporary)
    }
}

// ============================================================================
// Host components
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: PawnId,
    pub first_name: String,
    pub last_name: String,
}

impl Person {
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// Ages in whole years. Chronological is never below biological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Age {
    pub biological: u32,
    pub chronological: u32,
}

impl Age {
    pub fn new(biological: u32, chronological: u32) -> Self {
        Self {
            biological,
            chronological: chronological.max(biological),
        }
    }
}

/// Pawn kind template and the life expectancy of its species.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    pub kind_template: String,
    pub life_expectancy: f32,
}

/// Numeric id slot used by pair-compatibility scoring. Can be swapped for a
/// better-scoring spare without touching `PawnId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdNumber(pub u64);

/// One stored relation: `other` is this pawn's `def`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRelation {
    pub def: String,
    pub other: PawnRef,
    pub strength: i32,
}

impl DirectRelation {
    pub fn new(def: impl Into<String>, other: PawnRef) -> Self {
        Self {
            def: def.into(),
            other,
            strength: 0,
        }
    }
}

/// Relation storage of a single pawn.
#[derive(Debug, Clone, Default)]
pub struct Relations {
    pub direct: Vec<DirectRelation>,
    /// Pawns holding a direct relation that points at this pawn.
    pub known_by: HashSet<PawnRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactionMember(pub FactionId);

/// Marker: entity is alive
#[derive(Debug, Clone, Copy, Default)]
pub struct Alive;

/// Marker: entity has died
#[derive(Debug, Clone, Copy, Default)]
pub struct Dead;

/// Marker: pawn is registered with the world pawn registry
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldPawn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    pub is_player: bool,
    pub humanlike: bool,
    pub hidden: bool,
}
