//! Kinship Relationship Builder
//!
//! Builds a consistent family and relationship graph for characters before
//! they enter a simulation world. Player intents are deduplicated, sibling
//! groups get the parents they are missing, hidden parents are aged to fit
//! their children, and the result is written into the host's relation storage.

pub mod commit;
pub mod components;
pub mod config;
pub mod defs;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod intent;
pub mod manager;
pub mod names;
pub mod registry;
pub mod roster;
pub mod synthesis;
pub mod world;

pub use commit::{CommitReport, RelationshipCommitter};
pub use components::*;
pub use config::KinshipConfig;
pub use defs::DefDatabase;
pub use engine::{Engine, PawnGenerator, RelationStore, WorldRegistry};
pub use error::{KinshipError, Result};
pub use grouping::{ParentChildGroup, ParentChildGroups};
pub use intent::{Relationship, RelationshipList};
pub use manager::RelationshipManager;
pub use registry::RelationshipTypeRegistry;
pub use roster::{Individual, Roster};
pub use synthesis::SyntheticPawnFactory;
pub use world::SimulationWorld;
