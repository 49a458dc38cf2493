//! Relationship type registry
//!
//! Wraps the definition database with what the editor needs to know about
//! each type: whether it can be created, which types the player may pick,
//! and what the inverse of each type is. All of it is worked out once when
//! the registry is built.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::defs::{DefDatabase, RelationDef, RelationWorker};
use crate::engine::{Engine, GenerationRequest, RelationStore};
use crate::error::{KinshipError, Result};

#[derive(Debug)]
pub struct RelationshipTypeRegistry {
    db: DefDatabase,
    allowed: Vec<String>,
    inverses: HashMap<String, Option<String>>,
}

impl RelationshipTypeRegistry {
    /// Build the registry, resolving inverses against `engine`. Empirical
    /// resolution generates throwaway pawns and discards them again.
    pub fn new<E: Engine>(db: DefDatabase, engine: &mut E) -> Self {
        let mut registry = Self {
            db,
            allowed: Vec::new(),
            inverses: HashMap::new(),
        };

        registry.allowed = registry
            .db
            .all()
            .iter()
            .filter(|def| registry.is_allowed(def))
            .map(|def| def.name.clone())
            .collect();

        let names: Vec<String> = registry.db.all().iter().map(|def| def.name.clone()).collect();
        for name in names {
            let inverse = registry.resolve_inverse(&name, engine);
            registry.inverses.insert(name, inverse);
        }

        info!(
            definitions = registry.db.all().len(),
            allowed = registry.allowed.len(),
            "Relationship type registry ready"
        );
        registry
    }

    fn is_allowed(&self, def: &RelationDef) -> bool {
        if def.family_by_blood || def.implied {
            return false;
        }
        if self.db.extended(&def.name).is_some_and(|ext| ext.animal) {
            return false;
        }
        self.find_worker(&def.name).is_some()
    }

    fn resolve_inverse<E: Engine>(&self, name: &str, engine: &mut E) -> Option<String> {
        if let Some(inverse) = self.db.extended(name).and_then(|ext| ext.inverse.clone()) {
            return Some(inverse);
        }
        let def = self.db.named(name)?;
        let worker = self.find_worker(name)?;

        let source = match engine.generate(&GenerationRequest::default()) {
            Ok(pawn) => pawn,
            Err(err) => {
                debug!(def = name, error = %err, "Could not generate pawn for inverse lookup");
                return None;
            }
        };
        let target = match engine.generate(&GenerationRequest::default()) {
            Ok(pawn) => pawn,
            Err(err) => {
                debug!(def = name, error = %err, "Could not generate pawn for inverse lookup");
                engine.discard(source);
                return None;
            }
        };

        let created = {
            let store: &mut dyn RelationStore = engine;
            worker.create_relation(def, store, source, target)
        };
        let inverse = match created {
            Ok(()) => engine.relations_between(source, target).into_iter().next(),
            Err(err) => {
                debug!(def = name, error = %err, "Creation routine failed during inverse lookup");
                None
            }
        };

        engine.discard(source);
        engine.discard(target);
        if inverse.is_none() {
            debug!(def = name, "No inverse relation found");
        }
        inverse
    }

    /// Types the player may declare directly: not implied by blood, not for
    /// animals, and creatable.
    pub fn allowed_types(&self) -> &[String] {
        &self.allowed
    }

    /// What the target is to the source, if anything.
    pub fn inverse_of(&self, name: &str) -> Option<&str> {
        self.inverses.get(name).and_then(|inverse| inverse.as_deref())
    }

    /// The creation routine for a type. An extended override wins over the
    /// base definition's worker.
    pub fn find_worker(&self, name: &str) -> Option<Arc<dyn RelationWorker>> {
        self.db
            .extended(name)
            .and_then(|ext| ext.worker.clone())
            .or_else(|| self.db.named(name).and_then(|def| def.worker.clone()))
    }

    pub fn can_create(&self, name: &str) -> bool {
        self.find_worker(name).is_some()
    }

    pub fn require_worker(&self, name: &str) -> Result<Arc<dyn RelationWorker>> {
        self.find_worker(name)
            .ok_or_else(|| KinshipError::UnsupportedType(name.to_string()))
    }

    pub fn needs_compatibility(&self, name: &str) -> bool {
        self.db.extended(name).is_some_and(|ext| ext.needs_compatibility)
    }

    pub fn def(&self, name: &str) -> Option<&RelationDef> {
        self.db.named(name)
    }

    pub fn defs(&self) -> &DefDatabase {
        &self.db
    }
}
