//! Relation definitions
//!
//! A base definition per relation type, plus optional extended definitions
//! keyed by the same name that carry editor-specific overrides. Both load
//! from JSON into an immutable [`DefDatabase`] that is built once per session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::components::{DirectRelation, PawnRef};
use crate::engine::RelationStore;
use crate::error::Result;

pub const PARENT: &str = "Parent";
pub const CHILD: &str = "Child";

/// Creation routine for a relation type. A definition without one cannot be
/// created programmatically.
pub trait RelationWorker: fmt::Debug + Send + Sync {
    /// Make `source` be `target`'s `def`.
    fn create_relation(
        &self,
        def: &RelationDef,
        store: &mut dyn RelationStore,
        source: PawnRef,
        target: PawnRef,
    ) -> Result<()>;
}

/// Writes the relation on the target, mirrors it when reflexive, and writes
/// the reciprocal type back on the source when one is configured.
#[derive(Debug, Clone, Default)]
pub struct StandardWorker {
    pub reciprocal: Option<String>,
}

impl RelationWorker for StandardWorker {
    fn create_relation(
        &self,
        def: &RelationDef,
        store: &mut dyn RelationStore,
        source: PawnRef,
        target: PawnRef,
    ) -> Result<()> {
        store.add_direct_relation(target, DirectRelation::new(&def.name, source));
        store.add_known_by(source, target);
        if def.reflexive {
            store.add_direct_relation(source, DirectRelation::new(&def.name, target));
            store.add_known_by(target, source);
        } else if let Some(reciprocal) = &self.reciprocal {
            store.add_direct_relation(source, DirectRelation::new(reciprocal, target));
            store.add_known_by(target, source);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerSpec {
    Standard {
        #[serde(default)]
        reciprocal: Option<String>,
    },
}

impl WorkerSpec {
    fn build(&self) -> Arc<dyn RelationWorker> {
        match self {
            WorkerSpec::Standard { reciprocal } => Arc::new(StandardWorker {
                reciprocal: reciprocal.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelationDef {
    pub name: String,
    pub label: String,
    pub reflexive: bool,
    pub family_by_blood: bool,
    /// Derived from other relations; never stored as an intent.
    pub implied: bool,
    pub worker: Option<Arc<dyn RelationWorker>>,
}

/// Editor-side overrides for a base definition of the same name.
#[derive(Debug, Clone)]
pub struct ExtendedRelationDef {
    pub name: String,
    pub inverse: Option<String>,
    pub animal: bool,
    pub needs_compatibility: bool,
    pub worker: Option<Arc<dyn RelationWorker>>,
}

// ============================================================================
// Serialized form
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDefSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub reflexive: bool,
    #[serde(default)]
    pub family_by_blood: bool,
    #[serde(default)]
    pub implied: bool,
    #[serde(default)]
    pub worker: Option<WorkerSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedDefSpec {
    pub name: String,
    #[serde(default)]
    pub inverse: Option<String>,
    #[serde(default)]
    pub animal: bool,
    #[serde(default)]
    pub needs_compatibility: bool,
    #[serde(default)]
    pub worker: Option<WorkerSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionSet {
    #[serde(default)]
    pub relations: Vec<RelationDefSpec>,
    #[serde(default)]
    pub extended: Vec<ExtendedDefSpec>,
}

// ============================================================================
// Database
// ============================================================================

/// Read-only definition lookup.
#[derive(Debug, Clone, Default)]
pub struct DefDatabase {
    defs: Vec<RelationDef>,
    by_name: HashMap<String, usize>,
    extended: HashMap<String, ExtendedRelationDef>,
}

impl DefDatabase {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let set: DefinitionSet = serde_json::from_str(json)?;
        Ok(Self::from_set(&set))
    }

    pub fn from_set(set: &DefinitionSet) -> Self {
        let mut db = Self::default();
        for spec in &set.relations {
            let def = RelationDef {
                name: spec.name.clone(),
                label: spec.label.clone().unwrap_or_else(|| spec.name.to_lowercase()),
                reflexive: spec.reflexive,
                family_by_blood: spec.family_by_blood,
                implied: spec.implied,
                worker: spec.worker.as_ref().map(WorkerSpec::build),
            };
            // Later entries replace earlier ones with the same name.
            match db.by_name.get(&def.name) {
                Some(&index) => db.defs[index] = def,
                None => {
                    db.by_name.insert(def.name.clone(), db.defs.len());
                    db.defs.push(def);
                }
            }
        }
        for spec in &set.extended {
            db.extended.insert(
                spec.name.clone(),
                ExtendedRelationDef {
                    name: spec.name.clone(),
                    inverse: spec.inverse.clone(),
                    animal: spec.animal,
                    needs_compatibility: spec.needs_compatibility,
                    worker: spec.worker.as_ref().map(WorkerSpec::build),
                },
            );
        }
        db
    }

    /// The stock relation set.
    pub fn vanilla() -> Self {
        let standard = || Some(WorkerSpec::Standard { reciprocal: None });
        let reciprocal = |name: &str| {
            Some(WorkerSpec::Standard {
                reciprocal: Some(name.to_string()),
            })
        };
        let def = |name: &str, reflexive: bool, blood: bool, implied: bool, worker: Option<WorkerSpec>| {
            RelationDefSpec {
                name: name.to_string(),
                label: None,
                reflexive,
                family_by_blood: blood,
                implied,
                worker,
            }
        };
        let ext = |name: &str, inverse: Option<&str>, animal: bool, compat: bool| ExtendedDefSpec {
            name: name.to_string(),
            inverse: inverse.map(str::to_string),
            animal,
            needs_compatibility: compat,
            worker: None,
        };

        Self::from_set(&DefinitionSet {
            relations: vec![
                def(PARENT, false, true, false, reciprocal(CHILD)),
                def(CHILD, false, true, false, reciprocal(PARENT)),
                def("Sibling", true, true, true, None),
                def("Grandparent", false, true, true, None),
                def("Spouse", true, false, false, standard()),
                def("ExSpouse", true, false, false, standard()),
                def("Fiance", true, false, false, standard()),
                def("Lover", true, false, false, standard()),
                def("ExLover", true, false, false, standard()),
                def("Mentor", false, false, false, reciprocal("Apprentice")),
                def("Apprentice", false, false, false, reciprocal("Mentor")),
                def("Rival", false, false, false, standard()),
                def("Bond", false, false, false, standard()),
            ],
            extended: vec![
                ext("Spouse", Some("Spouse"), false, true),
                ext("Fiance", None, false, true),
                ext("Lover", None, false, true),
                ext("Bond", None, true, false),
            ],
        })
    }

    pub fn all(&self) -> &[RelationDef] {
        &self.defs
    }

    pub fn named(&self, name: &str) -> Option<&RelationDef> {
        self.by_name.get(name).map(|&index| &self.defs[index])
    }

    pub fn extended(&self, name: &str) -> Option<&ExtendedRelationDef> {
        self.extended.get(name)
    }
}
