//! Relationship intents - what the player asked for
//!
//! An intent `(def, source, target)` reads "source is target's def".

use tracing::debug;

use crate::components::PawnId;

#[derive(Debug, Clone)]
pub struct Relationship {
    pub def: String,
    /// What the target is to the source, if the type has a known inverse.
    pub inverse: Option<String>,
    pub source: PawnId,
    pub target: PawnId,
}

impl Relationship {
    pub fn new(def: impl Into<String>, inverse: Option<String>, source: PawnId, target: PawnId) -> Self {
        Self {
            def: def.into(),
            inverse,
            source,
            target,
        }
    }

    pub fn matches(&self, def: &str, source: PawnId, target: PawnId) -> bool {
        self.def == def && self.source == source && self.target == target
    }

    pub fn involves(&self, pawn: PawnId) -> bool {
        self.source == pawn || self.target == pawn
    }
}

// Identity is (def, source, target); the cached inverse does not count.
impl PartialEq for Relationship {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.def, other.source, other.target)
    }
}

impl Eq for Relationship {}

/// Ordered intent collection with staged deletion.
#[derive(Debug, Clone, Default)]
pub struct RelationshipList {
    relationships: Vec<Relationship>,
    pending_deletion: Vec<Relationship>,
}

impl RelationshipList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, leaving the list untouched, when the same
    /// (def, source, target) is already present.
    pub fn add(&mut self, relationship: Relationship) -> bool {
        if self.contains(&relationship.def, relationship.source, relationship.target) {
            debug!(
                def = %relationship.def,
                source = %relationship.source,
                target = %relationship.target,
                "Relationship already exists, not adding"
            );
            return false;
        }
        self.relationships.push(relationship);
        true
    }

    pub fn remove(&mut self, relationship: &Relationship) -> bool {
        let before = self.relationships.len();
        self.relationships.retain(|r| r != relationship);
        self.relationships.len() != before
    }

    pub fn find(&self, def: &str, source: PawnId, target: PawnId) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.matches(def, source, target))
    }

    /// Direction sensitive: `(def, a, b)` does not match `(def, b, a)`.
    pub fn contains(&self, def: &str, a: PawnId, b: PawnId) -> bool {
        self.find(def, a, b).is_some()
    }

    /// Stage a removal. Nothing changes until [`flush_deletions`](Self::flush_deletions).
    pub fn mark_for_deletion(&mut self, relationship: Relationship) {
        if !self.pending_deletion.contains(&relationship) {
            self.pending_deletion.push(relationship);
        }
    }

    /// Apply every staged removal. Returns how many intents were removed.
    pub fn flush_deletions(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_deletion);
        pending.iter().filter(|r| self.remove(r)).count()
    }

    pub fn pending_deletions(&self) -> &[Relationship] {
        &self.pending_deletion
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Relationship> {
        self.relationships.iter()
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn clear(&mut self) {
        self.relationships.clear();
        self.pending_deletion.clear();
    }
}

impl<'a> IntoIterator for &'a RelationshipList {
    type Item = &'a Relationship;
    type IntoIter = std::slice::Iter<'a, Relationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
