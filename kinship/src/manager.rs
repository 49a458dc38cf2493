//! Relationship editing session
//!
//! Owns the working state the editor manipulates between opening and
//! committing: the roster, the intents, the parent/child groups and the
//! palette of temporary pawns.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::commit::{CommitReport, RelationshipCommitter};
use crate::components::{PawnId, PawnKind, PawnRef};
use crate::config::KinshipConfig;
use crate::defs::{CHILD, PARENT};
use crate::engine::Engine;
use crate::grouping::{self, ParentChildGroup, ParentChildGroups};
use crate::intent::{Relationship, RelationshipList};
use crate::registry::RelationshipTypeRegistry;
use crate::roster::{Individual, Roster};
use crate::synthesis::SyntheticPawnFactory;

pub struct RelationshipManager {
    registry: Arc<RelationshipTypeRegistry>,
    relationships: RelationshipList,
    groups: ParentChildGroups,
    roster: Roster,
    factory: SyntheticPawnFactory,
    committer: RelationshipCommitter,
    /// Placeholder pawns offered by the palette, not yet in the roster.
    temporary_pawns: Vec<PawnId>,
    config: KinshipConfig,
    dirty: bool,
}

impl RelationshipManager {
    /// Open a session over the starting pawns, picking up the groups and
    /// relations they already have.
    pub fn new<E: Engine>(
        registry: Arc<RelationshipTypeRegistry>,
        config: KinshipConfig,
        engine: &mut E,
        pawns: Vec<Individual>,
    ) -> Self {
        let factory = SyntheticPawnFactory::new(config.parent_age);
        Self::with_factory(registry, config, engine, pawns, factory)
    }

    pub fn with_factory<E: Engine>(
        registry: Arc<RelationshipTypeRegistry>,
        config: KinshipConfig,
        engine: &mut E,
        pawns: Vec<Individual>,
        factory: SyntheticPawnFactory,
    ) -> Self {
        let mut roster = Roster::new();
        for pawn in pawns {
            roster.add_member(pawn);
        }
        let groups = ParentChildGroups::from_groups(grouping::from_existing_graph(&roster, &*engine));
        let committer = RelationshipCommitter::new(Arc::clone(&registry), config.compatibility);

        let mut manager = Self {
            registry,
            relationships: RelationshipList::new(),
            groups,
            roster,
            factory,
            committer,
            temporary_pawns: Vec::new(),
            config,
            dirty: false,
        };
        manager.seed_relationships(&*engine);

        for gender in manager.config.palette_genders.0.clone() {
            match manager
                .factory
                .create_temporary_pawn(engine, &mut manager.roster, Some(gender))
            {
                Ok(id) => manager.temporary_pawns.push(id),
                Err(err) => warn!(?gender, error = %err, "Could not create palette pawn"),
            }
        }

        // Indices are handed out only now so they count up from 1 in
        // display order.
        manager.reassign_indices();

        info!(
            pawns = manager.roster.members().count(),
            relationships = manager.relationships.len(),
            groups = manager.groups.len(),
            "Relationship session opened"
        );
        manager
    }

    /// Record every stored relation between two starting pawns as an intent.
    /// Blood and implied relations are left to the groups.
    fn seed_relationships<E: Engine + ?Sized>(&mut self, engine: &E) {
        let members: Vec<(PawnId, PawnRef)> = self.roster.members().map(|m| (m.id, m.pawn)).collect();
        for &(id, pawn) in &members {
            for &(other_id, other) in &members {
                if id == other_id {
                    continue;
                }
                // Each entry reads "other is pawn's def".
                for def in engine.relations_between(pawn, other) {
                    let Some(relation) = self.registry.def(&def) else {
                        debug!(def = %def, "Ignoring relation with no definition");
                        continue;
                    };
                    if relation.family_by_blood || relation.implied {
                        continue;
                    }
                    if relation.reflexive && self.relationships.contains(&def, id, other_id) {
                        continue;
                    }
                    let inverse = self.registry.inverse_of(&def).map(str::to_string);
                    self.relationships.add(Relationship::new(def, inverse, other_id, id));
                }
            }
        }
    }

    pub fn reassign_indices(&mut self) {
        self.factory
            .reassign_indices(&mut self.roster, &self.groups, &self.relationships);
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn allowed_relationships(&self) -> &[String] {
        self.registry.allowed_types()
    }

    pub fn find_inverse(&self, def: &str) -> Option<&str> {
        self.registry.inverse_of(def)
    }

    pub fn registry(&self) -> &RelationshipTypeRegistry {
        &self.registry
    }

    pub fn relationships(&self) -> &RelationshipList {
        &self.relationships
    }

    pub fn groups(&self) -> &ParentChildGroups {
        &self.groups
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn parent_child_pawns(&self) -> impl Iterator<Item = &Individual> {
        self.roster.members()
    }

    pub fn colony_and_world_pawns(&self) -> impl Iterator<Item = &Individual> {
        self.roster.colony_and_world_pawns()
    }

    pub fn hidden_pawns(&self) -> impl Iterator<Item = &Individual> {
        self.roster.hidden_pawns()
    }

    pub fn temporary_pawns(&self) -> impl Iterator<Item = &Individual> {
        self.temporary_pawns.iter().filter_map(|id| self.roster.get(*id))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Declare that `source` is `target`'s `def`. Types without a creation
    /// routine, and pawns outside the session, are dropped. Parent and Child
    /// go to the groups rather than the intent list.
    pub fn add_relationship(&mut self, def: &str, source: PawnId, target: PawnId) -> bool {
        if let Err(err) = self.registry.require_worker(def) {
            debug!(error = %err, "Dropping relationship");
            return false;
        }
        if !self.roster.contains(source) || !self.roster.contains(target) {
            warn!(def, source = %source, target = %target, "Relationship refers to a pawn outside the session");
            return false;
        }

        let inverse = self.registry.inverse_of(def).map(str::to_string);
        let relationship = Relationship::new(def, inverse, source, target);
        let added = if def == PARENT || def == CHILD {
            self.groups.merge(grouping::from_intents([&relationship]))
        } else {
            self.relationships.add(relationship)
        };
        if added {
            self.dirty = true;
        }
        added
    }

    /// Add a batch of intents. Parent and Child intents are folded into the
    /// groups together.
    pub fn add_relationships(&mut self, relationships: Vec<Relationship>) {
        let (family, others): (Vec<Relationship>, Vec<Relationship>) = relationships
            .into_iter()
            .partition(|r| r.def == PARENT || r.def == CHILD);

        for relationship in others {
            self.add_relationship(&relationship.def, relationship.source, relationship.target);
        }
        if self.groups.merge(grouping::from_intents(&family)) {
            self.dirty = true;
        }
    }

    /// Stage removal of an intent. Takes effect on [`flush_deletions`](Self::flush_deletions)
    /// or at commit.
    pub fn delete_relationship(&mut self, def: &str, source: PawnId, target: PawnId) -> bool {
        let Some(relationship) = self.relationships.find(def, source, target).cloned() else {
            return false;
        };
        self.relationships.mark_for_deletion(relationship);
        self.dirty = true;
        true
    }

    pub fn flush_deletions(&mut self) -> usize {
        self.relationships.flush_deletions()
    }

    /// Remove a pawn from the session along with every intent and group
    /// membership referring to it.
    pub fn delete_pawn(&mut self, id: PawnId) -> bool {
        if !self.roster.contains(id) {
            return false;
        }
        let doomed: Vec<Relationship> = self.relationships.iter().filter(|r| r.involves(id)).cloned().collect();
        for relationship in doomed {
            self.relationships.mark_for_deletion(relationship);
        }
        self.groups.remove_pawn(id);
        let removed = self.flush_deletions();
        self.temporary_pawns.retain(|pawn| *pawn != id);
        self.roster.remove(id);
        self.dirty = true;
        debug!(pawn = %id, relationships = removed, "Deleted pawn");
        true
    }

    pub fn remove_group(&mut self, index: usize) -> Option<ParentChildGroup> {
        let removed = self.groups.remove(index);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Move the palette pawn at `index` into the session and put a fresh one
    /// of the same gender in its place.
    pub fn replace_temporary_pawn<E: Engine>(&mut self, index: usize, engine: &mut E) -> Option<PawnId> {
        let id = *self.temporary_pawns.get(index)?;
        let gender = self.roster.get(id).and_then(|pawn| pawn.gender);
        match self.factory.create_temporary_pawn(engine, &mut self.roster, gender) {
            Ok(replacement) => self.temporary_pawns[index] = replacement,
            Err(err) => {
                warn!(error = %err, "Could not replace palette pawn");
                return None;
            }
        }
        self.roster.enlist(id);
        self.dirty = true;
        Some(id)
    }

    /// Add a hidden or temporary pawn, numbering it if it has no index yet.
    pub fn add_hidden_pawn(&mut self, mut individual: Individual) -> PawnId {
        if individual.index.is_none() {
            individual.index = match individual.kind {
                PawnKind::Hidden => Some(self.factory.next_hidden_index()),
                PawnKind::Temporary => Some(self.factory.next_temporary_index()),
                _ => None,
            };
        }
        self.dirty = true;
        self.roster.add_member(individual)
    }

    pub fn add_visible_pawn(&mut self, individual: Individual) -> PawnId {
        self.dirty = true;
        self.roster.add_member(individual)
    }

    /// Drop all session state.
    pub fn clear(&mut self) {
        self.roster.clear();
        self.relationships.clear();
        self.groups.clear();
        self.temporary_pawns.clear();
        self.dirty = false;
    }

    /// Write the session into the host. Staged deletions are applied first.
    pub fn commit<E: Engine>(&mut self, engine: &mut E) -> CommitReport {
        self.flush_deletions();
        let report = self.committer.commit(
            engine,
            &mut self.roster,
            &self.relationships,
            &mut self.groups,
            &mut self.factory,
        );
        self.reassign_indices();
        self.dirty = false;
        report
    }
}
