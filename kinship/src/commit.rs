//! Writing the finished graph into the host
//!
//! A commit runs in fixed phases: collect every pawn involved, clear their
//! stored relations, write the intents, complete sibling groups, fix hidden
//! parent ages, write the parent/child links, then report the hidden and
//! temporary pawns the caller must register with the world.
//!
//! Nothing in a commit is fatal. A relation that cannot be written is logged
//! and left out.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::components::{DirectRelation, PawnId, PawnKind, PawnRef};
use crate::config::CompatibilityConfig;
use crate::defs::{CHILD, PARENT};
use crate::engine::Engine;
use crate::error::{Endpoint, KinshipError, Result};
use crate::grouping::ParentChildGroups;
use crate::intent::RelationshipList;
use crate::registry::RelationshipTypeRegistry;
use crate::roster::{Individual, Roster};
use crate::synthesis::SyntheticPawnFactory;

/// Outcome of one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Relations written, intents and parent/child links together.
    pub created: usize,
    /// Relations left out because they could not be written.
    pub skipped: usize,
    /// Parents created to complete sibling groups.
    pub synthesized: Vec<PawnId>,
    /// Hidden and temporary pawns the caller should register as world pawns.
    pub world_pawns: Vec<PawnId>,
}

pub struct RelationshipCommitter {
    registry: Arc<RelationshipTypeRegistry>,
    config: CompatibilityConfig,
    /// Spare id numbers offered to compatibility-sensitive targets.
    compatibility_pool: Vec<u64>,
}

impl RelationshipCommitter {
    pub fn new(registry: Arc<RelationshipTypeRegistry>, config: CompatibilityConfig) -> Self {
        Self {
            registry,
            config,
            compatibility_pool: Vec::new(),
        }
    }

    pub fn pool(&self) -> &[u64] {
        &self.compatibility_pool
    }

    fn fill_pool<E: Engine>(&mut self, engine: &mut E, relationship_count: usize) {
        let size = self.config.pool_size(relationship_count);
        while self.compatibility_pool.len() < size {
            self.compatibility_pool.push(engine.next_id_number());
        }
    }

    pub fn commit<E: Engine>(
        &mut self,
        engine: &mut E,
        roster: &mut Roster,
        relationships: &RelationshipList,
        groups: &mut ParentChildGroups,
        factory: &mut SyntheticPawnFactory,
    ) -> CommitReport {
        let mut report = CommitReport::default();
        self.fill_pool(engine, relationships.len());

        // Every pawn any intent or group touches.
        let mut involved: Vec<PawnId> = Vec::new();
        for relationship in relationships {
            for id in [relationship.source, relationship.target] {
                if !involved.contains(&id) {
                    involved.push(id);
                }
            }
        }
        for id in groups.pawns() {
            if !involved.contains(&id) {
                involved.push(id);
            }
        }

        for id in &involved {
            match roster.get(*id).and_then(|individual| find_matching(&*engine, individual)) {
                Some(pawn) => engine.clear_relations(pawn),
                None => debug!(pawn = %id, "Nothing to clear for unresolved pawn"),
            }
        }

        for relationship in relationships {
            self.add_logged(engine, roster, &relationship.def, relationship.source, relationship.target, &mut report);
        }

        report.synthesized = groups.ensure_parent_completeness(roster, factory, engine);

        // Ages must be right before the links are written.
        for id in groups.validate_ages(roster, factory) {
            let Some(individual) = roster.get(id) else {
                continue;
            };
            match find_matching(&*engine, individual) {
                Some(pawn) => engine.set_ages(pawn, individual.biological_age(), individual.chronological_age()),
                None => warn!(pawn = %id, "Could not write adjusted age, pawn not found"),
            }
        }

        let mut links = Vec::new();
        for group in groups.iter() {
            for parent in group.parents() {
                for child in group.children() {
                    links.push((*parent, *child));
                }
            }
        }
        for (parent, child) in links {
            self.add_logged(engine, roster, PARENT, parent, child, &mut report);
            self.add_logged(engine, roster, CHILD, child, parent, &mut report);
        }

        for id in groups.pawns().into_iter().chain(
            relationships
                .iter()
                .flat_map(|relationship| [relationship.source, relationship.target]),
        ) {
            let hidden = roster.get(id).is_some_and(Individual::is_hidden);
            if hidden && !report.world_pawns.contains(&id) {
                report.world_pawns.push(id);
            }
        }

        info!(
            created = report.created,
            skipped = report.skipped,
            synthesized = report.synthesized.len(),
            world_pawns = report.world_pawns.len(),
            "Committed relationships"
        );
        report
    }

    fn add_logged<E: Engine>(
        &mut self,
        engine: &mut E,
        roster: &Roster,
        def: &str,
        source: PawnId,
        target: PawnId,
        report: &mut CommitReport,
    ) {
        match self.add_relationship(engine, roster, def, source, target) {
            Ok(()) => report.created += 1,
            Err(err) => {
                warn!(def, source = %source, target = %target, error = %err, "Skipping relationship");
                report.skipped += 1;
            }
        }
    }

    /// Make `source` be `target`'s `def` in host storage.
    pub fn add_relationship<E: Engine>(
        &mut self,
        engine: &mut E,
        roster: &Roster,
        def: &str,
        source: PawnId,
        target: PawnId,
    ) -> Result<()> {
        let relation = self
            .registry
            .def(def)
            .ok_or_else(|| KinshipError::UnknownDefinition(def.to_string()))?;
        let from = resolve(&*engine, roster, source, Endpoint::Source);
        let to = resolve(&*engine, roster, target, Endpoint::Target);
        let (from, to) = (from?, to?);

        engine.add_direct_relation(to, DirectRelation::new(def, from));
        engine.add_known_by(from, to);
        if relation.reflexive {
            engine.add_direct_relation(from, DirectRelation::new(def, to));
            engine.add_known_by(to, from);
        }

        if self.registry.needs_compatibility(def) {
            self.improve_compatibility(engine, from, to);
        }
        Ok(())
    }

    /// Swap the target's id number for the pooled one the source likes best,
    /// if any beats the current one. The old number goes back in the pool.
    fn improve_compatibility<E: Engine>(&mut self, engine: &mut E, source: PawnRef, target: PawnRef) {
        let Some(original) = engine.id_number(target) else {
            return;
        };
        let mut best = original;
        let mut best_score = engine.compatibility_offset(source, original);
        for &candidate in &self.compatibility_pool {
            let score = engine.compatibility_offset(source, candidate);
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }
        if best != original {
            engine.set_id_number(target, best);
            self.compatibility_pool.retain(|&number| number != best);
            self.compatibility_pool.push(original);
            debug!(original, replacement = best, score = best_score, "Improved pair compatibility");
        }
    }
}

/// The authoritative host record for a working copy. Hidden pawns are
/// detached copies, so they resolve through the world pawn registry.
fn find_matching<E: Engine + ?Sized>(engine: &E, individual: &Individual) -> Option<PawnRef> {
    match individual.kind {
        PawnKind::Hidden => engine.find_world_pawn(individual.id),
        _ => Some(individual.pawn).filter(|pawn| engine.contains(*pawn)),
    }
}

fn resolve<E: Engine + ?Sized>(engine: &E, roster: &Roster, id: PawnId, endpoint: Endpoint) -> Result<PawnRef> {
    let individual = roster.get(id).ok_or(KinshipError::UnknownPawn(id))?;
    find_matching(engine, individual).ok_or(KinshipError::Unresolved {
        id,
        kind: individual.kind,
        endpoint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Gender;
    use crate::config::ParentAgeConfig;
    use crate::defs::DefDatabase;
    use crate::engine::{RelationStore, WorldRegistry};
    use crate::grouping::ParentChildGroup;
    use crate::intent::Relationship;
    use crate::world::{PawnSpec, SimulationWorld};

    struct Fixture {
        world: SimulationWorld,
        roster: Roster,
        relationships: RelationshipList,
        groups: ParentChildGroups,
        factory: SyntheticPawnFactory,
        committer: RelationshipCommitter,
    }

    impl Fixture {
        fn new() -> Self {
            let mut world = SimulationWorld::with_seed(21);
            let registry = Arc::new(RelationshipTypeRegistry::new(DefDatabase::vanilla(), &mut world));
            Self {
                world,
                roster: Roster::new(),
                relationships: RelationshipList::new(),
                groups: ParentChildGroups::new(),
                factory: SyntheticPawnFactory::with_seed(ParentAgeConfig::default(), 21),
                committer: RelationshipCommitter::new(registry, CompatibilityConfig::default()),
            }
        }

        fn colonist(&mut self, name: &str, gender: Gender, age: u32) -> (PawnId, PawnRef) {
            let pawn = self.world.spawn_pawn(PawnSpec::new(name, gender, age));
            let individual = Individual::load(&self.world, pawn, PawnKind::Colonist).unwrap();
            (self.roster.add_member(individual), pawn)
        }

        /// A registered world pawn, loaded the way the editor sees it.
        fn hidden(&mut self, name: &str, gender: Gender, age: u32) -> (PawnId, PawnRef) {
            let original = self.world.spawn_world_pawn(PawnSpec::new(name, gender, age));
            let copy = self.world.snapshot_copy(original).unwrap();
            let individual = Individual::load(&self.world, copy, PawnKind::Hidden).unwrap();
            (self.roster.add_member(individual), original)
        }

        fn intend(&mut self, def: &str, source: PawnId, target: PawnId) {
            self.relationships.add(Relationship::new(def, None, source, target));
        }

        fn commit(&mut self) -> CommitReport {
            self.committer.commit(
                &mut self.world,
                &mut self.roster,
                &self.relationships,
                &mut self.groups,
                &mut self.factory,
            )
        }
    }

    #[test]
    fn test_reflexive_intent_written_both_ways() {
        let mut fx = Fixture::new();
        let (a, a_ref) = fx.colonist("A", Gender::Male, 30);
        let (b, b_ref) = fx.colonist("B", Gender::Female, 29);
        fx.intend("Lover", a, b);

        let report = fx.commit();

        assert_eq!(report.created, 1);
        assert_eq!(fx.world.relations_between(b_ref, a_ref), vec!["Lover".to_string()]);
        assert_eq!(fx.world.relations_between(a_ref, b_ref), vec!["Lover".to_string()]);
    }

    #[test]
    fn test_one_sided_intent() {
        let mut fx = Fixture::new();
        let (a, a_ref) = fx.colonist("A", Gender::Male, 30);
        let (b, b_ref) = fx.colonist("B", Gender::Female, 29);
        fx.intend("Rival", a, b);

        fx.commit();

        assert_eq!(fx.world.relations_between(b_ref, a_ref), vec!["Rival".to_string()]);
        assert!(fx.world.relations_between(a_ref, b_ref).is_empty());
    }

    #[test]
    fn test_existing_relations_cleared_first() {
        let mut fx = Fixture::new();
        let (a, a_ref) = fx.colonist("A", Gender::Male, 30);
        let (b, b_ref) = fx.colonist("B", Gender::Female, 29);
        fx.world.add_direct_relation(b_ref, DirectRelation::new("ExLover", a_ref));
        fx.world.add_known_by(a_ref, b_ref);
        fx.intend("Rival", a, b);

        fx.commit();

        assert_eq!(fx.world.relations_between(b_ref, a_ref), vec!["Rival".to_string()]);
    }

    #[test]
    fn test_unresolved_source_is_skipped() {
        let mut fx = Fixture::new();
        let (a, a_ref) = fx.colonist("A", Gender::Male, 30);
        let (b, b_ref) = fx.colonist("B", Gender::Female, 29);
        let (c, c_ref) = fx.colonist("C", Gender::Female, 31);
        fx.intend("Rival", a, b);
        fx.intend("Rival", c, b);
        fx.world.despawn(a_ref);

        let report = fx.commit();

        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(fx.world.direct_relations(b_ref).len(), 1);
        assert_eq!(fx.world.relations_between(b_ref, c_ref), vec!["Rival".to_string()]);
        assert!(fx.world.relations_between(b_ref, a_ref).is_empty());
    }

    #[test]
    fn test_hidden_pawn_resolves_to_world_pawn() {
        let mut fx = Fixture::new();
        let (a, a_ref) = fx.colonist("A", Gender::Male, 30);
        let (old, old_ref) = fx.hidden("Old", Gender::Female, 70);
        fx.intend("Mentor", old, a);

        let report = fx.commit();

        assert_eq!(report.created, 1);
        assert_eq!(fx.world.relations_between(a_ref, old_ref), vec!["Mentor".to_string()]);
        assert_eq!(report.world_pawns, vec![old]);
        let copy = fx.roster.get(old).unwrap().pawn;
        assert!(fx.world.direct_relations(copy).is_empty());
    }

    #[test]
    fn test_sibling_group_gets_parents_and_links() {
        let mut fx = Fixture::new();
        let (a, a_ref) = fx.colonist("A", Gender::Male, 20);
        let (b, b_ref) = fx.colonist("B", Gender::Female, 24);
        fx.groups = ParentChildGroups::from_groups(vec![ParentChildGroup::with_members(
            Vec::<PawnId>::new(),
            [a, b],
        )]);

        let report = fx.commit();

        assert_eq!(report.synthesized.len(), 2);
        assert_eq!(report.created, 8);
        assert_eq!(report.world_pawns.len(), 2);
        for parent in &report.synthesized {
            let parent = fx.roster.get(*parent).unwrap();
            assert!(parent.biological_age() >= 24 + 13);
            assert_eq!(fx.world.relations_between(a_ref, parent.pawn), vec!["Parent".to_string()]);
            assert_eq!(fx.world.relations_between(b_ref, parent.pawn), vec!["Parent".to_string()]);
            assert_eq!(fx.world.relations_between(parent.pawn, a_ref), vec!["Child".to_string()]);
        }
    }

    #[test]
    fn test_young_hidden_parent_aged_in_host() {
        let mut fx = Fixture::new();
        let (child, _) = fx.colonist("Kid", Gender::Male, 25);
        let (dad, dad_ref) = fx.hidden("Dad", Gender::Male, 30);
        fx.groups = ParentChildGroups::from_groups(vec![ParentChildGroup::with_members([dad], [child])]);

        let report = fx.commit();

        assert!(report.synthesized.is_empty());
        let age = fx.world.age(dad_ref).unwrap();
        assert!(age.biological >= 25 + 13);
        assert_eq!(age.biological, fx.roster.get(dad).unwrap().biological_age());
        assert_eq!(report.world_pawns, vec![dad]);
    }

    #[test]
    fn test_compatibility_pool_swaps_target_number() {
        let mut fx = Fixture::new();
        let (a, a_ref) = fx.colonist("A", Gender::Male, 30);
        let (b, b_ref) = fx.colonist("B", Gender::Female, 29);
        fx.intend("Spouse", a, b);

        fx.commit();

        let pool = fx.committer.pool().to_vec();
        assert_eq!(pool.len(), 50);
        let number = fx.world.id_number(b_ref).unwrap();
        let best = fx.world.compatibility_offset(a_ref, number);
        assert!(pool.iter().all(|&n| fx.world.compatibility_offset(a_ref, n) <= best));
        assert!(!pool.contains(&number));
    }

    #[test]
    fn test_pool_drawn_from_host_ids() {
        let mut fx = Fixture::new();
        let before = fx.world.next_id_number();
        fx.commit();
        assert_eq!(fx.committer.pool().len(), 50);
        assert!(fx.committer.pool().iter().all(|&n| n > before));
    }
}
