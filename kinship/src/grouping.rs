//! Parent/child groups
//!
//! A group is one family unit: up to two parents and the children they share.
//! Groups are derived, either from Parent links already stored on the host or
//! from Parent/Child intents, and always pass through [`normalize`] so that two
//! declarations naming the same parents end up as one family.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::components::{Gender, PawnId};
use crate::defs::{CHILD, PARENT};
use crate::engine::{Engine, PawnGenerator, RelationStore};
use crate::intent::Relationship;
use crate::roster::Roster;
use crate::synthesis::{anchor_child, SyntheticPawnFactory};

/// A child has at most a mother and a father.
const MAX_PARENTS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentChildGroup {
    parents: Vec<PawnId>,
    children: Vec<PawnId>,
}

impl ParentChildGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(
        parents: impl IntoIterator<Item = PawnId>,
        children: impl IntoIterator<Item = PawnId>,
    ) -> Self {
        let mut group = Self::new();
        for parent in parents {
            group.add_parent(parent);
        }
        for child in children {
            group.add_child(child);
        }
        group
    }

    pub fn parents(&self) -> &[PawnId] {
        &self.parents
    }

    pub fn children(&self) -> &[PawnId] {
        &self.children
    }

    pub fn add_parent(&mut self, id: PawnId) -> bool {
        if self.parents.contains(&id) {
            return false;
        }
        self.parents.push(id);
        true
    }

    pub fn add_child(&mut self, id: PawnId) -> bool {
        if self.children.contains(&id) {
            return false;
        }
        self.children.push(id);
        true
    }

    /// Drop a pawn from either side. Returns true if it was present.
    pub fn remove_pawn(&mut self, id: PawnId) -> bool {
        let before = self.parents.len() + self.children.len();
        self.parents.retain(|p| *p != id);
        self.children.retain(|c| *c != id);
        before != self.parents.len() + self.children.len()
    }

    pub fn contains(&self, id: PawnId) -> bool {
        self.parents.contains(&id) || self.children.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.children.is_empty()
    }

    pub fn is_sibling_group(&self) -> bool {
        self.children.len() >= 2
    }

    fn sort_parents(&mut self) {
        self.parents.sort();
    }
}

impl std::fmt::Display for ParentChildGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |ids: &[PawnId]| {
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "parents: [{}], children: [{}]",
            join(&self.parents),
            join(&self.children)
        )
    }
}

// ============================================================================
// Derivation
// ============================================================================

/// One provisional group per child, keyed in first-seen order.
#[derive(Default)]
struct ProvisionalGroups {
    groups: Vec<ParentChildGroup>,
    by_child: HashMap<PawnId, usize>,
}

impl ProvisionalGroups {
    fn add(&mut self, parent: PawnId, child: PawnId) {
        let index = match self.by_child.get(&child) {
            Some(&index) => index,
            None => {
                self.by_child.insert(child, self.groups.len());
                self.groups.push(ParentChildGroup {
                    parents: Vec::new(),
                    children: vec![child],
                });
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[index];
        if group.parents.len() >= MAX_PARENTS && !group.parents.contains(&parent) {
            warn!(parent = %parent, child = %child, "Could not add parent, child already has two parents");
            return;
        }
        group.add_parent(parent);
    }
}

/// Build groups from Parent links already stored on the roster members.
/// Links to pawns outside the roster are ignored.
pub fn from_existing_graph<H>(roster: &Roster, host: &H) -> Vec<ParentChildGroup>
where
    H: RelationStore + PawnGenerator + ?Sized,
{
    let mut provisional = ProvisionalGroups::default();
    for child in roster.members() {
        for relation in host.direct_relations(child.pawn) {
            if relation.def != PARENT {
                continue;
            }
            match host.snapshot(relation.other).map(|s| s.id) {
                Some(parent) if roster.members().any(|m| m.id == parent) => {
                    provisional.add(parent, child.id);
                }
                _ => warn!(child = %child.id, "Parent of roster pawn is not in the roster"),
            }
        }
    }
    normalize(provisional.groups)
}

/// Build groups from Parent and Child intents. Other intents are skipped.
pub fn from_intents<'a>(intents: impl IntoIterator<Item = &'a Relationship>) -> Vec<ParentChildGroup> {
    let mut provisional = ProvisionalGroups::default();
    for intent in intents {
        let (parent, child) = if intent.def == PARENT {
            (intent.source, intent.target)
        } else if intent.def == CHILD {
            (intent.target, intent.source)
        } else {
            continue;
        };
        if parent == child {
            warn!(pawn = %parent, "Could not add relationship, a pawn cannot be its own parent");
            continue;
        }
        provisional.add(parent, child);
    }
    normalize(provisional.groups)
}

/// Sort parents, then merge groups with identical parent sets into the first
/// one seen. Parentless groups share the empty set and merge too. Empty
/// groups are dropped.
pub fn normalize(groups: Vec<ParentChildGroup>) -> Vec<ParentChildGroup> {
    let mut result: Vec<ParentChildGroup> = Vec::with_capacity(groups.len());
    let mut by_parents: HashMap<Vec<PawnId>, usize> = HashMap::new();

    for mut group in groups {
        if group.is_empty() {
            continue;
        }
        group.sort_parents();
        match by_parents.get(&group.parents) {
            Some(&index) => {
                debug!(duplicate = %group, existing = %result[index], "Merging duplicate group");
                for child in group.children {
                    result[index].add_child(child);
                }
            }
            None => {
                by_parents.insert(group.parents.clone(), result.len());
                result.push(group);
            }
        }
    }
    result
}

// ============================================================================
// Group collection
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ParentChildGroups {
    groups: Vec<ParentChildGroup>,
}

impl ParentChildGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: Vec<ParentChildGroup>) -> Self {
        Self {
            groups: normalize(groups),
        }
    }

    /// Fold newly derived groups into the current set one parent link at a
    /// time, so each child keeps a single family. Groups without parents
    /// carry no links and add nothing. Returns true if anything changed.
    pub fn merge(&mut self, groups: Vec<ParentChildGroup>) -> bool {
        let mut changed = false;
        for group in normalize(groups) {
            for child in &group.children {
                for parent in &group.parents {
                    changed |= self.add_link(*parent, *child);
                }
            }
        }
        changed
    }

    /// Make `parent` a parent of `child`. A child already in a family moves
    /// to the family of its old parents plus the new one; its siblings stay
    /// where they are. A third parent is refused.
    pub fn add_link(&mut self, parent: PawnId, child: PawnId) -> bool {
        if parent == child {
            warn!(pawn = %parent, "Could not add relationship, a pawn cannot be its own parent");
            return false;
        }

        let mut parents = vec![parent];
        if let Some(index) = self.groups.iter().position(|g| g.children.contains(&child)) {
            let current = &mut self.groups[index];
            if current.parents.contains(&parent) {
                return false;
            }
            if current.parents.len() >= MAX_PARENTS {
                warn!(parent = %parent, child = %child, "Could not add parent, child already has two parents");
                return false;
            }
            parents.extend(current.parents.iter().copied());
            current.children.retain(|c| *c != child);
            if current.children.is_empty() {
                self.groups.remove(index);
            }
        }

        let mut combined = std::mem::take(&mut self.groups);
        combined.push(ParentChildGroup::with_members(parents, [child]));
        self.groups = normalize(combined);
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParentChildGroup> {
        self.groups.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ParentChildGroup> {
        self.groups.get(index)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn remove(&mut self, index: usize) -> Option<ParentChildGroup> {
        if index < self.groups.len() {
            Some(self.groups.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Take a pawn out of every group. Groups whose parent sets now match
    /// are merged and empty ones dropped.
    pub fn remove_pawn(&mut self, id: PawnId) {
        let mut groups = std::mem::take(&mut self.groups);
        for group in &mut groups {
            group.remove_pawn(id);
        }
        self.groups = normalize(groups);
    }

    /// Every pawn in any group, parents before children, first-seen order.
    pub fn pawns(&self) -> Vec<PawnId> {
        let mut pawns = Vec::new();
        for group in &self.groups {
            for id in group.parents.iter().chain(group.children.iter()) {
                if !pawns.contains(id) {
                    pawns.push(*id);
                }
            }
        }
        pawns
    }

    /// Give every sibling group two parents, synthesizing the missing ones.
    /// Groups with a single child are left as they are. Returns the ids of
    /// the parents created.
    pub fn ensure_parent_completeness<E: Engine>(
        &mut self,
        roster: &mut Roster,
        factory: &mut SyntheticPawnFactory,
        engine: &mut E,
    ) -> Vec<PawnId> {
        let mut created = Vec::new();
        for group in &mut self.groups {
            if !group.is_sibling_group() {
                continue;
            }
            let needed: Vec<Gender> = match group.parents.as_slice() {
                [] => vec![Gender::Female, Gender::Male],
                [only] => {
                    let existing = roster.get(*only).and_then(|p| p.gender);
                    vec![existing.map_or(Gender::Male, Gender::opposite)]
                }
                _ => continue,
            };
            let children = group.children.clone();
            for gender in needed {
                match factory.create_parent(engine, roster, Some(gender), &children) {
                    Ok(parent) => {
                        group.add_parent(parent);
                        created.push(parent);
                    }
                    Err(err) => warn!(group = %group, error = %err, "Could not create missing parent"),
                }
            }
            group.sort_parents();
        }
        created
    }

    /// Push hidden parents that are implausibly young for their oldest child
    /// back into the valid parent age window. Returns the ids whose age changed.
    pub fn validate_ages(&self, roster: &mut Roster, factory: &mut SyntheticPawnFactory) -> Vec<PawnId> {
        let mut changed = Vec::new();
        for group in &self.groups {
            let Some(anchor) = anchor_child(roster, &group.children).cloned() else {
                continue;
            };
            for parent_id in &group.parents {
                let Some(parent) = roster.get_mut(*parent_id) else {
                    continue;
                };
                if !parent.is_hidden() {
                    continue;
                }
                let valid = factory.valid_parent_age(parent, &anchor);
                if valid != parent.biological_age() {
                    debug!(
                        parent = %parent.id,
                        from = parent.biological_age(),
                        to = valid,
                        "Adjusting hidden parent age"
                    );
                    parent.set_biological_age(valid);
                    changed.push(parent.id);
                }
            }
        }
        changed
    }
}

impl<'a> IntoIterator for &'a ParentChildGroups {
    type Item = &'a ParentChildGroup;
    type IntoIter = std::slice::Iter<'a, ParentChildGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DirectRelation, PawnKind};
    use crate::config::ParentAgeConfig;
    use crate::roster::tests::individual;
    use crate::roster::Individual;
    use crate::world::{PawnSpec, SimulationWorld};

    fn ids(raw: &[u64]) -> Vec<PawnId> {
        raw.iter().map(|id| PawnId(*id)).collect()
    }

    fn group(parents: &[u64], children: &[u64]) -> ParentChildGroup {
        ParentChildGroup::with_members(ids(parents), ids(children))
    }

    #[test]
    fn test_shared_parent_intents_make_one_group() {
        let intents = vec![
            Relationship::new(PARENT, None, PawnId(1), PawnId(10)),
            Relationship::new(PARENT, None, PawnId(1), PawnId(11)),
        ];
        let groups = from_intents(&intents);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].parents(), ids(&[1]).as_slice());
        assert_eq!(groups[0].children(), ids(&[10, 11]).as_slice());
    }

    #[test]
    fn test_child_intents_normalized() {
        let intents = vec![
            Relationship::new(CHILD, None, PawnId(10), PawnId(2)),
            Relationship::new(PARENT, None, PawnId(1), PawnId(10)),
            Relationship::new("Spouse", None, PawnId(1), PawnId(2)),
        ];
        let groups = from_intents(&intents);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].parents(), ids(&[1, 2]).as_slice());
        assert_eq!(groups[0].children(), ids(&[10]).as_slice());
    }

    #[test]
    fn test_normalize_merges_regardless_of_parent_order() {
        let groups = normalize(vec![group(&[2, 1], &[10]), group(&[1, 2], &[11, 10]), group(&[3], &[12])]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].parents(), ids(&[1, 2]).as_slice());
        assert_eq!(groups[0].children(), ids(&[10, 11]).as_slice());
        assert_eq!(groups[1].parents(), ids(&[3]).as_slice());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let input = vec![
            group(&[5, 4], &[1]),
            group(&[4, 5], &[2]),
            group(&[], &[3, 6]),
            group(&[], &[7, 8]),
            group(&[9], &[1]),
            group(&[], &[]),
        ];
        let once = normalize(input);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_parentless_groups_merge() {
        let groups = normalize(vec![group(&[], &[1, 2]), group(&[], &[3, 4])]);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].parents().is_empty());
        assert_eq!(groups[0].children(), ids(&[1, 2, 3, 4]).as_slice());
    }

    #[test]
    fn test_third_parent_intent_refused() {
        let intents = vec![
            Relationship::new(PARENT, None, PawnId(1), PawnId(10)),
            Relationship::new(PARENT, None, PawnId(2), PawnId(10)),
            Relationship::new(PARENT, None, PawnId(3), PawnId(10)),
            Relationship::new(CHILD, None, PawnId(10), PawnId(1)),
        ];
        let groups = from_intents(&intents);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].parents(), ids(&[1, 2]).as_slice());
    }

    #[test]
    fn test_add_link_moves_child_to_combined_family() {
        let mut groups = ParentChildGroups::from_groups(vec![group(&[1], &[10, 11])]);

        assert!(groups.add_link(PawnId(2), PawnId(10)));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups.get(0).unwrap().parents(), ids(&[1]).as_slice());
        assert_eq!(groups.get(0).unwrap().children(), ids(&[11]).as_slice());
        assert_eq!(groups.get(1).unwrap().parents(), ids(&[1, 2]).as_slice());
        assert_eq!(groups.get(1).unwrap().children(), ids(&[10]).as_slice());

        // The sibling joins the same family rather than starting another.
        assert!(groups.add_link(PawnId(2), PawnId(11)));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.get(0).unwrap().children(), ids(&[10, 11]).as_slice());

        assert!(!groups.add_link(PawnId(1), PawnId(10)));
        assert!(!groups.add_link(PawnId(3), PawnId(10)));
        assert!(!groups.add_link(PawnId(10), PawnId(10)));
        assert_eq!(groups.get(0).unwrap().parents(), ids(&[1, 2]).as_slice());
    }

    #[test]
    fn test_merge_reports_change() {
        let mut groups = ParentChildGroups::from_groups(vec![group(&[1], &[10])]);
        assert!(!groups.merge(vec![group(&[1], &[10])]));
        assert!(!groups.merge(Vec::new()));
        assert!(groups.merge(vec![group(&[1], &[11])]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.get(0).unwrap().children(), ids(&[10, 11]).as_slice());
    }

    #[test]
    fn test_remove_pawn_drops_empty_groups() {
        let mut groups = ParentChildGroups::from_groups(vec![group(&[1], &[2]), group(&[3], &[4, 5])]);
        groups.remove_pawn(PawnId(1));
        assert_eq!(groups.len(), 2);
        groups.remove_pawn(PawnId(2));
        assert_eq!(groups.len(), 1);
        assert!(groups.iter().all(|g| !g.contains(PawnId(2))));
    }

    #[test]
    fn test_from_existing_graph() {
        let mut world = SimulationWorld::with_seed(5);
        let mother = world.spawn_pawn(PawnSpec::new("Mother", Gender::Female, 50));
        let father = world.spawn_pawn(PawnSpec::new("Father", Gender::Male, 52));
        let a = world.spawn_pawn(PawnSpec::new("A", Gender::Male, 20));
        let b = world.spawn_pawn(PawnSpec::new("B", Gender::Female, 18));
        for child in [a, b] {
            for parent in [father, mother] {
                world.add_direct_relation(child, DirectRelation::new(PARENT, parent));
            }
        }

        let mut roster = Roster::new();
        for pawn in [mother, father, a, b] {
            roster.add_member(Individual::load(&world, pawn, PawnKind::Colonist).unwrap());
        }

        let groups = from_existing_graph(&roster, &world);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].parents().len(), 2);
        assert_eq!(groups[0].children().len(), 2);
    }

    #[test]
    fn test_completeness_adds_two_parents() {
        let mut world = SimulationWorld::with_seed(11);
        let mut roster = Roster::new();
        let mut factory = SyntheticPawnFactory::with_seed(ParentAgeConfig::default(), 11);
        let a = world.spawn_pawn(PawnSpec::new("A", Gender::Male, 20));
        let b = world.spawn_pawn(PawnSpec::new("B", Gender::Female, 24));
        let a = roster.add_member(Individual::load(&world, a, PawnKind::Colonist).unwrap());
        let b = roster.add_member(Individual::load(&world, b, PawnKind::Colonist).unwrap());

        let mut groups = ParentChildGroups::from_groups(vec![ParentChildGroup::with_members(Vec::<PawnId>::new(), [a, b])]);
        let created = groups.ensure_parent_completeness(&mut roster, &mut factory, &mut world);

        assert_eq!(created.len(), 2);
        let group = groups.get(0).unwrap();
        assert_eq!(group.parents().len(), 2);
        let genders: Vec<_> = group
            .parents()
            .iter()
            .map(|id| roster.get(*id).unwrap().gender)
            .collect();
        assert!(genders.contains(&Some(Gender::Male)));
        assert!(genders.contains(&Some(Gender::Female)));
        for id in group.parents() {
            // 0.1625 * 80 = 13 years above the oldest child.
            assert!(roster.get(*id).unwrap().biological_age() >= 24 + 13);
        }
    }

    #[test]
    fn test_completeness_adds_opposite_gender() {
        let mut world = SimulationWorld::with_seed(12);
        let mut roster = Roster::new();
        let mut factory = SyntheticPawnFactory::with_seed(ParentAgeConfig::default(), 12);
        let mom = world.spawn_pawn(PawnSpec::new("Mom", Gender::Female, 45));
        let a = world.spawn_pawn(PawnSpec::new("A", Gender::Male, 20));
        let b = world.spawn_pawn(PawnSpec::new("B", Gender::Female, 18));
        let mom = roster.add_member(Individual::load(&world, mom, PawnKind::Colonist).unwrap());
        let a = roster.add_member(Individual::load(&world, a, PawnKind::Colonist).unwrap());
        let b = roster.add_member(Individual::load(&world, b, PawnKind::Colonist).unwrap());

        let mut groups = ParentChildGroups::from_groups(vec![ParentChildGroup::with_members([mom], [a, b])]);
        let created = groups.ensure_parent_completeness(&mut roster, &mut factory, &mut world);

        assert_eq!(created.len(), 1);
        assert_eq!(groups.get(0).unwrap().parents().len(), 2);
        assert_eq!(roster.get(created[0]).unwrap().gender, Some(Gender::Male));
    }

    #[test]
    fn test_only_child_not_completed() {
        let mut world = SimulationWorld::with_seed(13);
        let mut roster = Roster::new();
        let mut factory = SyntheticPawnFactory::with_seed(ParentAgeConfig::default(), 13);
        let mut groups = ParentChildGroups::from_groups(vec![group(&[1], &[2]), group(&[], &[3])]);
        let created = groups.ensure_parent_completeness(&mut roster, &mut factory, &mut world);
        assert!(created.is_empty());
        assert_eq!(groups.get(0).unwrap().parents().len(), 1);
        assert_eq!(world.pawn_count(), 0);
    }

    #[test]
    fn test_validate_ages_floor_only() {
        let mut roster = Roster::new();
        let mut factory = SyntheticPawnFactory::with_seed(ParentAgeConfig::default(), 21);
        roster.add_member(individual(1, Some(Gender::Male), 20, PawnKind::Colonist));
        roster.add_member(individual(2, Some(Gender::Female), 30, PawnKind::Colonist));
        let mut young = individual(3, Some(Gender::Female), 35, PawnKind::Hidden);
        young.reset_ages(35, 41);
        roster.add_member(young);
        roster.add_member(individual(4, Some(Gender::Male), 43, PawnKind::Hidden));
        roster.add_member(individual(5, Some(Gender::Male), 31, PawnKind::Colonist));

        let groups = ParentChildGroups::from_groups(vec![group(&[3, 4], &[1, 2]), group(&[5], &[1, 2])]);
        let changed = groups.validate_ages(&mut roster, &mut factory);

        // 43 - 30 = 13 is already at the minimum, 35 - 30 is not, colonists are never touched.
        assert_eq!(changed, ids(&[3]));
        let adjusted = roster.get(PawnId(3)).unwrap();
        assert!(adjusted.biological_age() >= 30 + 13);
        assert_eq!(adjusted.age_gap(), 6);
        assert_eq!(roster.get(PawnId(4)).unwrap().biological_age(), 43);
        assert_eq!(roster.get(PawnId(5)).unwrap().biological_age(), 31);
    }
}
