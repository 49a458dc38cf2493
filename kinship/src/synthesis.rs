//! Synthetic pawns
//!
//! Fabricates the placeholder pawns the editor needs: off-screen parents for
//! sibling groups that are missing one, and temporary pawns offered in the
//! editor palette. Also hands out the display indices for hidden and
//! temporary pawns.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::components::{Gender, PawnId, PawnKind};
use crate::config::ParentAgeConfig;
use crate::engine::{Engine, GenerationRequest};
use crate::error::{KinshipError, Result};
use crate::grouping::ParentChildGroups;
use crate::intent::RelationshipList;
use crate::roster::{Individual, Roster};

/// Absorbs float error in `ratio * life_expectancy` before rounding to years.
const YEAR_EPSILON: f32 = 1e-3;

/// Normal draw with a different spread on each side of the mean.
pub fn gaussian_asymmetric<R: Rng + ?Sized>(rng: &mut R, mean: f32, lower_width: f32, upper_width: f32) -> f32 {
    let z: f32 = rng.sample(StandardNormal);
    if z <= 0.0 {
        mean + z * lower_width
    } else {
        mean + z * upper_width
    }
}

/// How many years older than its oldest child a parent may plausibly be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentAgeWindow {
    pub min: f32,
    pub mean: f32,
    pub max: f32,
}

impl ParentAgeWindow {
    pub fn new(config: &ParentAgeConfig, life_expectancy: f32) -> Self {
        Self {
            min: life_expectancy * config.min_ratio,
            mean: life_expectancy * config.mean_ratio,
            max: life_expectancy * config.max_ratio,
        }
    }

    /// Smallest whole-year offset inside the window.
    pub fn min_offset(&self) -> u32 {
        (self.min - YEAR_EPSILON).ceil().max(0.0) as u32
    }

    /// Draw an offset around the mean, truncated to whole years. Only the
    /// lower bound is enforced; the upper tail of the draw is kept.
    pub fn sample_offset<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let draw = gaussian_asymmetric(rng, self.mean, self.mean - self.min, self.max - self.mean);
        (draw.max(0.0) as u32).max(self.min_offset())
    }
}

/// Oldest child by biological age; the first one wins a tie.
pub fn anchor_child<'r>(roster: &'r Roster, children: &[PawnId]) -> Option<&'r Individual> {
    let mut anchor: Option<&Individual> = None;
    for child in children.iter().filter_map(|id| roster.get(*id)) {
        match anchor {
            Some(best) if best.biological_age() >= child.biological_age() => {}
            _ => anchor = Some(child),
        }
    }
    anchor
}

pub struct SyntheticPawnFactory {
    config: ParentAgeConfig,
    rng: StdRng,
    hidden_index: u32,
    temporary_index: u32,
}

impl SyntheticPawnFactory {
    pub fn new(config: ParentAgeConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: ParentAgeConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ParentAgeConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            hidden_index: 1,
            temporary_index: 1,
        }
    }

    pub fn next_hidden_index(&mut self) -> u32 {
        let index = self.hidden_index;
        self.hidden_index += 1;
        index
    }

    pub fn next_temporary_index(&mut self) -> u32 {
        let index = self.temporary_index;
        self.temporary_index += 1;
        index
    }

    /// Age a parent should have relative to `anchor`, the oldest child. A
    /// parent already at least the window minimum above the anchor keeps its
    /// age; a younger one gets a fresh draw.
    pub fn valid_parent_age(&mut self, parent: &Individual, anchor: &Individual) -> u32 {
        let window = ParentAgeWindow::new(&self.config, anchor.life_expectancy);
        let offset = parent.biological_age() as i64 - anchor.biological_age() as i64;
        if offset < window.min_offset() as i64 {
            anchor.biological_age() + window.sample_offset(&mut self.rng)
        } else {
            parent.biological_age()
        }
    }

    /// Generate a dead ancestor aged to fit above the oldest of `children`.
    pub fn create_parent<E: Engine>(
        &mut self,
        engine: &mut E,
        roster: &mut Roster,
        gender: Option<Gender>,
        children: &[PawnId],
    ) -> Result<PawnId> {
        let anchor = anchor_child(roster, children).ok_or(KinshipError::EmptyGroup)?;
        let window = ParentAgeWindow::new(&self.config, anchor.life_expectancy);
        let age = anchor.biological_age() + window.sample_offset(&mut self.rng);
        let request = GenerationRequest {
            fixed_biological_age: Some(age),
            fixed_gender: gender,
            kind_template: Some(anchor.kind_template.clone()),
        };

        let pawn = engine.generate(&request)?;
        engine.kill(pawn);
        let parent = Individual::load(&*engine, pawn, PawnKind::Temporary)?;
        info!(parent = %parent.id, age, ?gender, "Created missing parent");
        Ok(roster.insert(parent))
    }

    /// Generate a living placeholder pawn in a random non-player faction.
    pub fn create_temporary_pawn<E: Engine>(
        &mut self,
        engine: &mut E,
        roster: &mut Roster,
        gender: Option<Gender>,
    ) -> Result<PawnId> {
        let pawn = engine.generate(&GenerationRequest {
            fixed_gender: gender,
            ..Default::default()
        })?;
        let faction = engine
            .random_non_colony_faction()
            .or_else(|| engine.ancients_faction());
        if let Some(faction) = faction {
            engine.set_faction(pawn, faction);
        }

        let mut individual = Individual::load(&*engine, pawn, PawnKind::Temporary)?;
        individual.index = Some(self.next_temporary_index());
        debug!(pawn = %individual.id, index = ?individual.index, "Created temporary pawn");
        Ok(roster.insert(individual))
    }

    /// Number every unindexed hidden and temporary pawn, walking groups first
    /// and then the flat relationship list. Indices already handed out are
    /// kept and never reused.
    pub fn reassign_indices(&mut self, roster: &mut Roster, groups: &ParentChildGroups, relationships: &RelationshipList) {
        self.hidden_index = 1;
        self.temporary_index = 1;

        let mut used_hidden = HashSet::new();
        let mut used_temporary = HashSet::new();
        for individual in roster.iter() {
            if let Some(index) = individual.index {
                match individual.kind {
                    PawnKind::Hidden => used_hidden.insert(index),
                    PawnKind::Temporary => used_temporary.insert(index),
                    _ => false,
                };
            }
        }

        let mut order = groups.pawns();
        for relationship in relationships {
            for id in [relationship.source, relationship.target] {
                if !order.contains(&id) {
                    order.push(id);
                }
            }
        }

        for id in order {
            let Some(individual) = roster.get_mut(id) else {
                continue;
            };
            if individual.index.is_some() {
                continue;
            }
            individual.index = match individual.kind {
                PawnKind::Hidden => Some(next_free(&mut self.hidden_index, &mut used_hidden)),
                PawnKind::Temporary => Some(next_free(&mut self.temporary_index, &mut used_temporary)),
                _ => None,
            };
        }

        // Later pawns continue above everything handed out so far.
        self.hidden_index = self.hidden_index.max(used_hidden.iter().max().map_or(1, |m| m + 1));
        self.temporary_index = self
            .temporary_index
            .max(used_temporary.iter().max().map_or(1, |m| m + 1));
    }
}

fn next_free(counter: &mut u32, used: &mut HashSet<u32>) -> u32 {
    while used.contains(counter) {
        *counter += 1;
    }
    let index = *counter;
    used.insert(index);
    *counter += 1;
    index
}
