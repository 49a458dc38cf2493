//! Tunables for parent synthesis and compatibility search
//!
//! Every field has a default, so `{}` is a complete config.

use serde::{Deserialize, Serialize};

use crate::components::Gender;
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KinshipConfig {
    pub parent_age: ParentAgeConfig,
    pub compatibility: CompatibilityConfig,
    /// Genders of the placeholder pawns offered by the editor palette.
    pub palette_genders: PaletteGenders,
}

impl KinshipConfig {
    /// Parse a config from JSON. Missing fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Parent age window, as fractions of the oldest child's life expectancy.
/// Ages are measured as years above that child.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParentAgeConfig {
    pub min_ratio: f32,
    pub mean_ratio: f32,
    pub max_ratio: f32,
}

impl Default for ParentAgeConfig {
    fn default() -> Self {
        Self {
            min_ratio: 0.1625,
            mean_ratio: 0.325,
            max_ratio: 0.625,
        }
    }
}

/// Size of the spare id-number pool: `max(min(count * per_relationship, cap), floor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityConfig {
    pub per_relationship: usize,
    pub cap: usize,
    pub floor: usize,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            per_relationship: 6,
            cap: 12,
            floor: 50,
        }
    }
}

impl CompatibilityConfig {
    pub fn pool_size(&self, relationship_count: usize) -> usize {
        relationship_count
            .saturating_mul(self.per_relationship)
            .min(self.cap)
            .max(self.floor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaletteGenders(pub Vec<Gender>);

impl Default for PaletteGenders {
    fn default() -> Self {
        Self(vec![Gender::Female, Gender::Male])
    }
}
