//! Dungeon catalog definitions and loading.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::{EngineError, Entity};
use crate::stats::StatVector;

const DEFAULT_DUNGEON_DATA: &str = include_str!("../assets/data/dungeons.json");

/// Difficulty tier of a dungeon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Nightmare,
}

/// Loot rarity, ordered from most to least common.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Kind of floor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Combat,
    Treasure,
    Trap,
    Rest,
    Merchant,
    Boss,
    /// A floor whose probability roll matched nothing.
    Quiet,
}

impl EventKind {
    #[must_use]
    pub const fn is_combat(self) -> bool {
        matches!(self, Self::Combat | Self::Boss)
    }
}

/// Effect carried by an event and applied when the event is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEffect {
    Heal {
        amount: u32,
    },
    Damage {
        amount: u32,
    },
    Gold {
        amount: u64,
    },
    Exp {
        amount: u64,
    },
    Item {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rarity: Option<Rarity>,
    },
    Equipment {
        name: String,
        rarity: Rarity,
    },
}

/// Inline capacity for event effects; most events carry one or two.
pub type EffectList = SmallVec<[EventEffect; 2]>;

/// Gold and experience ranges granted when a run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRange {
    pub gold_min: u64,
    pub gold_max: u64,
    pub exp_min: u64,
    pub exp_max: u64,
}

/// One weighted entry of a dungeon's event table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTemplate {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub name: String,
    pub probability: f64,
    #[serde(default)]
    pub effects: EffectList,
    /// Opponent stats for combat events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemy: Option<StatVector>,
}

/// Fixed rewards for defeating a boss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BossRewards {
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub exp: u64,
}

/// One entry of a dungeon's boss table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossTemplate {
    pub name: String,
    pub stats: StatVector,
    #[serde(default)]
    pub rewards: BossRewards,
}

/// Weighted rarity entry used for boss drops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RarityWeight {
    pub rarity: Rarity,
    pub weight: f64,
}

/// A dungeon definition. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dungeon {
    pub id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub min_level: u32,
    pub max_level: u32,
    pub energy_cost: u32,
    pub floor_count: u32,
    #[serde(default = "default_active")]
    pub active: bool,
    pub rewards: RewardRange,
    #[serde(default)]
    pub event_table: Vec<EventTemplate>,
    pub boss_table: Vec<BossTemplate>,
    #[serde(default)]
    pub loot_table: Vec<RarityWeight>,
}

const fn default_active() -> bool {
    true
}

impl Dungeon {
    /// Check the invariants every catalog entry must hold.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Invalid`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::Invalid {
            dungeon: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if self.floor_count == 0 {
            return Err(invalid("floorCount must be at least 1"));
        }
        if self.min_level > self.max_level {
            return Err(invalid("minLevel exceeds maxLevel"));
        }
        if self.rewards.gold_min > self.rewards.gold_max {
            return Err(invalid("goldMin exceeds goldMax"));
        }
        if self.rewards.exp_min > self.rewards.exp_max {
            return Err(invalid("expMin exceeds expMax"));
        }
        if self.boss_table.is_empty() {
            return Err(invalid("boss table must not be empty"));
        }
        if self
            .event_table
            .iter()
            .any(|e| !(0.0..=1.0).contains(&e.probability))
        {
            return Err(invalid("event probabilities must be within [0, 1]"));
        }
        if self.event_table.iter().any(|e| e.kind == EventKind::Boss) {
            return Err(invalid("bosses belong in the boss table"));
        }
        if self
            .loot_table
            .iter()
            .any(|w| !w.weight.is_finite() || w.weight < 0.0)
        {
            return Err(invalid("loot weights must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Errors raised while loading or validating a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse dungeon catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read dungeon catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dungeon {dungeon} is invalid: {reason}")]
    Invalid { dungeon: String, reason: String },
    #[error("duplicate dungeon id: {0}")]
    DuplicateId(String),
}

#[derive(Deserialize)]
struct CatalogFile {
    dungeons: Vec<Dungeon>,
}

/// Read-only lookup of dungeon definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct DungeonCatalog {
    dungeons: Vec<Dungeon>,
}

impl DungeonCatalog {
    /// Build a catalog from already-parsed dungeons.
    ///
    /// # Errors
    ///
    /// Returns an error if any dungeon is invalid or an id repeats.
    pub fn from_dungeons(dungeons: Vec<Dungeon>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for dungeon in &dungeons {
            dungeon.validate()?;
            if !seen.insert(dungeon.id.as_str()) {
                return Err(CatalogError::DuplicateId(dungeon.id.clone()));
            }
        }
        Ok(Self { dungeons })
    }

    /// Load a catalog from JSON text of the form `{"dungeons": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_dungeons(file.dungeons)
    }

    /// Load a catalog from a JSON file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The bundled seed catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled data fails validation.
    pub fn load_default() -> Result<Self, CatalogError> {
        Self::from_json(DEFAULT_DUNGEON_DATA)
    }

    /// All dungeons, optionally restricted to active ones, in catalog order.
    #[must_use]
    pub fn list(&self, active_only: bool) -> Vec<&Dungeon> {
        self.dungeons
            .iter()
            .filter(|d| !active_only || d.active)
            .collect()
    }

    /// Look up a dungeon by id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id.
    pub fn get(&self, id: &str) -> Result<&Dungeon, EngineError> {
        self.dungeons
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| EngineError::not_found(Entity::Dungeon, id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dungeons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dungeons.is_empty()
    }
}
