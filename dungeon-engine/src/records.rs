//! Persistent character and user records.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EnergyConfig;
use crate::constants::{STARTING_LEVEL, STARTING_MAX_HP};
use crate::stats::StatVector;

/// A playable character owned by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub wallet_address: String,
    pub name: String,
    pub level: u32,
    pub exp: u64,
    pub hp: u32,
    pub max_hp: u32,
    pub stats: StatVector,
}

impl Character {
    /// Fresh level-1 character at full health.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        wallet_address: impl Into<String>,
        name: impl Into<String>,
        stats: StatVector,
    ) -> Self {
        Self {
            id: id.into(),
            wallet_address: wallet_address.into(),
            name: name.into(),
            level: STARTING_LEVEL,
            exp: 0,
            hp: STARTING_MAX_HP,
            max_hp: STARTING_MAX_HP,
            stats,
        }
    }

    #[must_use]
    pub const fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Keep `hp` within `0..=max_hp`.
    pub fn clamp(&mut self) {
        self.hp = self.hp.min(self.max_hp);
    }
}

/// An account, keyed by wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub wallet_address: String,
    pub gold: u64,
    pub exp: u64,
    pub level: u32,
    pub energy: u32,
    pub max_energy: u32,
    pub last_energy_reset: DateTime<Utc>,
    /// Bumped on every committed write; guards compare-and-swap commits.
    #[serde(default)]
    pub version: u64,
}

impl User {
    /// New account with full energy at the default maximum.
    #[must_use]
    pub fn new(wallet_address: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::from_config(wallet_address, now, &EnergyConfig::default())
    }

    /// New account with full energy at the configured maximum.
    #[must_use]
    pub fn from_config(
        wallet_address: impl Into<String>,
        now: DateTime<Utc>,
        energy: &EnergyConfig,
    ) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            gold: 0,
            exp: 0,
            level: STARTING_LEVEL,
            energy: energy.default_max_energy,
            max_energy: energy.default_max_energy,
            last_energy_reset: now,
            version: 0,
        }
    }

    #[must_use]
    pub const fn with_energy(mut self, energy: u32, max_energy: u32) -> Self {
        self.energy = energy;
        self.max_energy = max_energy;
        self
    }

    #[must_use]
    pub const fn with_gold(mut self, gold: u64) -> Self {
        self.gold = gold;
        self
    }
}
