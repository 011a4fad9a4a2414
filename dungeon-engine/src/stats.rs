//! Attribute vectors shared by characters, enemies, and bosses.
use serde::{Deserialize, Serialize};

use crate::constants::{POWER_AGI_WEIGHT, POWER_INT_WEIGHT, POWER_LUK_WEIGHT, POWER_STR_WEIGHT};

/// Five-attribute tuple used uniformly for every combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StatVector {
    #[serde(default)]
    pub str: u32,
    #[serde(default)]
    pub agi: u32,
    #[serde(default)]
    pub int: u32,
    #[serde(default)]
    pub luk: u32,
    #[serde(default)]
    pub vit: u32,
}

impl StatVector {
    #[must_use]
    pub const fn new(str: u32, agi: u32, int: u32, luk: u32, vit: u32) -> Self {
        Self {
            str,
            agi,
            int,
            luk,
            vit,
        }
    }

    /// Scalar combat strength. Vitality does not contribute.
    #[must_use]
    pub fn power(&self) -> f64 {
        f64::from(self.str) * POWER_STR_WEIGHT
            + f64::from(self.agi) * POWER_AGI_WEIGHT
            + f64::from(self.int) * POWER_INT_WEIGHT
            + f64::from(self.luk) * POWER_LUK_WEIGHT
    }

    /// Component-wise saturating addition.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self {
            str: self.str.saturating_add(other.str),
            agi: self.agi.saturating_add(other.agi),
            int: self.int.saturating_add(other.int),
            luk: self.luk.saturating_add(other.luk),
            vit: self.vit.saturating_add(other.vit),
        }
    }
}
