//! Experience, level-ups, and stat growth.
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ProgressionConfig;
use crate::records::{Character, User};

/// Summary of an experience grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUpReport {
    pub previous_level: u32,
    pub new_level: u32,
    pub levels_gained: u32,
}

impl LevelUpReport {
    #[must_use]
    pub const fn leveled_up(&self) -> bool {
        self.levels_gained > 0
    }
}

/// Consume experience in level-sized chunks until the next threshold is out
/// of reach or the cap is hit. Excess experience at the cap is retained.
fn consume_levels(level: &mut u32, exp: &mut u64, cfg: &ProgressionConfig) -> u32 {
    let mut gained = 0;
    while *level < cfg.max_level && *exp >= cfg.threshold(*level) {
        *exp -= cfg.threshold(*level);
        *level += 1;
        gained += 1;
    }
    gained
}

/// Grant experience to a character, applying every level-up it earns.
///
/// Each level adds the configured stat growth and max HP, then fully heals.
pub fn apply_exp(character: &mut Character, gained: u64, cfg: &ProgressionConfig) -> LevelUpReport {
    let previous_level = character.level;
    character.exp = character.exp.saturating_add(gained);

    let levels_gained = consume_levels(&mut character.level, &mut character.exp, cfg);
    for _ in 0..levels_gained {
        character.stats = character.stats.saturating_add(cfg.stat_growth);
        character.max_hp = character.max_hp.saturating_add(cfg.max_hp_growth);
        character.hp = character.max_hp;
    }

    if levels_gained > 0 {
        info!(
            "Progression | character {} level {} -> {}",
            character.id, previous_level, character.level
        );
    }

    LevelUpReport {
        previous_level,
        new_level: character.level,
        levels_gained,
    }
}

/// Convert credited account experience into account levels.
///
/// Same curve as characters, no stat growth. The ledger credits the
/// experience; this only settles the level.
pub fn settle_account_level(user: &mut User, cfg: &ProgressionConfig) -> LevelUpReport {
    let previous_level = user.level;
    let levels_gained = consume_levels(&mut user.level, &mut user.exp, cfg);
    LevelUpReport {
        previous_level,
        new_level: user.level,
        levels_gained,
    }
}
