//! Single-roll combat resolution.
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{LOG_BOSS_DEFEAT, LOG_BOSS_VICTORY, LOG_COMBAT_DEFEAT, LOG_COMBAT_VICTORY};
use crate::data::EventKind;
use crate::numbers::floor_f64_to_u32;
use crate::rng::unit;
use crate::stats::StatVector;

/// Which side won an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Attacker,
    Defender,
}

/// Result of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatOutcome {
    pub winner: Side,
    pub damage: u32,
    pub attacker_roll: f64,
    pub defender_roll: f64,
}

impl CombatOutcome {
    #[must_use]
    pub const fn attacker_won(&self) -> bool {
        matches!(self.winner, Side::Attacker)
    }
}

/// Resolve one encounter in a single roll per side.
///
/// Ties go to the defender. Damage is the floored gap between the rolls.
pub fn resolve<R: Rng + ?Sized>(
    attacker: &StatVector,
    defender: &StatVector,
    rng: &mut R,
) -> CombatOutcome {
    let attacker_roll = unit(rng) * attacker.power();
    let defender_roll = unit(rng) * defender.power();
    let winner = if attacker_roll > defender_roll {
        Side::Attacker
    } else {
        Side::Defender
    };
    let damage = floor_f64_to_u32((attacker_roll - defender_roll).abs());
    debug!(
        "Combat | attacker {attacker_roll:.2} vs defender {defender_roll:.2} -> {winner:?} ({damage})"
    );
    CombatOutcome {
        winner,
        damage,
        attacker_roll,
        defender_roll,
    }
}

/// One line of a run's battle log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleLogEntry {
    pub floor: u32,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub name: String,
    /// Presentation key describing what happened, e.g. `log.combat.victory`.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CombatOutcome>,
    /// Hit points after the entry was applied.
    pub hp_after: u32,
}

impl BattleLogEntry {
    /// Log entry for a fought combat or boss event.
    #[must_use]
    pub fn combat(
        floor: u32,
        kind: EventKind,
        name: impl Into<String>,
        outcome: CombatOutcome,
        hp_after: u32,
    ) -> Self {
        let key = match (kind, outcome.attacker_won()) {
            (EventKind::Boss, true) => LOG_BOSS_VICTORY,
            (EventKind::Boss, false) => LOG_BOSS_DEFEAT,
            (_, true) => LOG_COMBAT_VICTORY,
            (_, false) => LOG_COMBAT_DEFEAT,
        };
        Self {
            floor,
            kind,
            name: name.into(),
            key: key.to_string(),
            outcome: Some(outcome),
            hp_after,
        }
    }

    /// Log entry for a non-combat event.
    #[must_use]
    pub fn note(
        floor: u32,
        kind: EventKind,
        name: impl Into<String>,
        key: &str,
        hp_after: u32,
    ) -> Self {
        Self {
            floor,
            kind,
            name: name.into(),
            key: key.to_string(),
            outcome: None,
            hp_after,
        }
    }
}
