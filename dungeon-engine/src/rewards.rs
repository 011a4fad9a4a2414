//! Completion rewards, rarity rolls, and loot bookkeeping.
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{BossRewards, EventEffect, Rarity, RarityWeight, RewardRange};
use crate::numbers::{floor_f64_to_u64, u64_to_f64};
use crate::rng::{uniform_between, unit};

/// Kind of a collected loot entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootKind {
    Gold,
    Exp,
    Equipment,
    Item,
}

/// A single piece of loot collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LootReward {
    pub kind: LootKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,
}

impl LootReward {
    #[must_use]
    pub const fn gold(amount: u64) -> Self {
        Self {
            kind: LootKind::Gold,
            item_name: None,
            amount: Some(amount),
            rarity: None,
        }
    }

    #[must_use]
    pub const fn exp(amount: u64) -> Self {
        Self {
            kind: LootKind::Exp,
            item_name: None,
            amount: Some(amount),
            rarity: None,
        }
    }

    #[must_use]
    pub fn equipment(name: impl Into<String>, rarity: Rarity) -> Self {
        Self {
            kind: LootKind::Equipment,
            item_name: Some(name.into()),
            amount: None,
            rarity: Some(rarity),
        }
    }

    #[must_use]
    pub fn item(name: impl Into<String>, rarity: Option<Rarity>) -> Self {
        Self {
            kind: LootKind::Item,
            item_name: Some(name.into()),
            amount: Some(1),
            rarity,
        }
    }

    /// Loot granted by an event effect; heal and damage grant nothing.
    #[must_use]
    pub fn from_effect(effect: &EventEffect) -> Option<Self> {
        match effect {
            EventEffect::Gold { amount } => Some(Self::gold(*amount)),
            EventEffect::Exp { amount } => Some(Self::exp(*amount)),
            EventEffect::Item { name, rarity } => Some(Self::item(name.clone(), *rarity)),
            EventEffect::Equipment { name, rarity } => Some(Self::equipment(name.clone(), *rarity)),
            EventEffect::Heal { .. } | EventEffect::Damage { .. } => None,
        }
    }
}

/// Gold and experience granted for completing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunRewards {
    pub gold: u64,
    pub exp: u64,
}

/// Roll completion rewards: `floor(uniform(min, max))` for gold, then exp.
pub fn completion_rewards<R: Rng + ?Sized>(range: &RewardRange, rng: &mut R) -> RunRewards {
    let gold = floor_f64_to_u64(uniform_between(
        rng,
        u64_to_f64(range.gold_min),
        u64_to_f64(range.gold_max),
    ))
    .clamp(range.gold_min, range.gold_max);
    let exp = floor_f64_to_u64(uniform_between(
        rng,
        u64_to_f64(range.exp_min),
        u64_to_f64(range.exp_max),
    ))
    .clamp(range.exp_min, range.exp_max);
    debug!("Rewards | completion gold {gold} exp {exp}");
    RunRewards { gold, exp }
}

/// Cumulative-probability rarity selection.
///
/// Weights are normalized by their total and accumulated in order until the
/// draw falls inside the running sum. The last entry catches any residual
/// draw left by rounding. An empty or all-zero table yields `None`.
pub fn roll_rarity<R: Rng + ?Sized>(table: &[RarityWeight], rng: &mut R) -> Option<Rarity> {
    let last = table.last()?;
    let total: f64 = table.iter().map(|entry| entry.weight.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let roll = unit(rng);
    let mut cumulative = 0.0;
    for entry in table {
        cumulative += entry.weight.max(0.0) / total;
        if roll < cumulative {
            return Some(entry.rarity);
        }
    }
    Some(last.rarity)
}

/// Loot for defeating a boss: its fixed rewards plus one rarity-rolled drop.
pub fn boss_drops<R: Rng + ?Sized>(
    boss_name: &str,
    rewards: BossRewards,
    loot_table: &[RarityWeight],
    rng: &mut R,
) -> Vec<LootReward> {
    let mut drops = Vec::with_capacity(3);
    if rewards.gold > 0 {
        drops.push(LootReward::gold(rewards.gold));
    }
    if rewards.exp > 0 {
        drops.push(LootReward::exp(rewards.exp));
    }
    if let Some(rarity) = roll_rarity(loot_table, rng) {
        drops.push(LootReward::equipment(format!("{boss_name}'s Trophy"), rarity));
    }
    drops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const RANGE: RewardRange = RewardRange {
        gold_min: 50,
        gold_max: 150,
        exp_min: 30,
        exp_max: 80,
    };

    fn table() -> Vec<RarityWeight> {
        vec![
            RarityWeight {
                rarity: Rarity::Common,
                weight: 50.0,
            },
            RarityWeight {
                rarity: Rarity::Rare,
                weight: 25.0,
            },
            RarityWeight {
                rarity: Rarity::Epic,
                weight: 25.0,
            },
        ]
    }

    #[test]
    fn completion_rewards_floor_the_uniform_draw() {
        let mut rng = ScriptedRng::new(&[0.5, 0.25]);
        let rewards = completion_rewards(&RANGE, &mut rng);
        assert_eq!(rewards, RunRewards { gold: 100, exp: 42 });
    }

    #[test]
    fn completion_rewards_stay_in_range() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        for _ in 0..500 {
            let rewards = completion_rewards(&RANGE, &mut rng);
            assert!((50..=150).contains(&rewards.gold));
            assert!((30..=80).contains(&rewards.exp));
        }
    }

    #[test]
    fn degenerate_range_returns_fixed_amount() {
        let fixed = RewardRange {
            gold_min: 7,
            gold_max: 7,
            exp_min: 0,
            exp_max: 0,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        assert_eq!(
            completion_rewards(&fixed, &mut rng),
            RunRewards { gold: 7, exp: 0 }
        );
    }

    #[test]
    fn rarity_follows_cumulative_weights() {
        let t = table();
        assert_eq!(
            roll_rarity(&t, &mut ScriptedRng::new(&[0.25])),
            Some(Rarity::Common)
        );
        assert_eq!(
            roll_rarity(&t, &mut ScriptedRng::new(&[0.5])),
            Some(Rarity::Rare)
        );
        assert_eq!(
            roll_rarity(&t, &mut ScriptedRng::new(&[0.875])),
            Some(Rarity::Epic)
        );
    }

    #[test]
    fn residual_draw_falls_to_last_entry() {
        let thirds = vec![
            RarityWeight {
                rarity: Rarity::Common,
                weight: 1.0,
            },
            RarityWeight {
                rarity: Rarity::Uncommon,
                weight: 1.0,
            },
            RarityWeight {
                rarity: Rarity::Legendary,
                weight: 1.0,
            },
        ];
        let mut rng = ScriptedRng::new(&[0.999_999_999_999]);
        assert_eq!(roll_rarity(&thirds, &mut rng), Some(Rarity::Legendary));
        let mut rng = ScriptedRng::new(&[0.0]);
        assert_eq!(roll_rarity(&thirds, &mut rng), Some(Rarity::Common));
    }

    #[test]
    fn empty_or_zero_tables_roll_nothing() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert_eq!(roll_rarity(&[], &mut rng), None);
        let zero = [RarityWeight {
            rarity: Rarity::Common,
            weight: 0.0,
        }];
        assert_eq!(roll_rarity(&zero, &mut rng), None);
    }

    #[test]
    fn boss_drops_include_fixed_rewards_and_trophy() {
        let mut rng = ScriptedRng::new(&[0.0]);
        let drops = boss_drops("Ogre", BossRewards { gold: 30, exp: 0 }, &table(), &mut rng);
        assert_eq!(drops.len(), 2);
        assert_eq!(drops[0], LootReward::gold(30));
        assert_eq!(
            drops[1],
            LootReward::equipment("Ogre's Trophy", Rarity::Common)
        );
    }

    #[test]
    fn effects_map_to_loot() {
        assert_eq!(
            LootReward::from_effect(&EventEffect::Exp { amount: 9 }),
            Some(LootReward::exp(9))
        );
        assert_eq!(
            LootReward::from_effect(&EventEffect::Heal { amount: 9 }),
            None
        );
    }
}
