//! Floor-by-floor encounter generation.
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{BossRewards, BossTemplate, Dungeon, EffectList, EventKind, EventTemplate};
use crate::rng::{pick, unit};
use crate::stats::StatVector;

/// A generated event, tagged with the floor it occurs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorEvent {
    pub floor: u32,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub name: String,
    #[serde(default)]
    pub effects: EffectList,
    /// Opponent stats for combat and boss events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemy: Option<StatVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boss_rewards: Option<BossRewards>,
}

impl FloorEvent {
    #[must_use]
    pub fn quiet(floor: u32) -> Self {
        Self {
            floor,
            kind: EventKind::Quiet,
            name: String::from("Quiet floor"),
            effects: EffectList::new(),
            enemy: None,
            boss_rewards: None,
        }
    }

    #[must_use]
    pub fn from_template(template: &EventTemplate, floor: u32) -> Self {
        Self {
            floor,
            kind: template.kind,
            name: template.name.clone(),
            effects: template.effects.clone(),
            enemy: template.enemy,
            boss_rewards: None,
        }
    }

    #[must_use]
    pub fn boss(template: &BossTemplate, floor: u32) -> Self {
        Self {
            floor,
            kind: EventKind::Boss,
            name: template.name.clone(),
            effects: EffectList::new(),
            enemy: Some(template.stats),
            boss_rewards: Some(template.rewards),
        }
    }

    #[must_use]
    pub const fn is_boss(&self) -> bool {
        matches!(self.kind, EventKind::Boss)
    }
}

/// Outcome of generating a single floor.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorDraw {
    /// The triggered event, or a quiet floor.
    pub event: FloorEvent,
    /// Present only on the final floor.
    pub boss: Option<FloorEvent>,
}

impl FloorDraw {
    /// Events in resolution order: the floor event, then the boss.
    pub fn into_events(self) -> impl Iterator<Item = FloorEvent> {
        std::iter::once(self.event).chain(self.boss)
    }
}

/// Draw the event for `floor`.
///
/// Picks one template uniformly, then rolls against its probability; a failed
/// roll yields a quiet floor. The final floor always adds a boss drawn
/// uniformly from the boss table.
pub fn next_event<R: Rng + ?Sized>(dungeon: &Dungeon, floor: u32, rng: &mut R) -> FloorDraw {
    let event = match pick(rng, &dungeon.event_table) {
        Some(template) => {
            let roll = unit(rng);
            if roll < template.probability {
                debug!(
                    "Encounter | {} floor {} triggered {} (roll {:.3} < {:.3})",
                    dungeon.id, floor, template.name, roll, template.probability
                );
                FloorEvent::from_template(template, floor)
            } else {
                debug!(
                    "Encounter | {} floor {} quiet (roll {:.3} >= {:.3})",
                    dungeon.id, floor, roll, template.probability
                );
                FloorEvent::quiet(floor)
            }
        }
        None => FloorEvent::quiet(floor),
    };

    let boss = if floor == dungeon.floor_count {
        pick(rng, &dungeon.boss_table).map(|template| {
            debug!(
                "Encounter | {} floor {} boss {}",
                dungeon.id, floor, template.name
            );
            FloorEvent::boss(template, floor)
        })
    } else {
        None
    };

    FloorDraw { event, boss }
}

/// Pre-generate every floor of a run, boss last.
pub fn generate_run<R: Rng + ?Sized>(dungeon: &Dungeon, rng: &mut R) -> Vec<FloorEvent> {
    (1..=dungeon.floor_count)
        .flat_map(|floor| next_event(dungeon, floor, rng).into_events())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Difficulty, EventEffect, RewardRange};
    use crate::rng::ScriptedRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn dungeon(floor_count: u32, table: Vec<EventTemplate>) -> Dungeon {
        Dungeon {
            id: String::from("test-dungeon"),
            name: String::from("Test Dungeon"),
            difficulty: Difficulty::Normal,
            min_level: 5,
            max_level: 30,
            energy_cost: 10,
            floor_count,
            active: true,
            rewards: RewardRange {
                gold_min: 50,
                gold_max: 150,
                exp_min: 30,
                exp_max: 80,
            },
            event_table: table,
            boss_table: vec![
                BossTemplate {
                    name: String::from("Ogre"),
                    stats: StatVector::new(20, 10, 5, 5, 20),
                    rewards: BossRewards { gold: 30, exp: 40 },
                },
                BossTemplate {
                    name: String::from("Lich"),
                    stats: StatVector::new(8, 10, 30, 10, 12),
                    rewards: BossRewards { gold: 35, exp: 45 },
                },
            ],
            loot_table: Vec::new(),
        }
    }

    fn template(kind: EventKind, name: &str, probability: f64) -> EventTemplate {
        EventTemplate {
            kind,
            name: name.to_string(),
            probability,
            effects: EffectList::from_vec(vec![EventEffect::Gold { amount: 5 }]),
            enemy: Some(StatVector::new(3, 3, 3, 3, 3)),
        }
    }

    #[test]
    fn roll_below_probability_triggers() {
        let d = dungeon(3, vec![template(EventKind::Combat, "Bandit", 0.5)]);
        let mut rng = ScriptedRng::new(&[0.0, 0.25]);
        let draw = next_event(&d, 1, &mut rng);
        assert_eq!(draw.event.kind, EventKind::Combat);
        assert_eq!(draw.event.name, "Bandit");
        assert_eq!(draw.event.floor, 1);
        assert!(draw.boss.is_none());
    }

    #[test]
    fn roll_at_or_above_probability_is_quiet() {
        let d = dungeon(3, vec![template(EventKind::Combat, "Bandit", 0.5)]);
        let mut rng = ScriptedRng::new(&[0.0, 0.5]);
        let draw = next_event(&d, 2, &mut rng);
        assert_eq!(draw.event.kind, EventKind::Quiet);
        assert_eq!(draw.event.floor, 2);
    }

    #[test]
    fn uniform_pick_selects_by_unit_draw() {
        let d = dungeon(
            4,
            vec![
                template(EventKind::Combat, "Bandit", 1.0),
                template(EventKind::Treasure, "Chest", 1.0),
            ],
        );
        let mut rng = ScriptedRng::new(&[0.75, 0.0]);
        let draw = next_event(&d, 1, &mut rng);
        assert_eq!(draw.event.name, "Chest");
    }

    #[test]
    fn final_floor_always_adds_boss() {
        let d = dungeon(3, vec![template(EventKind::Combat, "Bandit", 0.0)]);
        let mut rng = ScriptedRng::new(&[0.0, 0.5, 0.5]);
        let draw = next_event(&d, 3, &mut rng);
        assert_eq!(draw.event.kind, EventKind::Quiet);
        let boss = draw.boss.expect("boss on final floor");
        assert!(boss.is_boss());
        assert_eq!(boss.name, "Lich");
        assert_eq!(boss.floor, 3);
        assert_eq!(boss.boss_rewards, Some(BossRewards { gold: 35, exp: 45 }));
    }

    #[test]
    fn single_floor_dungeon_has_event_plus_boss() {
        let d = dungeon(1, vec![template(EventKind::Trap, "Pit", 1.0)]);
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let events = generate_run(&d, &mut rng);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Trap);
        assert!(events[1].is_boss());
    }

    #[test]
    fn empty_event_table_yields_quiet_floors() {
        let d = dungeon(2, Vec::new());
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let events = generate_run(&d, &mut rng);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, EventKind::Quiet);
        assert_eq!(events[1].kind, EventKind::Quiet);
        assert!(events[2].is_boss());
    }

    #[test]
    fn every_run_has_exactly_one_boss_on_last_floor() {
        for seed in 0..200_u64 {
            let floors = u32::try_from(seed % 9).unwrap() + 1;
            let d = dungeon(
                floors,
                vec![
                    template(EventKind::Combat, "Bandit", 0.6),
                    template(EventKind::Rest, "Camp", 0.3),
                ],
            );
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let events = generate_run(&d, &mut rng);
            let bosses: Vec<_> = events.iter().filter(|e| e.is_boss()).collect();
            assert_eq!(bosses.len(), 1, "seed {seed}");
            assert_eq!(bosses[0].floor, floors);
            assert!(events.last().is_some_and(FloorEvent::is_boss));
            assert_eq!(events.len(), floors as usize + 1);
        }
    }

    #[test]
    fn same_seed_generates_same_run() {
        let d = dungeon(6, vec![template(EventKind::Combat, "Bandit", 0.5)]);
        let a = generate_run(&d, &mut ChaCha20Rng::seed_from_u64(42));
        let b = generate_run(&d, &mut ChaCha20Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
