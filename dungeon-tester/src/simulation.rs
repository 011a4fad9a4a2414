use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use dungeon_engine::{
    ActionRequest, Character, CompleteRequest, Dungeon, DungeonCatalog, DungeonService,
    EngineConfig, EnterRequest, EventKind, FixedClock, FloorAction, FloorReport, GameStore,
    MemoryStore, RunStatus, StatVector, User,
};
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

const SIM_WALLET: &str = "0x00000000000000000000000000000000000051de";
const SIM_CHARACTER: &str = "sim-hero";

/// How the simulated player handles each floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Engage every event
    Fight,
    /// Flee traps, and flee fights once below half health
    Cautious,
}

impl Policy {
    fn choose(self, kind: EventKind, hp: u32, max_hp: u32) -> FloorAction {
        let engage = FloorAction::engage(kind);
        match self {
            Self::Fight => engage,
            Self::Cautious => match kind {
                EventKind::Trap => FloorAction::Flee,
                EventKind::Combat | EventKind::Boss if hp.saturating_mul(2) < max_hp => {
                    FloorAction::Flee
                }
                _ => engage,
            },
        }
    }
}

/// One batch: a dungeon played `iterations` times from one seed.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub dungeon_id: String,
    pub seed: u64,
    pub iterations: usize,
    pub level: Option<u32>,
    pub policy: Policy,
}

/// Outcome of a single simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub iteration: usize,
    pub status: RunStatus,
    pub events: usize,
    pub fights_won: usize,
    pub fights_lost: usize,
    pub gold: u64,
    pub exp: u64,
    pub level_ups: u32,
    pub fingerprint: u64,
}

/// Aggregated results for one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub dungeon_id: String,
    pub seed: u64,
    pub policy: Policy,
    pub character_level: u32,
    pub passed: bool,
    pub runs: Vec<RunRecord>,
    pub failures: Vec<String>,
    pub clear_rate: f64,
    pub average_gold: f64,
    pub average_exp: f64,
    pub level_ups: u32,
    pub distinct_fingerprints: usize,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Runs plans against fresh in-memory stores.
pub struct Simulator {
    catalog: DungeonCatalog,
    config: EngineConfig,
    verbose: bool,
}

impl Simulator {
    pub const fn new(catalog: DungeonCatalog, config: EngineConfig, verbose: bool) -> Self {
        Self {
            catalog,
            config,
            verbose,
        }
    }

    pub fn run(&self, plan: &SimulationPlan) -> Result<BatchResult> {
        let dungeon = self
            .catalog
            .get(&plan.dungeon_id)
            .with_context(|| format!("unknown dungeon {}", plan.dungeon_id))?;
        let level = plan.level.unwrap_or(dungeon.min_level).max(1);
        if self.verbose {
            println!(
                "🧪 Simulating {} (seed {} level {} policy {:?})",
                dungeon.id.bright_white(),
                plan.seed,
                level,
                plan.policy
            );
        }

        let start = Instant::now();
        let mut runs = Vec::with_capacity(plan.iterations);
        let mut failures = Vec::new();
        let mut seeds = ChaCha20Rng::seed_from_u64(plan.seed);
        for iteration in 0..plan.iterations {
            let master_seed = seeds.r#gen::<u64>();
            match self.play(dungeon, level, plan.policy, master_seed, iteration) {
                Ok((record, mut problems)) => {
                    if iteration == 0 {
                        let (replay, _) =
                            self.play(dungeon, level, plan.policy, master_seed, iteration)?;
                        if replay.fingerprint != record.fingerprint {
                            problems.push(format!(
                                "iteration {iteration}: replay fingerprint {:016x} != {:016x}",
                                replay.fingerprint, record.fingerprint
                            ));
                        }
                    }
                    failures.append(&mut problems);
                    runs.push(record);
                }
                Err(err) => failures.push(format!("iteration {iteration}: {err:#}")),
            }
        }

        Ok(summarize(plan, level, runs, failures, start.elapsed()))
    }

    fn play(
        &self,
        dungeon: &Dungeon,
        level: u32,
        policy: Policy,
        master_seed: u64,
        iteration: usize,
    ) -> Result<(RunRecord, Vec<String>)> {
        let now = DateTime::<Utc>::UNIX_EPOCH;
        let store = MemoryStore::new();
        let user = User::from_config(SIM_WALLET, now, &self.config.energy);
        let max_energy = user.max_energy.max(dungeon.energy_cost);
        let user = user.with_energy(max_energy, max_energy);
        let hero = Character::new(
            SIM_CHARACTER,
            SIM_WALLET,
            "Simulated Hero",
            StatVector::new(10, 10, 10, 10, 10),
        )
        .with_level(level);
        store.seed(user, vec![hero])?;
        let service = DungeonService::new(self.catalog.clone(), self.config.clone(), store)
            .with_clock(FixedClock(now))
            .with_seed(master_seed);

        let entered = service.enter_dungeon(
            &dungeon.id,
            &EnterRequest {
                wallet_address: SIM_WALLET.to_string(),
                character_id: None,
            },
        )?;
        let mut problems = Vec::new();
        if entered.energy_remaining + dungeon.energy_cost != max_energy {
            problems.push(format!(
                "iteration {iteration}: energy {} after entry, expected {}",
                entered.energy_remaining,
                max_energy - dungeon.energy_cost
            ));
        }
        if !entered.events.last().is_some_and(|e| e.kind == EventKind::Boss) {
            problems.push(format!("iteration {iteration}: final event is not a boss"));
        }

        let mut hp = (100_u32, 100_u32);
        let mut reports: Vec<FloorReport> = Vec::with_capacity(entered.events.len());
        for event in &entered.events {
            let action = policy.choose(event.kind, hp.0, hp.1);
            let response = service.act(
                &dungeon.id,
                &ActionRequest {
                    wallet_address: SIM_WALLET.to_string(),
                    character_id: None,
                    action,
                },
            )?;
            hp = (response.report.hp, response.report.max_hp);
            let defeated = response.report.defeated;
            reports.push(response.report);
            if defeated {
                break;
            }
        }

        let success = reports.last().is_some_and(|r| r.cleared && !r.defeated);
        let before = service
            .store()
            .user(SIM_WALLET)?
            .context("simulated user vanished")?;
        let done = service.complete_dungeon(&CompleteRequest {
            wallet_address: SIM_WALLET.to_string(),
            dungeon_id: dungeon.id.clone(),
            success,
            character_id: None,
        })?;

        let gold = done.user.gold - before.gold;
        let exp = done.rewards.map_or(0, |r| r.exp);
        if let Some(rewards) = done.rewards
            && !(dungeon.rewards.gold_min..=dungeon.rewards.gold_max).contains(&rewards.gold)
        {
            problems.push(format!(
                "iteration {iteration}: completion gold {} outside [{}, {}]",
                rewards.gold, dungeon.rewards.gold_min, dungeon.rewards.gold_max
            ));
        }
        if gold != done.rewards.map_or(0, |r| r.gold) {
            problems.push(format!(
                "iteration {iteration}: credited {gold} gold, completion roll was {:?}",
                done.rewards
            ));
        }
        let last_hp = reports.last().map_or(done.character.max_hp, |r| r.hp);
        if done.character_level.levels_gained == 0 && done.character.hp != last_hp.max(1) {
            problems.push(format!(
                "iteration {iteration}: character hp {} after a run that ended at {last_hp}",
                done.character.hp
            ));
        }

        let (fights_won, fights_lost) = reports
            .iter()
            .filter_map(|r| r.entry.as_ref().and_then(|e| e.outcome))
            .fold((0, 0), |(won, lost), outcome| {
                if outcome.attacker_won() {
                    (won + 1, lost)
                } else {
                    (won, lost + 1)
                }
            });
        debug!(
            "Simulation | {} iteration {} {:?} gold {} exp {}",
            dungeon.id, iteration, done.status, gold, exp
        );

        Ok((
            RunRecord {
                iteration,
                status: done.status,
                events: reports.len(),
                fights_won,
                fights_lost,
                gold,
                exp,
                level_ups: done.character_level.levels_gained,
                fingerprint: done.fingerprint,
            },
            problems,
        ))
    }
}

#[allow(clippy::cast_precision_loss)]
fn summarize(
    plan: &SimulationPlan,
    level: u32,
    runs: Vec<RunRecord>,
    failures: Vec<String>,
    duration: Duration,
) -> BatchResult {
    let count = runs.len().max(1) as f64;
    let cleared = runs
        .iter()
        .filter(|r| r.status == RunStatus::Completed)
        .count();
    let total_gold: u64 = runs.iter().map(|r| r.gold).sum();
    let total_exp: u64 = runs.iter().map(|r| r.exp).sum();
    let distinct_fingerprints = runs
        .iter()
        .map(|r| r.fingerprint)
        .collect::<HashSet<_>>()
        .len();
    BatchResult {
        dungeon_id: plan.dungeon_id.clone(),
        seed: plan.seed,
        policy: plan.policy,
        character_level: level,
        passed: failures.is_empty() && runs.len() == plan.iterations,
        clear_rate: cleared as f64 / count,
        average_gold: total_gold as f64 / count,
        average_exp: total_exp as f64 / count,
        level_ups: runs.iter().map(|r| r.level_ups).sum(),
        distinct_fingerprints,
        runs,
        failures,
        duration,
    }
}

/// Resolve `--dungeons` tokens against the catalog; `all` expands to every
/// active dungeon.
pub fn resolve_dungeons(catalog: &DungeonCatalog, tokens: &[String]) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for token in tokens {
        if token.eq_ignore_ascii_case("all") {
            ids.extend(catalog.list(true).into_iter().map(|d| d.id.clone()));
        } else if catalog.get(token).is_ok() {
            ids.push(token.clone());
        } else {
            bail!("Unknown dungeon: {token}");
        }
    }
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator() -> Simulator {
        Simulator::new(
            DungeonCatalog::load_default().unwrap(),
            EngineConfig::default(),
            false,
        )
    }

    fn plan(policy: Policy, iterations: usize) -> SimulationPlan {
        SimulationPlan {
            dungeon_id: String::from("mossy-cellar"),
            seed: 1337,
            iterations,
            level: None,
            policy,
        }
    }

    #[test]
    fn fight_policy_runs_clean_batches() {
        let result = simulator().run(&plan(Policy::Fight, 5)).unwrap();
        assert!(result.passed, "{:?}", result.failures);
        assert_eq!(result.runs.len(), 5);
        assert!((0.0..=1.0).contains(&result.clear_rate));
        assert!(result.distinct_fingerprints >= 1);
    }

    #[test]
    fn batches_are_reproducible() {
        let a = simulator().run(&plan(Policy::Cautious, 3)).unwrap();
        let b = simulator().run(&plan(Policy::Cautious, 3)).unwrap();
        assert_eq!(a.runs, b.runs);
    }

    #[test]
    fn level_below_gate_reports_failures() {
        let mut p = plan(Policy::Fight, 2);
        p.dungeon_id = String::from("goblin-warrens");
        p.level = Some(1);
        let result = simulator().run(&p).unwrap();
        assert!(!result.passed);
        assert!(result.runs.is_empty());
        assert!(result.failures[0].contains("level too low"));
    }

    #[test]
    fn cautious_policy_flees_traps_and_low_health_fights() {
        assert_eq!(
            Policy::Cautious.choose(EventKind::Trap, 100, 100),
            FloorAction::Flee
        );
        assert_eq!(
            Policy::Cautious.choose(EventKind::Combat, 40, 100),
            FloorAction::Flee
        );
        assert_eq!(
            Policy::Cautious.choose(EventKind::Boss, 60, 100),
            FloorAction::Fight
        );
        assert_eq!(Policy::Fight.choose(EventKind::Trap, 1, 100), FloorAction::Fight);
        assert_eq!(
            Policy::Cautious.choose(EventKind::Treasure, 10, 100),
            FloorAction::Loot
        );
    }

    #[test]
    fn dungeon_tokens_expand_and_dedupe() {
        let catalog = DungeonCatalog::load_default().unwrap();
        let ids = resolve_dungeons(
            &catalog,
            &[String::from("mossy-cellar"), String::from("all")],
        )
        .unwrap();
        assert_eq!(ids[0], "mossy-cellar");
        assert_eq!(ids.len(), catalog.list(true).len());
        assert!(resolve_dungeons(&catalog, &[String::from("nowhere")]).is_err());
    }
}
