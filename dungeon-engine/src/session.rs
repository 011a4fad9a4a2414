//! Run state machine: one character's attempt at a dungeon.
//!
//! A run moves `NotStarted -> InProgress -> {Completed, Failed, Abandoned}`.
//! Every event is generated when the run starts; each action resolves the
//! event under the cursor. Randomness comes from an [`RngBundle`] rebuilt from
//! the run seed and the draw counts recorded on the session, so a stored run
//! resumes exactly where it stopped.
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;
use twox_hash::XxHash64;

use crate::combat::{self, BattleLogEntry};
use crate::constants::{
    KNOCKED_OUT_HP, LOG_MERCHANT, LOG_QUIET_FLOOR, LOG_REST, LOG_TRAP, LOG_TREASURE,
};
use crate::data::{Dungeon, EventEffect, EventKind};
use crate::encounters::{FloorEvent, generate_run};
use crate::error::{EngineError, Result};
use crate::ledger::debit_energy;
use crate::records::{Character, User};
use crate::rewards::{LootKind, LootReward, RunRewards, boss_drops, completion_rewards};
use crate::rng::{RngBundle, StreamDraws};
use crate::stats::StatVector;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
    Abandoned,
}

impl RunStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

/// What the player does with the event under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorAction {
    Fight,
    Flee,
    Loot,
    Rest,
}

impl FloorAction {
    pub const ALL: [Self; 4] = [Self::Fight, Self::Flee, Self::Loot, Self::Rest];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fight => "fight",
            Self::Flee => "flee",
            Self::Loot => "loot",
            Self::Rest => "rest",
        }
    }

    /// Whether this action can resolve an event of `kind`.
    ///
    /// Fleeing always works. Quiet floors and traps accept anything.
    #[must_use]
    pub const fn applies_to(self, kind: EventKind) -> bool {
        match (self, kind) {
            (Self::Flee, _) | (_, EventKind::Quiet | EventKind::Trap) => true,
            (Self::Fight, EventKind::Combat | EventKind::Boss) => true,
            (Self::Loot, EventKind::Treasure | EventKind::Merchant) => true,
            (Self::Rest, EventKind::Rest) => true,
            _ => false,
        }
    }

    /// The action a player engaging with `kind` would normally take.
    #[must_use]
    pub const fn engage(kind: EventKind) -> Self {
        match kind {
            EventKind::Combat | EventKind::Boss | EventKind::Trap | EventKind::Quiet => Self::Fight,
            EventKind::Treasure | EventKind::Merchant => Self::Loot,
            EventKind::Rest => Self::Rest,
        }
    }
}

impl fmt::Display for FloorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FloorAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::validation(format!("unknown action: {s}")))
    }
}

/// Character state frozen at entry; hit points then move with the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSnapshot {
    pub level: u32,
    pub stats: StatVector,
    pub hp: u32,
    pub max_hp: u32,
}

impl CharacterSnapshot {
    #[must_use]
    pub const fn of(character: &Character) -> Self {
        Self {
            level: character.level,
            stats: character.stats,
            hp: character.hp,
            max_hp: character.max_hp,
        }
    }

    fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    fn heal(&mut self, amount: u32) {
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
    }

    #[must_use]
    pub const fn is_defeated(&self) -> bool {
        self.hp == 0
    }
}

/// Result of resolving one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorReport {
    pub floor: u32,
    pub event: FloorEvent,
    pub action: FloorAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<BattleLogEntry>,
    #[serde(default)]
    pub loot: Vec<LootReward>,
    pub hp: u32,
    pub max_hp: u32,
    /// Hit points ran out; the run should be reported as failed.
    pub defeated: bool,
    /// Every event has been resolved.
    pub cleared: bool,
    pub current_floor: u32,
}

/// A character's attempt at a dungeon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSession {
    pub id: String,
    pub dungeon_id: String,
    pub character_id: String,
    pub wallet_address: String,
    pub seed: u64,
    pub status: RunStatus,
    /// Floor of the next unresolved event; `floor_count + 1` once cleared.
    pub current_floor: u32,
    pub floor_count: u32,
    pub snapshot: CharacterSnapshot,
    #[serde(default)]
    pub events: Vec<FloorEvent>,
    #[serde(default)]
    pub cursor: usize,
    #[serde(default)]
    pub battle_log: Vec<BattleLogEntry>,
    #[serde(default)]
    pub loot: Vec<LootReward>,
    #[serde(default)]
    pub total_gold: u64,
    #[serde(default)]
    pub total_exp: u64,
    /// Completion rewards, set only when the run completes successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<RunRewards>,
    #[serde(default)]
    pub draws: StreamDraws,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSession {
    /// A run that has not been entered yet.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        dungeon: &Dungeon,
        character: &Character,
        seed: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            dungeon_id: dungeon.id.clone(),
            character_id: character.id.clone(),
            wallet_address: character.wallet_address.clone(),
            seed,
            status: RunStatus::NotStarted,
            current_floor: 1,
            floor_count: dungeon.floor_count,
            snapshot: CharacterSnapshot::of(character),
            events: Vec::new(),
            cursor: 0,
            battle_log: Vec::new(),
            loot: Vec::new(),
            total_gold: 0,
            total_exp: 0,
            completion: None,
            draws: StreamDraws::default(),
            started_at: now,
            finished_at: None,
        }
    }

    /// Enter the dungeon: check the level gate, spend energy, and generate
    /// every event of the run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LevelTooLow`] or
    /// [`EngineError::InsufficientEnergy`] with `user` untouched, or a
    /// validation error if the run was already started.
    pub fn start(&mut self, dungeon: &Dungeon, user: &mut User) -> Result<()> {
        if self.status != RunStatus::NotStarted {
            return Err(EngineError::validation("run has already been started"));
        }
        if self.dungeon_id != dungeon.id {
            return Err(EngineError::validation(format!(
                "run belongs to dungeon {}",
                self.dungeon_id
            )));
        }
        if self.snapshot.level < dungeon.min_level {
            return Err(EngineError::LevelTooLow {
                required: dungeon.min_level,
                actual: self.snapshot.level,
            });
        }
        debit_energy(user, dungeon.energy_cost)?;

        let mut rng = RngBundle::from_run_seed(self.seed);
        self.events = generate_run(dungeon, rng.encounter());
        self.draws = rng.draws();
        self.status = RunStatus::InProgress;
        self.current_floor = self.floor_pointer();
        info!(
            "Run | {} entered {} with character {} ({} events)",
            self.wallet_address,
            dungeon.id,
            self.character_id,
            self.events.len()
        );
        Ok(())
    }

    /// The event the next action resolves.
    #[must_use]
    pub fn current_event(&self) -> Option<&FloorEvent> {
        self.events.get(self.cursor)
    }

    /// Whether every generated event has been resolved.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.cursor >= self.events.len()
    }

    /// Gold and experience picked up from events so far.
    #[must_use]
    pub const fn collected(&self) -> RunRewards {
        RunRewards {
            gold: self.total_gold,
            exp: self.total_exp,
        }
    }

    /// What the run credits to balances: the completion roll of a completed
    /// run, nothing otherwise. Collected loot stays on the run record.
    #[must_use]
    pub fn payout(&self) -> RunRewards {
        self.completion.unwrap_or_default()
    }

    /// Carry the run's hit points back onto the character. A defeated
    /// character is left knocked out rather than at zero.
    pub fn settle_hp(&self, character: &mut Character) {
        character.hp = self.snapshot.hp.max(KNOCKED_OUT_HP);
        character.clamp();
    }

    /// Resolve the event under the cursor with `action` and advance.
    ///
    /// Fleeing skips the event without a log entry or reward. Any other
    /// action engages it: combat is rolled, effects apply, loot is collected.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the run is not in progress, every
    /// event is resolved, the character is defeated, or the action does not
    /// fit the event.
    pub fn resolve(&mut self, action: FloorAction, dungeon: &Dungeon) -> Result<FloorReport> {
        self.ensure_in_progress()?;
        if self.snapshot.is_defeated() {
            return Err(EngineError::validation(
                "character is defeated; the run can only be failed or abandoned",
            ));
        }
        let event = self
            .current_event()
            .cloned()
            .ok_or_else(|| EngineError::validation("every floor has been resolved"))?;
        if !action.applies_to(event.kind) {
            return Err(EngineError::validation(format!(
                "cannot {action} on a {:?} floor",
                event.kind
            )));
        }

        let mut rng = RngBundle::resume(self.seed, self.draws);
        let (entry, loot) = match action {
            FloorAction::Flee => (None, Vec::new()),
            _ => self.engage(&event, dungeon, &mut rng),
        };
        self.draws = rng.draws();

        for reward in &loot {
            self.tally(reward);
        }
        self.loot.extend(loot.iter().cloned());
        if let Some(entry) = &entry {
            self.battle_log.push(entry.clone());
        }
        self.cursor += 1;
        self.current_floor = self.floor_pointer();
        debug!(
            "Run | {} floor {} {} {} -> hp {}",
            self.id, event.floor, action, event.name, self.snapshot.hp
        );

        Ok(FloorReport {
            floor: event.floor,
            event,
            action,
            entry,
            loot,
            hp: self.snapshot.hp,
            max_hp: self.snapshot.max_hp,
            defeated: self.snapshot.is_defeated(),
            cleared: self.is_cleared(),
            current_floor: self.current_floor,
        })
    }

    /// Mark the run completed and roll completion rewards.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the run is in progress, every event
    /// is resolved, and the character is still standing.
    pub fn complete(&mut self, dungeon: &Dungeon, now: DateTime<Utc>) -> Result<RunRewards> {
        self.ensure_in_progress()?;
        if !self.is_cleared() {
            return Err(EngineError::validation(format!(
                "{} of {} events are still unresolved",
                self.events.len() - self.cursor,
                self.events.len()
            )));
        }
        if self.snapshot.is_defeated() {
            return Err(EngineError::validation(
                "a defeated character cannot complete the run",
            ));
        }

        let mut rng = RngBundle::resume(self.seed, self.draws);
        let rewards = completion_rewards(&dungeon.rewards, rng.reward());
        self.draws = rng.draws();
        self.completion = Some(rewards);
        self.finish(RunStatus::Completed, now);
        Ok(rewards)
    }

    /// Mark the run failed. Collected loot stays on the record; nothing is
    /// credited.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the run is in progress.
    pub fn fail(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_in_progress()?;
        self.finish(RunStatus::Failed, now);
        Ok(())
    }

    /// Give up on the run. Nothing is credited.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless the run is in progress.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_in_progress()?;
        self.finish(RunStatus::Abandoned, now);
        Ok(())
    }

    /// Hash of the generated events and the battle log, for replay checks.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&self.seed.to_le_bytes());
        if let Ok(bytes) = serde_json::to_vec(&(&self.events, &self.battle_log)) {
            hasher.write(&bytes);
        }
        hasher.finish()
    }

    fn ensure_in_progress(&self) -> Result<()> {
        if self.status == RunStatus::InProgress {
            Ok(())
        } else {
            Err(EngineError::validation(format!(
                "run {} is {:?}, not in progress",
                self.id, self.status
            )))
        }
    }

    fn finish(&mut self, status: RunStatus, now: DateTime<Utc>) {
        self.status = status;
        self.finished_at = Some(now);
        info!(
            "Run | {} {:?} after {} of {} events",
            self.id,
            status,
            self.cursor,
            self.events.len()
        );
    }

    fn floor_pointer(&self) -> u32 {
        self.current_event()
            .map_or(self.floor_count.saturating_add(1), |event| event.floor)
    }

    fn tally(&mut self, reward: &LootReward) {
        let amount = reward.amount.unwrap_or(0);
        match reward.kind {
            LootKind::Gold => self.total_gold = self.total_gold.saturating_add(amount),
            LootKind::Exp => self.total_exp = self.total_exp.saturating_add(amount),
            LootKind::Equipment | LootKind::Item => {}
        }
    }

    fn engage(
        &mut self,
        event: &FloorEvent,
        dungeon: &Dungeon,
        rng: &mut RngBundle,
    ) -> (Option<BattleLogEntry>, Vec<LootReward>) {
        let key = match event.kind {
            EventKind::Combat | EventKind::Boss => return self.fight(event, dungeon, rng),
            EventKind::Quiet => LOG_QUIET_FLOOR,
            EventKind::Treasure => LOG_TREASURE,
            EventKind::Merchant => LOG_MERCHANT,
            EventKind::Trap => LOG_TRAP,
            EventKind::Rest => LOG_REST,
        };
        let loot = self.apply_effects(event);
        let entry = BattleLogEntry::note(
            event.floor,
            event.kind,
            event.name.clone(),
            key,
            self.snapshot.hp,
        );
        (Some(entry), loot)
    }

    fn fight(
        &mut self,
        event: &FloorEvent,
        dungeon: &Dungeon,
        rng: &mut RngBundle,
    ) -> (Option<BattleLogEntry>, Vec<LootReward>) {
        let enemy = event.enemy.unwrap_or_default();
        let outcome = combat::resolve(&self.snapshot.stats, &enemy, rng.combat());
        let mut loot = Vec::new();
        if outcome.attacker_won() {
            loot = self.apply_effects(event);
            if let Some(rewards) = event.boss_rewards {
                loot.extend(boss_drops(
                    &event.name,
                    rewards,
                    &dungeon.loot_table,
                    rng.reward(),
                ));
            }
        } else {
            self.snapshot.take_damage(outcome.damage);
        }
        let entry = BattleLogEntry::combat(
            event.floor,
            event.kind,
            event.name.clone(),
            outcome,
            self.snapshot.hp,
        );
        (Some(entry), loot)
    }

    fn apply_effects(&mut self, event: &FloorEvent) -> Vec<LootReward> {
        let mut loot = Vec::new();
        for effect in &event.effects {
            match effect {
                EventEffect::Heal { amount } => self.snapshot.heal(*amount),
                EventEffect::Damage { amount } => self.snapshot.take_damage(*amount),
                other => loot.extend(LootReward::from_effect(other)),
            }
        }
        loot
    }
}
