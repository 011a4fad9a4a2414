//! Boundary operations: list, enter, act, complete, and abandon.
//!
//! Each mutating operation holds the wallet's lock across
//! read-validate-commit and writes through a single [`GameStore::commit`],
//! so two concurrent entries can never both debit energy or both start a run.
use chrono::{DateTime, Utc};
use log::{info, warn};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, OnceLock};

use crate::config::EngineConfig;
use crate::constants::WALLET_PATTERN;
use crate::data::{Difficulty, Dungeon, DungeonCatalog, RewardRange};
use crate::encounters::FloorEvent;
use crate::error::{EngineError, Entity, Result};
use crate::ledger;
use crate::progression::{LevelUpReport, apply_exp, settle_account_level};
use crate::records::{Character, User};
use crate::rewards::{LootReward, RunRewards};
use crate::session::{FloorAction, FloorReport, RunSession, RunStatus};
use crate::store::{Commit, GameStore, KeyedLocks, StoreError};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterRequest {
    pub wallet_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub wallet_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    pub action: FloorAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub wallet_address: String,
    pub dungeon_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonRequest {
    pub wallet_address: String,
    pub dungeon_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

/// Public view of a dungeon; event and boss tables stay server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonSummary {
    pub id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub min_level: u32,
    pub max_level: u32,
    pub energy_cost: u32,
    pub floor_count: u32,
    pub rewards: RewardRange,
}

impl From<&Dungeon> for DungeonSummary {
    fn from(dungeon: &Dungeon) -> Self {
        Self {
            id: dungeon.id.clone(),
            name: dungeon.name.clone(),
            difficulty: dungeon.difficulty,
            min_level: dungeon.min_level,
            max_level: dungeon.max_level,
            energy_cost: dungeon.energy_cost,
            floor_count: dungeon.floor_count,
            rewards: dungeon.rewards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonList {
    pub dungeons: Vec<DungeonSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterResponse {
    pub run_id: String,
    pub dungeon_id: String,
    pub character_id: String,
    pub status: RunStatus,
    pub current_floor: u32,
    pub energy_remaining: u32,
    pub events: Vec<FloorEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub run_id: String,
    pub report: FloorReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub run_id: String,
    pub status: RunStatus,
    /// Completion rewards; absent for failed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<RunRewards>,
    /// Gold and experience picked up along the way. Recorded on the run,
    /// not credited.
    pub collected: RunRewards,
    pub loot: Vec<LootReward>,
    pub character_level: LevelUpReport,
    pub account_level: LevelUpReport,
    pub user: User,
    pub character: Character,
    pub fingerprint: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonResponse {
    pub run_id: String,
    pub status: RunStatus,
}

fn wallet_regex() -> &'static Regex {
    static WALLET: OnceLock<Regex> = OnceLock::new();
    WALLET.get_or_init(|| Regex::new(WALLET_PATTERN).expect("wallet pattern compiles"))
}

/// Check a wallet address and return its canonical lowercase form.
///
/// # Errors
///
/// Returns a validation error unless the address is `0x` plus 40 hex digits.
pub fn normalize_wallet(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if wallet_regex().is_match(trimmed) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(EngineError::validation(format!(
            "invalid wallet address: {raw:?}"
        )))
    }
}

/// Dungeon operations over a catalog and a store.
pub struct DungeonService<S, C = SystemClock> {
    catalog: DungeonCatalog,
    config: EngineConfig,
    store: S,
    clock: C,
    locks: KeyedLocks,
    seeds: Mutex<ChaCha20Rng>,
}

impl<S: GameStore> DungeonService<S, SystemClock> {
    /// Service on the wall clock with run seeds drawn from OS entropy.
    #[must_use]
    pub fn new(catalog: DungeonCatalog, config: EngineConfig, store: S) -> Self {
        Self {
            catalog,
            config,
            store,
            clock: SystemClock,
            locks: KeyedLocks::new(),
            seeds: Mutex::new(ChaCha20Rng::from_entropy()),
        }
    }
}

impl<S: GameStore, C: Clock> DungeonService<S, C> {
    /// Swap the clock.
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> DungeonService<S, C2> {
        DungeonService {
            catalog: self.catalog,
            config: self.config,
            store: self.store,
            clock,
            locks: self.locks,
            seeds: self.seeds,
        }
    }

    /// Draw run seeds from a fixed master seed so runs are reproducible.
    #[must_use]
    pub fn with_seed(mut self, master_seed: u64) -> Self {
        self.seeds = Mutex::new(ChaCha20Rng::seed_from_u64(master_seed));
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn catalog(&self) -> &DungeonCatalog {
        &self.catalog
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Active dungeons, in catalog order.
    #[must_use]
    pub fn list_dungeons(&self) -> DungeonList {
        DungeonList {
            dungeons: self
                .catalog
                .list(true)
                .into_iter()
                .map(DungeonSummary::from)
                .collect(),
        }
    }

    /// Start a run: refill energy if due, check the level gate, debit energy,
    /// and generate every event of the run.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown dungeon, user, or character,
    /// `LevelTooLow`, `InsufficientEnergy`, `RunAlreadyActive`, or a
    /// validation error for a bad wallet or closed dungeon.
    pub fn enter_dungeon(&self, dungeon_id: &str, request: &EnterRequest) -> Result<EnterResponse> {
        self.enter_inner(dungeon_id, request).inspect_err(|err| {
            warn!(
                "Dungeon | enter {} rejected for {}: {}",
                dungeon_id, request.wallet_address, err
            );
        })
    }

    fn enter_inner(&self, dungeon_id: &str, request: &EnterRequest) -> Result<EnterResponse> {
        let wallet = normalize_wallet(&request.wallet_address)?;
        let dungeon = self.catalog.get(dungeon_id)?;
        if !dungeon.active {
            return Err(EngineError::validation(format!(
                "dungeon {dungeon_id} is closed"
            )));
        }

        let lock = self.locks.handle(&wallet)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut user = self.load_user(&wallet)?;
        let character = self.load_character(&wallet, request.character_id.as_deref())?;
        if self.store.active_run(&character.id)?.is_some() {
            return Err(EngineError::RunAlreadyActive {
                character_id: character.id,
            });
        }

        let now = self.clock.now();
        if ledger::refill_energy(&mut user, now, self.config.energy.refill_interval_secs) {
            info!("Dungeon | {} energy refilled to {}", wallet, user.energy);
        }

        let seed = self.next_seed()?;
        let mut run = RunSession::new(format!("run-{seed:016x}"), dungeon, &character, seed, now);
        run.start(dungeon, &mut user)?;

        let user = self.store.commit(Commit::user(user).with_run(run.clone()))?;
        Ok(EnterResponse {
            run_id: run.id,
            dungeon_id: run.dungeon_id,
            character_id: run.character_id,
            status: run.status,
            current_floor: run.current_floor,
            energy_remaining: user.energy,
            events: run.events,
        })
    }

    /// Resolve the current event of the character's run in `dungeon_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown records, or a validation error when no
    /// run is in progress there or the action does not fit the event.
    pub fn act(&self, dungeon_id: &str, request: &ActionRequest) -> Result<ActionResponse> {
        self.act_inner(dungeon_id, request).inspect_err(|err| {
            warn!(
                "Dungeon | {} in {} rejected for {}: {}",
                request.action, dungeon_id, request.wallet_address, err
            );
        })
    }

    fn act_inner(&self, dungeon_id: &str, request: &ActionRequest) -> Result<ActionResponse> {
        let wallet = normalize_wallet(&request.wallet_address)?;
        let dungeon = self.catalog.get(dungeon_id)?;

        let lock = self.locks.handle(&wallet)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let user = self.load_user(&wallet)?;
        let character = self.load_character(&wallet, request.character_id.as_deref())?;
        let mut run = self.load_active_run(&character, dungeon_id)?;

        let report = run.resolve(request.action, dungeon)?;
        self.store.commit(Commit::user(user).with_run(run.clone()))?;
        Ok(ActionResponse {
            run_id: run.id,
            report,
        })
    }

    /// Finish the character's run.
    ///
    /// Success requires every event to be resolved; it rolls completion
    /// rewards, credits them to the account, and feeds the experience into
    /// character and account progression. Failure only marks the run failed;
    /// its collected loot stays on the run record. Either way the run's hit
    /// points are written back to the character.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown records, or a validation error when no
    /// run is in progress or success is reported for an unfinished run.
    pub fn complete_dungeon(&self, request: &CompleteRequest) -> Result<CompleteResponse> {
        self.complete_inner(request).inspect_err(|err| {
            warn!(
                "Dungeon | complete {} rejected for {}: {}",
                request.dungeon_id, request.wallet_address, err
            );
        })
    }

    fn complete_inner(&self, request: &CompleteRequest) -> Result<CompleteResponse> {
        let wallet = normalize_wallet(&request.wallet_address)?;
        let dungeon = self.catalog.get(&request.dungeon_id)?;

        let lock = self.locks.handle(&wallet)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut user = self.load_user(&wallet)?;
        let mut character = self.load_character(&wallet, request.character_id.as_deref())?;
        let mut run = self.load_active_run(&character, &request.dungeon_id)?;

        let now = self.clock.now();
        let rewards = if request.success {
            Some(run.complete(dungeon, now)?)
        } else {
            run.fail(now)?;
            None
        };

        let payout = run.payout();
        run.settle_hp(&mut character);
        let character_level = apply_exp(&mut character, payout.exp, &self.config.progression);
        ledger::credit(&mut user, payout);
        let account_level = settle_account_level(&mut user, &self.config.progression);

        let user = self.store.commit(
            Commit::user(user)
                .with_character(character.clone())
                .with_run(run.clone()),
        )?;
        info!(
            "Dungeon | {} {:?} {} (+{} gold, +{} exp)",
            wallet, run.status, dungeon.id, payout.gold, payout.exp
        );

        Ok(CompleteResponse {
            fingerprint: run.fingerprint(),
            run_id: run.id,
            status: run.status,
            rewards,
            collected: RunRewards {
                gold: run.total_gold,
                exp: run.total_exp,
            },
            loot: run.loot,
            character_level,
            account_level,
            user,
            character,
        })
    }

    /// Give up on the character's run. Nothing is credited or refunded;
    /// damage taken so far stays on the character.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown records, or a validation error when no
    /// run is in progress in that dungeon.
    pub fn abandon_dungeon(&self, request: &AbandonRequest) -> Result<AbandonResponse> {
        self.abandon_inner(request).inspect_err(|err| {
            warn!(
                "Dungeon | abandon {} rejected for {}: {}",
                request.dungeon_id, request.wallet_address, err
            );
        })
    }

    fn abandon_inner(&self, request: &AbandonRequest) -> Result<AbandonResponse> {
        let wallet = normalize_wallet(&request.wallet_address)?;
        self.catalog.get(&request.dungeon_id)?;

        let lock = self.locks.handle(&wallet)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let user = self.load_user(&wallet)?;
        let mut character = self.load_character(&wallet, request.character_id.as_deref())?;
        let mut run = self.load_active_run(&character, &request.dungeon_id)?;
        run.abandon(self.clock.now())?;
        run.settle_hp(&mut character);
        self.store.commit(
            Commit::user(user)
                .with_character(character)
                .with_run(run.clone()),
        )?;
        Ok(AbandonResponse {
            run_id: run.id,
            status: run.status,
        })
    }

    fn load_user(&self, wallet: &str) -> Result<User> {
        self.store
            .user(wallet)?
            .ok_or_else(|| EngineError::not_found(Entity::User, wallet))
    }

    /// The requested character, or the wallet's first one when none is named.
    /// A character owned by another wallet is reported as missing.
    fn load_character(&self, wallet: &str, character_id: Option<&str>) -> Result<Character> {
        match character_id {
            Some(id) => self
                .store
                .character(id)?
                .filter(|character| character.wallet_address == wallet)
                .ok_or_else(|| EngineError::not_found(Entity::Character, id)),
            None => self
                .store
                .characters_for_wallet(wallet)?
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::not_found(Entity::Character, wallet)),
        }
    }

    fn load_active_run(&self, character: &Character, dungeon_id: &str) -> Result<RunSession> {
        let run = self
            .store
            .active_run(&character.id)?
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "character {} has no run in progress",
                    character.id
                ))
            })?;
        if run.dungeon_id != dungeon_id {
            return Err(EngineError::validation(format!(
                "character {} is in dungeon {}, not {}",
                character.id, run.dungeon_id, dungeon_id
            )));
        }
        Ok(run)
    }

    fn next_seed(&self) -> Result<u64> {
        let mut seeds = self.seeds.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(seeds.next_u64())
    }
}
