//! Dungeon Run Engine
//!
//! Dungeon runs and combat resolution for a wallet-owned RPG: floor-by-floor
//! encounter generation, single-roll combat, loot and completion rewards,
//! character and account progression, and energy/gold bookkeeping.
//! Persistence is abstracted behind [`GameStore`]; [`DungeonService`] exposes
//! the boundary operations and [`envelope`] shapes their JSON responses.

pub mod combat;
pub mod config;
pub mod constants;
pub mod data;
pub mod encounters;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod numbers;
pub mod progression;
pub mod records;
pub mod rewards;
pub mod rng;
pub mod service;
pub mod session;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use combat::{BattleLogEntry, CombatOutcome, Side, resolve};
pub use config::{ConfigError, EnergyConfig, EngineConfig, ProgressionConfig};
pub use data::{
    BossRewards, BossTemplate, CatalogError, Difficulty, Dungeon, DungeonCatalog, EffectList,
    EventEffect, EventKind, EventTemplate, Rarity, RarityWeight, RewardRange,
};
pub use encounters::{FloorDraw, FloorEvent, generate_run, next_event};
pub use envelope::{Envelope, respond};
pub use error::{EngineError, Entity, Result};
pub use ledger::{BalanceDelta, apply_delta, credit, debit_energy, refill_energy};
pub use progression::{LevelUpReport, apply_exp, settle_account_level};
pub use records::{Character, User};
pub use rewards::{LootKind, LootReward, RunRewards, boss_drops, completion_rewards, roll_rarity};
pub use rng::{CountingRng, RngBundle, ScriptedRng, StreamDraws};
pub use service::{
    AbandonRequest, AbandonResponse, ActionRequest, ActionResponse, Clock, CompleteRequest,
    CompleteResponse, DungeonList, DungeonService, DungeonSummary, EnterRequest, EnterResponse,
    FixedClock, SystemClock, normalize_wallet,
};
pub use session::{CharacterSnapshot, FloorAction, FloorReport, RunSession, RunStatus};
pub use stats::StatVector;
pub use store::{Commit, GameStore, KeyedLocks, MemoryStore, StoreError};
