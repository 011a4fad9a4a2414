//! Centralized balance and tuning constants for the dungeon engine.
//!
//! These values define the deterministic math for combat, progression, and
//! energy. Runtime overrides go through [`crate::config::EngineConfig`]; the
//! constants here are its defaults.

// Combat power coefficients ------------------------------------------------
pub(crate) const POWER_STR_WEIGHT: f64 = 1.5;
pub(crate) const POWER_AGI_WEIGHT: f64 = 1.2;
pub(crate) const POWER_INT_WEIGHT: f64 = 1.3;
pub(crate) const POWER_LUK_WEIGHT: f64 = 0.8;

// Progression ----------------------------------------------------------------
pub(crate) const MAX_LEVEL: u32 = 100;
pub(crate) const EXP_PER_LEVEL: u64 = 100;
pub(crate) const LEVEL_UP_STR: u32 = 2;
pub(crate) const LEVEL_UP_AGI: u32 = 2;
pub(crate) const LEVEL_UP_INT: u32 = 2;
pub(crate) const LEVEL_UP_LUK: u32 = 1;
pub(crate) const LEVEL_UP_VIT: u32 = 2;
pub(crate) const LEVEL_UP_MAX_HP: u32 = 10;

// Character defaults ---------------------------------------------------------
pub(crate) const STARTING_LEVEL: u32 = 1;
pub(crate) const STARTING_MAX_HP: u32 = 100;
/// Hit points a character keeps after being defeated in a run.
pub(crate) const KNOCKED_OUT_HP: u32 = 1;

// Energy ---------------------------------------------------------------------
pub(crate) const DEFAULT_MAX_ENERGY: u32 = 100;
pub(crate) const ENERGY_REFILL_INTERVAL_SECS: i64 = 24 * 60 * 60;

// Stream tags for per-run RNG derivation --------------------------------------
pub(crate) const STREAM_ENCOUNTER: &[u8] = b"encounter";
pub(crate) const STREAM_COMBAT: &[u8] = b"combat";
pub(crate) const STREAM_REWARD: &[u8] = b"reward";

// Battle log keys ------------------------------------------------------------
pub(crate) const LOG_QUIET_FLOOR: &str = "log.floor.quiet";
pub(crate) const LOG_COMBAT_VICTORY: &str = "log.combat.victory";
pub(crate) const LOG_COMBAT_DEFEAT: &str = "log.combat.defeat";
pub(crate) const LOG_BOSS_VICTORY: &str = "log.boss.victory";
pub(crate) const LOG_BOSS_DEFEAT: &str = "log.boss.defeat";
pub(crate) const LOG_FLED: &str = "log.floor.fled";
pub(crate) const LOG_TREASURE: &str = "log.treasure.looted";
pub(crate) const LOG_MERCHANT: &str = "log.merchant.traded";
pub(crate) const LOG_TRAP: &str = "log.trap.sprung";
pub(crate) const LOG_REST: &str = "log.rest.recovered";

// Wallet addresses -----------------------------------------------------------
pub(crate) const WALLET_PATTERN: &str = "^0x[0-9a-fA-F]{40}$";
