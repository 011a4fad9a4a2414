//! Persistence contract and the in-memory reference store.
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

use crate::ledger::{BalanceDelta, apply_delta};
use crate::records::{Character, User};
use crate::session::{RunSession, RunStatus};

/// Failures raised by a [`GameStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store lock was poisoned")]
    LockPoisoned,
    #[error("user {wallet} changed concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        wallet: String,
        expected: u64,
        actual: u64,
    },
    #[error("character {character_id} already has a run in progress")]
    ActiveRunConflict { character_id: String },
    #[error("no user record for {0}")]
    MissingUser(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Records written together by [`GameStore::commit`].
#[derive(Debug, Clone)]
pub struct Commit {
    /// Written only if its `version` still matches the stored record.
    pub user: User,
    pub character: Option<Character>,
    pub run: Option<RunSession>,
}

impl Commit {
    #[must_use]
    pub const fn user(user: User) -> Self {
        Self {
            user,
            character: None,
            run: None,
        }
    }

    #[must_use]
    pub fn with_character(mut self, character: Character) -> Self {
        self.character = Some(character);
        self
    }

    #[must_use]
    pub fn with_run(mut self, run: RunSession) -> Self {
        self.run = Some(run);
        self
    }
}

/// Read/write contract the engine needs from persistence.
///
/// Implementations must be shareable across request threads.
pub trait GameStore: Send + Sync {
    /// Look up a user by wallet address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn user(&self, wallet: &str) -> StoreResult<Option<User>>;

    /// Look up a character by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn character(&self, id: &str) -> StoreResult<Option<Character>>;

    /// Characters owned by `wallet`, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn characters_for_wallet(&self, wallet: &str) -> StoreResult<Vec<Character>>;

    /// The in-progress run of a character, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn active_run(&self, character_id: &str) -> StoreResult<Option<RunSession>>;

    /// Look up any run by id, finished or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn run(&self, run_id: &str) -> StoreResult<Option<RunSession>>;

    /// Insert or replace a user without a version check.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn save_user(&self, user: &User) -> StoreResult<()>;

    /// Insert or replace a character.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn save_character(&self, character: &Character) -> StoreResult<()>;

    /// Apply a `$inc`-style delta to a user's balances, flooring at zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingUser`] when no record exists.
    fn increment(&self, wallet: &str, delta: &BalanceDelta) -> StoreResult<User>;

    /// Write a user, character, and run in one step.
    ///
    /// Nothing is written unless the user's version matches and no other
    /// run of the character is in progress. Returns the stored user with its
    /// version bumped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] or
    /// [`StoreError::ActiveRunConflict`] and leaves every record untouched.
    fn commit(&self, commit: Commit) -> StoreResult<User>;
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    characters: HashMap<String, Character>,
    character_order: Vec<String>,
    runs: HashMap<String, RunSession>,
    /// Character id to the id of its in-progress run.
    active: HashMap<String, String>,
}

impl Tables {
    fn put_character(&mut self, character: Character) {
        if !self.characters.contains_key(&character.id) {
            self.character_order.push(character.id.clone());
        }
        self.characters.insert(character.id.clone(), character);
    }

    fn conflicting_run(&self, run: &RunSession) -> bool {
        run.status == RunStatus::InProgress
            && self
                .active
                .get(&run.character_id)
                .is_some_and(|active_id| *active_id != run.id)
    }

    fn put_run(&mut self, run: RunSession) {
        if run.status == RunStatus::InProgress {
            self.active.insert(run.character_id.clone(), run.id.clone());
        } else if self.active.get(&run.character_id) == Some(&run.id) {
            self.active.remove(&run.character_id);
        }
        self.runs.insert(run.id.clone(), run);
    }
}

/// `RwLock`-guarded store keeping every record in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user and their characters.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn seed(&self, user: User, characters: Vec<Character>) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        tables.users.insert(user.wallet_address.clone(), user);
        for character in characters {
            tables.put_character(character);
        }
        Ok(())
    }

    /// Every stored run, for inspection.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn runs(&self) -> StoreResult<Vec<RunSession>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.runs.values().cloned().collect())
    }
}

impl GameStore for MemoryStore {
    fn user(&self, wallet: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.users.get(wallet).cloned())
    }

    fn character(&self, id: &str) -> StoreResult<Option<Character>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.characters.get(id).cloned())
    }

    fn characters_for_wallet(&self, wallet: &str) -> StoreResult<Vec<Character>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables
            .character_order
            .iter()
            .filter_map(|id| tables.characters.get(id))
            .filter(|character| character.wallet_address == wallet)
            .cloned()
            .collect())
    }

    fn active_run(&self, character_id: &str) -> StoreResult<Option<RunSession>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables
            .active
            .get(character_id)
            .and_then(|run_id| tables.runs.get(run_id))
            .cloned())
    }

    fn run(&self, run_id: &str) -> StoreResult<Option<RunSession>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.runs.get(run_id).cloned())
    }

    fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        tables.users.insert(user.wallet_address.clone(), user.clone());
        Ok(())
    }

    fn save_character(&self, character: &Character) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        tables.put_character(character.clone());
        Ok(())
    }

    fn increment(&self, wallet: &str, delta: &BalanceDelta) -> StoreResult<User> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let user = tables
            .users
            .get_mut(wallet)
            .ok_or_else(|| StoreError::MissingUser(wallet.to_string()))?;
        apply_delta(user, delta);
        user.version = user.version.wrapping_add(1);
        Ok(user.clone())
    }

    fn commit(&self, commit: Commit) -> StoreResult<User> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let wallet = commit.user.wallet_address.clone();
        let actual = tables.users.get(&wallet).map_or(0, |stored| stored.version);
        if actual != commit.user.version {
            return Err(StoreError::VersionConflict {
                wallet,
                expected: commit.user.version,
                actual,
            });
        }
        if let Some(run) = &commit.run
            && tables.conflicting_run(run)
        {
            return Err(StoreError::ActiveRunConflict {
                character_id: run.character_id.clone(),
            });
        }

        let mut user = commit.user;
        user.version = actual.wrapping_add(1);
        tables.users.insert(wallet.clone(), user.clone());
        if let Some(character) = commit.character {
            tables.put_character(character);
        }
        if let Some(run) = commit.run {
            tables.put_run(run);
        }
        debug!("Store | committed {} at version {}", wallet, user.version);
        Ok(user)
    }
}

/// One mutex per key, created on first use and dropped once idle.
///
/// Serializes read-validate-commit sequences for the same wallet while
/// leaving other wallets free to proceed.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn handle(&self, key: &str) -> StoreResult<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| StoreError::LockPoisoned)?;
        // Only the registry holds an idle entry; nobody can be waiting on it.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }
}
