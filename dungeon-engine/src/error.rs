//! Typed failures surfaced by engine operations.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

/// Kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Dungeon,
    User,
    Character,
}

impl Entity {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dungeon => "Dungeon",
            Self::User => "User",
            Self::Character => "Character",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every failure an engine operation can return.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("insufficient energy: {required} required, {available} available")]
    InsufficientEnergy { required: u32, available: u32 },
    #[error("level too low: level {required} required, character is level {actual}")]
    LevelTooLow { required: u32, actual: u32 },
    #[error("character {character_id} already has a dungeon run in progress")]
    RunAlreadyActive { character_id: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP-equivalent status for the boundary layer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) | Self::InsufficientEnergy { .. } | Self::LevelTooLow { .. } => 400,
            Self::RunAlreadyActive { .. } => 409,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code, e.g. `DungeonNotFound` or `LevelTooLow`.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => format!("{entity}NotFound"),
            Self::Validation(_) => String::from("ValidationError"),
            Self::InsufficientEnergy { .. } => String::from("InsufficientEnergy"),
            Self::LevelTooLow { .. } => String::from("LevelTooLow"),
            Self::RunAlreadyActive { .. } => String::from("RunAlreadyActive"),
            Self::Internal(_) => String::from("InternalError"),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
