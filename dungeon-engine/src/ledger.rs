//! Gold, experience, and energy balance changes on user records.
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::records::User;
use crate::rewards::RunRewards;

/// Signed `$inc`-style change to a user's balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceDelta {
    #[serde(default)]
    pub gold: i64,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub energy: i64,
}

impl BalanceDelta {
    #[must_use]
    pub const fn energy(amount: i64) -> Self {
        Self {
            gold: 0,
            exp: 0,
            energy: amount,
        }
    }
}

fn apply_u64(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta.unsigned_abs())
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

fn apply_u32(value: u32, delta: i64) -> u32 {
    let next = apply_u64(u64::from(value), delta);
    u32::try_from(next).unwrap_or(u32::MAX)
}

/// Apply a delta to every balance, flooring each at zero.
pub fn apply_delta(user: &mut User, delta: &BalanceDelta) {
    user.gold = apply_u64(user.gold, delta.gold);
    user.exp = apply_u64(user.exp, delta.exp);
    user.energy = apply_u32(user.energy, delta.energy);
}

/// Spend `cost` energy, refusing before any mutation when the balance is short.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientEnergy`] when `energy < cost`.
pub fn debit_energy(user: &mut User, cost: u32) -> Result<(), EngineError> {
    if user.energy < cost {
        return Err(EngineError::InsufficientEnergy {
            required: cost,
            available: user.energy,
        });
    }
    user.energy -= cost;
    debug!(
        "Ledger | {} energy -{} -> {}",
        user.wallet_address, cost, user.energy
    );
    Ok(())
}

/// Credit run rewards. Additive, so never rejected.
pub fn credit(user: &mut User, rewards: RunRewards) {
    user.gold = user.gold.saturating_add(rewards.gold);
    user.exp = user.exp.saturating_add(rewards.exp);
    debug!(
        "Ledger | {} gold +{} exp +{}",
        user.wallet_address, rewards.gold, rewards.exp
    );
}

/// Refill energy to the maximum once `interval_secs` have passed since the
/// last reset. Returns whether a refill happened. A zero interval disables it.
pub fn refill_energy(user: &mut User, now: DateTime<Utc>, interval_secs: i64) -> bool {
    if interval_secs <= 0 {
        return false;
    }
    if now.signed_duration_since(user.last_energy_reset) < Duration::seconds(interval_secs) {
        return false;
    }
    user.energy = user.energy.max(user.max_energy);
    user.last_energy_reset = now;
    debug!(
        "Ledger | {} energy refilled to {}",
        user.wallet_address, user.energy
    );
    true
}
