//! Seedable randomness shared by encounter generation, combat, and rewards.
//!
//! Every draw in the engine consumes exactly one `next_u64` from the injected
//! source and maps it to a unit float in `[0, 1)`. That single rule keeps runs
//! replayable: a stream can be rebuilt from its seed plus a draw count.
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::constants::{STREAM_COMBAT, STREAM_ENCOUNTER, STREAM_REWARD};
use crate::numbers::unit_to_index;

/// Draw a unit float in `[0, 1)`.
pub fn unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.r#gen::<f64>()
}

/// Draw a float in `[low, high)`; a degenerate range returns `low`.
pub fn uniform_between<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    let draw = unit(rng);
    if high <= low {
        return low;
    }
    low + draw * (high - low)
}

/// Pick a uniformly random element, or `None` for an empty slice.
pub fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let idx = unit_to_index(unit(rng), items.len())?;
    items.get(idx)
}

/// Number of draws performed against each stream of a [`RngBundle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDraws {
    pub encounter: u64,
    pub combat: u64,
    pub reward: u64,
}

/// Deterministic bundle of RNG streams segregated by engine domain.
#[derive(Debug, Clone)]
pub struct RngBundle {
    encounter: CountingRng<ChaCha20Rng>,
    combat: CountingRng<ChaCha20Rng>,
    reward: CountingRng<ChaCha20Rng>,
}

impl RngBundle {
    /// Construct the bundle from a run seed.
    #[must_use]
    pub fn from_run_seed(seed: u64) -> Self {
        Self {
            encounter: CountingRng::new(derive_stream_seed(seed, STREAM_ENCOUNTER)),
            combat: CountingRng::new(derive_stream_seed(seed, STREAM_COMBAT)),
            reward: CountingRng::new(derive_stream_seed(seed, STREAM_REWARD)),
        }
    }

    /// Rebuild the bundle for a run that already consumed `draws`.
    #[must_use]
    pub fn resume(seed: u64, draws: StreamDraws) -> Self {
        let mut bundle = Self::from_run_seed(seed);
        bundle.encounter.skip(draws.encounter);
        bundle.combat.skip(draws.combat);
        bundle.reward.skip(draws.reward);
        bundle
    }

    /// Access the encounter RNG stream.
    pub fn encounter(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.encounter
    }

    /// Access the combat RNG stream.
    pub fn combat(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.combat
    }

    /// Access the reward RNG stream.
    pub fn reward(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.reward
    }

    #[must_use]
    pub const fn draws(&self) -> StreamDraws {
        StreamDraws {
            encounter: self.encounter.draws(),
            combat: self.combat.draws(),
            reward: self.reward.draws(),
        }
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<ChaCha20Rng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    fn skip(&mut self, draws: u64) {
        for _ in 0..draws {
            let _ = self.next_u64();
        }
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Replays a fixed sequence of unit draws.
///
/// Each value is encoded so that `rng.gen::<f64>()` returns it exactly when it
/// is a multiple of `2^-53` (0.5, 0.25, 0.125, ...). The sequence wraps once
/// exhausted. Useful for pinning combat and reward outcomes in tests and for
/// replaying externally sourced rolls.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    values: Vec<u64>,
    cursor: usize,
}

impl ScriptedRng {
    const PRECISION_BITS: u32 = 53;

    #[must_use]
    pub fn new(units: &[f64]) -> Self {
        let scale = (1u64 << Self::PRECISION_BITS) as f64;
        let values = units
            .iter()
            .map(|u| {
                let clamped = u.clamp(0.0, 1.0 - f64::EPSILON);
                let mantissa = crate::numbers::floor_f64_to_u64(clamped * scale);
                mantissa << (64 - Self::PRECISION_BITS)
            })
            .collect();
        Self { values, cursor: 0 }
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        if self.values.is_empty() {
            return 0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor = self.cursor.wrapping_add(1);
        value
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn derive_stream_seed(run_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&run_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}
