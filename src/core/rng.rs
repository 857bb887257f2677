//! Deterministic Speaker Shuffle
//!
//! Linear-congruential generator used to order discussion speakers.
//! Any client can recompute the same order from the room id and the
//! alive-player list, so the recurrence must never change.

use super::address::{Address, RoomId};

/// LCG multiplier.
pub const LCG_MULTIPLIER: u64 = 9301;
/// LCG increment.
pub const LCG_INCREMENT: u64 = 49297;
/// LCG modulus.
pub const LCG_MODULUS: u64 = 233280;

/// Seed space for room ids.
pub const SEED_MODULUS: u64 = 1_000_000;

/// Derive the shuffle seed for a room.
#[inline]
pub fn speaker_seed(room_id: RoomId) -> u64 {
    room_id % SEED_MODULUS
}

/// Non-cryptographic LCG: `s = (s * 9301 + 49297) mod 233280`.
///
/// # Example
///
/// ```
/// use mafia_coordinator::core::rng::SpeakerRng;
///
/// let mut rng = SpeakerRng::new(42);
/// assert_eq!(rng.next_state(), 206659);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeakerRng {
    state: u64,
}

impl SpeakerRng {
    /// Create from a raw seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Create from a room id.
    pub fn for_room(room_id: RoomId) -> Self {
        Self::new(speaker_seed(room_id))
    }

    /// Step the recurrence and return the new state.
    #[inline]
    pub fn next_state(&mut self) -> u64 {
        // seed < 1e6 and state < 233280 keep the product far below u64::MAX
        self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        self.state
    }

    /// Next value in `[0, 1)`, as an IEEE-754 double.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.next_state() as f64 / LCG_MODULUS as f64
    }

    /// Fisher-Yates shuffle in place, walking from the back.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = (self.next_f64() * (i + 1) as f64).floor() as usize;
            slice.swap(i, j);
        }
    }
}

/// Speaker order for a room's alive players.
///
/// Pure function of `(room_id, alive)`; input order matters and must be
/// the contract's player order.
pub fn speaker_order(room_id: RoomId, alive: &[Address]) -> Vec<Address> {
    let mut order = alive.to_vec();
    SpeakerRng::for_room(room_id).shuffle(&mut order);
    order
}

// =============================================================================
// TESTS
// =============================================================================
