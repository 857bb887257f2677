//! Core deterministic primitives.
//!
//! Everything here is pure and platform-independent: addresses,
//! hashing, the speaker-order shuffle and the injectable clock.

pub mod address;
pub mod clock;
pub mod hash;
pub mod rng;

// Re-export core types
pub use address::{Address, AddressError, DayCount, RoomId};
pub use clock::{Clock, SystemClock};
pub use hash::{keccak256, personal_message_hash, selector};
pub use rng::{speaker_order, speaker_seed, SpeakerRng};
