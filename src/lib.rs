//! # Mafia Coordinator
//!
//! Off-chain coordination server for on-chain Mafia: secret roles,
//! discussion turns, detective investigations and win proofs.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MAFIA COORDINATOR                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── address.rs  - 20-byte addresses, room/day ids           │
//! │  ├── rng.rs      - LCG speaker-order shuffle                 │
//! │  ├── hash.rs     - Keccak-256, selectors, EIP-191 digests    │
//! │  └── clock.rs    - Injectable wall clock                     │
//! │                                                              │
//! │  game/           - Pure rules                                │
//! │  ├── role.rs     - Roles and revealed secrets                │
//! │  ├── discussion.rs - Turn scheduler (advance_if_due)         │
//! │  └── win.rs      - Tally, win rule, night summary            │
//! │                                                              │
//! │  store/          - Hash + TTL key-value persistence          │
//! │  chain/          - Read-only game contract, log search       │
//! │  auth.rs         - Signature checks, delegate keys           │
//! │  proof/          - Groth16 proving and verifier calldata     │
//! │  service/        - One handler per client operation          │
//! │                                                              │
//! │  network/        - WebSocket transport                       │
//! │  ├── server.rs   - Accept loop, per-request dispatch         │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Trust Model
//!
//! The contract owns phase, membership and liveness. The coordinator
//! never writes to it. What the coordinator adds is the secret layer:
//! roles are only disclosed after an on-chain action proves the caller
//! is entitled to them, and a win is only declared from a complete
//! snapshot of alive players' secrets.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod auth;
pub mod chain;
pub mod core;
pub mod error;
pub mod game;
pub mod network;
pub mod proof;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use crate::core::address::{Address, DayCount, RoomId};
pub use crate::core::rng::speaker_order;
pub use crate::error::{CoordError, CoordResult};
pub use crate::game::{DiscussionState, PlayerSecret, Role, WinResult};
pub use crate::service::{Coordinator, CoordinatorConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
