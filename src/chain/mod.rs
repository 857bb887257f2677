//! On-Chain Game Contract (read-only)
//!
//! The contract is the sole owner of phase, membership and liveness.
//! This layer only reads it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CHAIN ACCESS                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  mod.rs   - GameChain trait, room/phase/event types          │
//! │  logs.rs  - Chunked backward event search                    │
//! │  rpc.rs   - JSON-RPC over WebSocket implementation           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::address::{Address, DayCount, RoomId};

pub mod logs;
pub mod rpc;

pub use logs::{search_reveal_event, BlockRanges, LogSearchConfig, LogSearchError};
pub use rpc::{RpcChain, RpcConfig};

/// Chain access errors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport-level failure (connect, send, receive).
    #[error("transport error: {0}")]
    Transport(String),
    /// Node returned a JSON-RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },
    /// Response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// Room does not exist on-chain.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
}

/// Room phase as stored by the contract (`uint8`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RoomPhase {
    /// Waiting for players.
    Lobby = 0,
    /// Mental-poker role shuffle.
    Shuffling = 1,
    /// Players reveal their role keys.
    Reveal = 2,
    /// Day discussion.
    Day = 3,
    /// Day vote.
    Voting = 4,
    /// Night actions.
    Night = 5,
    /// Game over.
    Ended = 6,
}

impl RoomPhase {
    /// Before roles are settled: no win check is meaningful.
    pub fn is_pre_game(self) -> bool {
        matches!(self, RoomPhase::Lobby | RoomPhase::Shuffling | RoomPhase::Reveal)
    }
}

impl TryFrom<u8> for RoomPhase {
    type Error = ChainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => RoomPhase::Lobby,
            1 => RoomPhase::Shuffling,
            2 => RoomPhase::Reveal,
            3 => RoomPhase::Day,
            4 => RoomPhase::Voting,
            5 => RoomPhase::Night,
            6 => RoomPhase::Ended,
            other => return Err(ChainError::Decode(format!("unknown room phase {}", other))),
        })
    }
}

/// Room summary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomInfo {
    /// Room identifier.
    pub id: RoomId,
    /// Creator of the room; may skip any speaker.
    pub host: Address,
    /// Current phase.
    pub phase: RoomPhase,
    /// Current day counter.
    pub day_count: DayCount,
    /// Number of joined players.
    pub player_count: u32,
}

/// A detective reveal found in the event log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealEvent {
    /// Block the event was emitted in.
    pub block_number: u64,
    /// Acting detective.
    pub detective: Address,
    /// Investigated player.
    pub target: Address,
}

/// A delegate (session) key registered for a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelegateKey {
    /// Delegate address.
    pub key: Address,
    /// Unix seconds after which the key is no longer valid.
    pub expires_at: u64,
}

/// Read-only view of the game contract.
pub trait GameChain: Send + Sync + 'static {
    /// Room summary.
    fn room(&self, room_id: RoomId) -> impl Future<Output = Result<RoomInfo, ChainError>> + Send;

    /// All joined players, in contract order.
    fn players(&self, room_id: RoomId) -> impl Future<Output = Result<Vec<Address>, ChainError>> + Send;

    /// Liveness flag for one player.
    fn is_alive(&self, room_id: RoomId, player: Address) -> impl Future<Output = Result<bool, ChainError>> + Send;

    /// Latest block number.
    fn block_number(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Detective reveal events in an inclusive block range.
    fn reveal_events(
        &self,
        room_id: RoomId,
        detective: Address,
        from_block: u64,
        to_block: u64,
    ) -> impl Future<Output = Result<Vec<RevealEvent>, ChainError>> + Send;

    /// Current revealed-action mapping entry for a detective.
    fn revealed_target(
        &self,
        room_id: RoomId,
        detective: Address,
    ) -> impl Future<Output = Result<Option<Address>, ChainError>> + Send;

    /// Registered delegate key for a player, if any.
    fn delegate_of(&self, player: Address) -> impl Future<Output = Result<Option<DelegateKey>, ChainError>> + Send;
}

/// Alive players in contract order. Liveness flags are read concurrently.
pub async fn alive_players<C: GameChain>(chain: &C, room_id: RoomId) -> Result<Vec<Address>, ChainError> {
    let players = chain.players(room_id).await?;
    let flags = try_join_all(players.iter().map(|p| chain.is_alive(room_id, *p))).await?;
    Ok(players
        .into_iter()
        .zip(flags)
        .filter_map(|(p, alive)| alive.then_some(p))
        .collect())
}
