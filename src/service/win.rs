//! Win detection.
//!
//! Stateless: every call re-reads the chain and the secret snapshot, so a
//! failed or timed-out proof is retried simply by calling again.

use tracing::{debug, info, instrument, warn};

use super::types::WinCheckResponse;
use super::Coordinator;
use crate::chain::{alive_players, GameChain, RoomPhase};
use crate::core::address::RoomId;
use crate::error::CoordResult;
use crate::game::{decide, tally, WinDecision};
use crate::proof::{prove_with_timeout, CircuitInputs, ProofBackend};
use crate::store::KvStore;

impl<C: GameChain, K: KvStore, P: ProofBackend> Coordinator<C, K, P> {
    /// Decide whether a side has won and, if so, prove it.
    #[instrument(skip(self))]
    pub async fn check_win(&self, room_id: RoomId) -> CoordResult<WinCheckResponse> {
        let room = self.chain.room(room_id).await?;
        if room.phase.is_pre_game() {
            return Ok(WinCheckResponse::no_win("game has not started"));
        }
        if room.phase == RoomPhase::Ended {
            if let Err(e) = self.secrets.clear_room(room_id).await {
                warn!("Could not clear secrets of ended room {}: {}", room_id, e);
            }
            return Ok(WinCheckResponse::no_win("game has already ended"));
        }

        let alive = alive_players(self.chain.as_ref(), room_id).await?;
        let secrets = self.secrets.room_secrets(room_id).await?.unwrap_or_default();
        let counts = tally(&alive, &secrets);

        let result = match decide(&counts) {
            WinDecision::Pending { missing } => {
                debug!("{} alive players have no secret on file", missing.len());
                return Ok(WinCheckResponse::no_win("waiting for secrets to sync"));
            }
            WinDecision::Continue => {
                debug!("No winner: {} mafia vs {} town", counts.mafia, counts.town);
                return Ok(WinCheckResponse::no_win("game continues"));
            }
            WinDecision::Decided(result) => result,
        };

        info!(
            "Room {} decided {:?} ({} mafia, {} town), proving",
            room_id, result, counts.mafia, counts.town
        );
        let inputs = CircuitInputs::new(room_id, counts.mafia, counts.town);
        let calldata = prove_with_timeout(self.prover.as_ref(), &inputs, self.config.proof_timeout).await?;
        Ok(WinCheckResponse::win(result, calldata))
    }
}
