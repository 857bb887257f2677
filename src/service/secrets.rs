//! Secret handlers: reveals, detective investigations and the night
//! summary.
//!
//! An investigation discloses a role only after the chain confirms the
//! detective actually targeted that player. Confirmation comes from the
//! event log first and the contract's reveal mapping second; either one
//! is enough.

use tracing::{debug, info, instrument, warn};

use super::types::{InvestigateRequest, InvestigateResponse, RevealSecretRequest, RevealSecretResponse};
use super::Coordinator;
use crate::auth::{authenticate, investigate_message, reveal_secret_message};
use crate::chain::{alive_players, search_reveal_event, GameChain};
use crate::core::address::{Address, RoomId};
use crate::error::{CoordError, CoordResult};
use crate::game::{night_summary, NightSummary, PlayerSecret};
use crate::proof::ProofBackend;
use crate::store::KvStore;

fn require_signature(signature: &str) -> CoordResult<()> {
    if signature.trim().is_empty() {
        return Err(CoordError::validation("signature is required"));
    }
    Ok(())
}

impl<C: GameChain, K: KvStore, P: ProofBackend> Coordinator<C, K, P> {
    /// Store a player's `(role, salt)` after checking their signature.
    ///
    /// The role value is validated before the signature, so an invalid
    /// role is rejected whatever was signed.
    #[instrument(skip(self, request), fields(room = request.room_id, player = %request.address))]
    pub async fn reveal_secret(&self, request: RevealSecretRequest) -> CoordResult<RevealSecretResponse> {
        let secret = PlayerSecret::parse(request.role, &request.salt)?;
        require_signature(&request.signature)?;

        let message = reveal_secret_message(request.room_id, request.role, &request.salt);
        let signer = authenticate(
            self.verifier.as_ref(),
            self.chain.as_ref(),
            self.clock.now_secs(),
            request.address,
            request.delegate_address,
            &message,
            &request.signature,
        )
        .await
        .map_err(|e| {
            warn!("Rejected secret reveal: {}", e);
            e
        })?;

        self.secrets
            .store_secret(request.room_id, request.address, &secret)
            .await?;
        info!("Secret stored ({:?} signer)", signer);
        Ok(RevealSecretResponse { success: true })
    }

    /// Tell a detective the role of the player they investigated on-chain.
    #[instrument(
        skip(self, request),
        fields(room = request.room_id, detective = %request.detective_address, target = %request.target_address)
    )]
    pub async fn investigate(&self, request: InvestigateRequest) -> CoordResult<InvestigateResponse> {
        require_signature(&request.signature)?;
        let room_id = request.room_id;
        let detective = request.detective_address;
        let target = request.target_address;

        let message = investigate_message(room_id, target);
        authenticate(
            self.verifier.as_ref(),
            self.chain.as_ref(),
            self.clock.now_secs(),
            detective,
            request.delegate_address,
            &message,
            &request.signature,
        )
        .await
        .map_err(|e| {
            warn!("Rejected investigation: {}", e);
            e
        })?;

        self.confirm_reveal(room_id, detective, target).await?;

        let secret = self
            .secrets
            .secret(room_id, target)
            .await?
            .ok_or_else(|| CoordError::not_found(format!("no secret stored for {}", target)))?;

        info!("Investigation confirmed");
        Ok(InvestigateResponse {
            success: true,
            role: secret.role,
            is_mafia: secret.role.is_mafia(),
        })
    }

    /// How many town and mafia night reveals to expect. Counts only.
    #[instrument(skip(self), level = "debug")]
    pub async fn night_summary(&self, room_id: RoomId) -> CoordResult<NightSummary> {
        self.chain.room(room_id).await?;
        let alive = alive_players(self.chain.as_ref(), room_id).await?;
        let secrets = self.secrets.room_secrets(room_id).await?.unwrap_or_default();
        Ok(night_summary(&alive, &secrets))
    }

    async fn confirm_reveal(&self, room_id: RoomId, detective: Address, target: Address) -> CoordResult<()> {
        let search_error =
            match search_reveal_event(self.chain.as_ref(), room_id, detective, target, self.config.log_search).await {
                Ok(event) => {
                    debug!("Reveal confirmed by event at block {}", event.block_number);
                    return Ok(());
                }
                Err(e) => e,
            };

        debug!("Event search failed ({}), reading reveal mapping", search_error);
        match self.chain.revealed_target(room_id, detective).await {
            Ok(Some(revealed)) if revealed == target => {
                debug!("Reveal confirmed by mapping");
                Ok(())
            }
            Ok(_) => {
                warn!("No on-chain reveal by {} targeting {}", detective, target);
                Err(CoordError::unauthorized("action not verified on-chain"))
            }
            Err(e) => {
                warn!("Could not verify reveal: {}; {}", search_error, e);
                Err(CoordError::TransientChain(format!(
                    "could not verify reveal: {}; {}",
                    search_error, e
                )))
            }
        }
    }
}
