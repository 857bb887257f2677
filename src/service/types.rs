//! Request and response payloads.
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::core::address::{Address, RoomId};
use crate::game::{DiscussionPhase, DiscussionState, Role, WinResult};
use crate::proof::ProofCalldata;

/// Discussion mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionAction {
    /// Open the discussion for the day.
    Start,
    /// End the current speaker's turn.
    Skip,
}

/// Discussion snapshot as seen by one caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionView {
    /// Started and not yet finished.
    pub active: bool,
    /// Everyone has spoken.
    pub finished: bool,
    /// Current phase, absent before start.
    pub phase: Option<DiscussionPhase>,
    /// Index into the speaker order while someone is speaking.
    pub current_speaker_index: Option<u32>,
    /// Address holding the floor.
    pub current_speaker_address: Option<Address>,
    /// Length of the speaker order.
    pub total_speakers: u32,
    /// Whole seconds left in the current phase.
    pub time_remaining: u64,
    /// Whether the caller holds the floor.
    pub is_my_turn: bool,
}

impl DiscussionView {
    /// View of a day whose discussion was never started.
    pub fn not_started(total_speakers: u32) -> Self {
        Self {
            active: false,
            finished: false,
            phase: None,
            current_speaker_index: None,
            current_speaker_address: None,
            total_speakers,
            time_remaining: 0,
            is_my_turn: false,
        }
    }

    /// Render `state` against the speaker order for `viewer`.
    pub fn render(state: &DiscussionState, order: &[Address], now: u64, viewer: Option<Address>) -> Self {
        let speaking = state.phase == DiscussionPhase::Speaking;
        let speaker = if speaking {
            order.get(state.current_speaker_index as usize).copied()
        } else {
            None
        };

        Self {
            active: !state.is_finished(),
            finished: state.is_finished(),
            phase: Some(state.phase),
            current_speaker_index: speaking.then_some(state.current_speaker_index),
            current_speaker_address: speaker,
            total_speakers: order.len() as u32,
            time_remaining: state.time_remaining(now),
            is_my_turn: speaker.is_some() && speaker == viewer,
        }
    }
}

/// Reveal of a player's role secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealSecretRequest {
    /// Room the secret belongs to.
    pub room_id: RoomId,
    /// Player revealing.
    pub address: Address,
    /// Raw role value; validated before anything else.
    pub role: u8,
    /// Commitment salt.
    pub salt: String,
    /// personal_sign over `reveal-secret:{room}:{role}:{salt}`.
    pub signature: String,
    /// Delegate key that produced the signature, if not the player.
    #[serde(default)]
    pub delegate_address: Option<Address>,
}

/// Reveal acknowledgement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealSecretResponse {
    /// Always true; failures are errors.
    pub success: bool,
}

/// Detective's request to learn a target's role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigateRequest {
    /// Room.
    pub room_id: RoomId,
    /// Acting detective.
    pub detective_address: Address,
    /// Investigated player.
    pub target_address: Address,
    /// personal_sign over `investigate:{room}:{target}`.
    pub signature: String,
    /// Delegate key that produced the signature, if not the detective.
    #[serde(default)]
    pub delegate_address: Option<Address>,
}

/// Investigation result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigateResponse {
    /// Always true; failures are errors.
    pub success: bool,
    /// Target's role.
    pub role: Role,
    /// Shorthand for `role == MAFIA`.
    pub is_mafia: bool,
}

/// Win check outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinCheckResponse {
    /// A side has won and a proof is attached.
    pub win_detected: bool,
    /// Winning side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<WinResult>,
    /// Verifier calldata for the win proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_proof: Option<ProofCalldata>,
    /// Why no win was reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WinCheckResponse {
    /// No win, with a reason.
    pub fn no_win(message: impl Into<String>) -> Self {
        Self {
            win_detected: false,
            result: None,
            formatted_proof: None,
            message: Some(message.into()),
        }
    }

    /// Win with its proof.
    pub fn win(result: WinResult, proof: ProofCalldata) -> Self {
        Self {
            win_detected: true,
            result: Some(result),
            formatted_proof: Some(proof),
            message: None,
        }
    }
}
