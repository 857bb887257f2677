//! Protocol Messages
//!
//! Wire format for client-coordinator communication over WebSocket.
//! Every frame is a JSON object with a snake_case `type` tag, camelCase
//! fields and an optional `id` echoed back on the reply so clients can
//! match responses to requests.

use serde::{Deserialize, Serialize};

use crate::core::address::{Address, DayCount, RoomId};
use crate::error::CoordError;
use crate::game::NightSummary;
use crate::service::{
    DiscussionAction, DiscussionView, InvestigateRequest, InvestigateResponse, RevealSecretRequest,
    RevealSecretResponse, WinCheckResponse,
};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Requests sent from client to coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Read the day's discussion.
    GetDiscussionState(DiscussionQuery),

    /// Start the discussion or skip a speaker.
    DiscussionAction(DiscussionActionRequest),

    /// Reveal a role secret.
    RevealSecret(RevealSecretRequest),

    /// Detective investigation.
    Investigate(InvestigateRequest),

    /// Expected night reveals.
    NightSummary(RoomQuery),

    /// Win check and proof.
    CheckWin(RoomQuery),

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp (ms), echoed back.
        timestamp: u64,
    },
}

/// Discussion read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionQuery {
    /// Room.
    pub room_id: RoomId,
    /// Day, defaulting to the on-chain counter.
    #[serde(default)]
    pub day_count: Option<DayCount>,
    /// Caller, for `isMyTurn`.
    #[serde(default)]
    pub player_address: Option<Address>,
}

/// Discussion mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionActionRequest {
    /// Room.
    pub room_id: RoomId,
    /// Day, defaulting to the on-chain counter.
    #[serde(default)]
    pub day_count: Option<DayCount>,
    /// `start` or `skip`.
    pub action: DiscussionAction,
    /// Caller.
    pub player_address: Address,
}

/// Request naming only a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQuery {
    /// Room.
    pub room_id: RoomId,
}

/// Client frame: optional correlation id plus the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    /// Correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The request.
    #[serde(flatten)]
    pub message: ClientMessage,
}

impl ClientEnvelope {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Parse an incoming frame, keeping the `id` for the error reply.
    ///
    /// Text that is not a JSON object, or names no known `type`, is an
    /// invalid message. A known request with missing or out-of-range
    /// fields is a validation error.
    pub fn parse(text: &str) -> Result<Self, RejectedFrame> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| RejectedFrame {
            id: None,
            error: ServerError::invalid_message(e.to_string()),
        })?;
        let id = value.get("id").and_then(|v| v.as_str()).map(str::to_owned);
        let known = value
            .get("type")
            .and_then(|t| t.as_str())
            .is_some_and(ClientMessage::is_known_type);

        serde_json::from_value(value).map_err(|e| {
            let error = if known {
                ServerError::validation(e.to_string())
            } else {
                ServerError::invalid_message(e.to_string())
            };
            RejectedFrame { id, error }
        })
    }
}

impl ClientMessage {
    /// Every request `type` tag.
    pub const TYPES: [&'static str; 7] = [
        "get_discussion_state",
        "discussion_action",
        "reveal_secret",
        "investigate",
        "night_summary",
        "check_win",
        "ping",
    ];

    /// Whether `tag` names a request.
    pub fn is_known_type(tag: &str) -> bool {
        Self::TYPES.contains(&tag)
    }
}

/// A frame that could not become a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFrame {
    /// The frame's `id`, when it had a readable one.
    pub id: Option<String>,
    /// What to send back.
    pub error: ServerError,
}

impl RejectedFrame {
    /// The error reply, carrying the frame's `id`.
    pub fn into_envelope(self) -> ServerEnvelope {
        ServerEnvelope {
            id: self.id,
            message: ServerMessage::Error(self.error),
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Replies sent from coordinator to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to `get_discussion_state` and `discussion_action`.
    DiscussionState(DiscussionView),

    /// Reply to `reveal_secret`.
    SecretStored(RevealSecretResponse),

    /// Reply to `investigate`.
    InvestigationResult(InvestigateResponse),

    /// Reply to `night_summary`.
    NightSummary(NightSummary),

    /// Reply to `check_win`.
    WinCheck(WinCheckResponse),

    /// Reply to `ping`.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Coordinator time (ms).
        #[serde(rename = "serverTime")]
        server_time: u64,
    },

    /// Request failed.
    Error(ServerError),

    /// Server is going away.
    Shutdown {
        /// Why.
        reason: String,
    },
}

/// Server frame: the request's id (if any) plus the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    /// Correlation id copied from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The reply.
    #[serde(flatten)]
    pub message: ServerMessage,
}

impl ServerEnvelope {
    /// Reply with no correlation id.
    pub fn unsolicited(message: ServerMessage) -> Self {
        Self { id: None, message }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Machine-readable kind.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error kinds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed fields or invalid role.
    ValidationError,
    /// Signature mismatch.
    AuthenticationError,
    /// Not allowed: wrong speaker, unverified on-chain action.
    AuthorizationError,
    /// Missing secret, room or discussion.
    NotFound,
    /// Proof generation overran.
    Timeout,
    /// Chain unreachable; retry later.
    TransientChainError,
    /// Store failure.
    StorageError,
    /// Proof backend failure.
    ProofError,
    /// Frame is not JSON or names no known request.
    InvalidMessage,
}

impl ServerError {
    /// Known request with missing or malformed fields.
    pub fn validation(detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationError,
            message: detail.into(),
        }
    }

    /// Unparseable frame.
    pub fn invalid_message(detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidMessage,
            message: detail.into(),
        }
    }
}

impl From<&CoordError> for ServerError {
    fn from(err: &CoordError) -> Self {
        let code = match err {
            CoordError::Validation(_) => ErrorCode::ValidationError,
            CoordError::Authentication(_) => ErrorCode::AuthenticationError,
            CoordError::Authorization(_) => ErrorCode::AuthorizationError,
            CoordError::NotFound(_) => ErrorCode::NotFound,
            CoordError::Timeout(_) => ErrorCode::Timeout,
            CoordError::TransientChain(_) => ErrorCode::TransientChainError,
            CoordError::Storage(_) => ErrorCode::StorageError,
            CoordError::Proof(_) => ErrorCode::ProofError,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::game::{DiscussionPhase, WinResult};
    use crate::proof::ProofCalldata;

    #[test]
    fn test_parse_discussion_query() {
        let envelope = ClientEnvelope::from_json(
            r#"{"id":"r1","type":"get_discussion_state","roomId":12,"playerAddress":"0x0202020202020202020202020202020202020202"}"#,
        )
        .unwrap();

        assert_eq!(envelope.id.as_deref(), Some("r1"));
        match envelope.message {
            ClientMessage::GetDiscussionState(query) => {
                assert_eq!(query.room_id, 12);
                assert_eq!(query.day_count, None);
                assert_eq!(query.player_address, Some(Address::new([2; 20])));
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_parse_action_and_investigate() {
        let action = ClientEnvelope::from_json(
            r#"{"type":"discussion_action","roomId":3,"dayCount":2,"action":"skip","playerAddress":"0x0101010101010101010101010101010101010101"}"#,
        )
        .unwrap();
        assert!(matches!(
            action.message,
            ClientMessage::DiscussionAction(DiscussionActionRequest { action: DiscussionAction::Skip, day_count: Some(2), .. })
        ));

        let investigate = ClientEnvelope::from_json(
            r#"{"type":"investigate","roomId":3,"detectiveAddress":"0x0101010101010101010101010101010101010101","targetAddress":"0x0202020202020202020202020202020202020202","signature":"0xab"}"#,
        )
        .unwrap();
        match investigate.message {
            ClientMessage::Investigate(request) => {
                assert_eq!(request.target_address, Address::new([2; 20]));
                assert_eq!(request.delegate_address, None);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(ClientEnvelope::from_json(r#"{"type":"vote","roomId":1}"#).is_err());
        assert!(ClientEnvelope::from_json(r#"{"type":"check_win"}"#).is_err());
    }

    const ALICE: &str = "0x0101010101010101010101010101010101010101";

    #[test]
    fn test_parse_bad_fields_is_validation_error() {
        let missing_salt = format!(
            r#"{{"id":"s1","type":"reveal_secret","roomId":1,"address":"{}","role":2,"signature":"0xab"}}"#,
            ALICE
        );
        let rejected = ClientEnvelope::parse(&missing_salt).unwrap_err();
        assert_eq!(rejected.id.as_deref(), Some("s1"));
        assert_eq!(rejected.error.code, ErrorCode::ValidationError);

        let big_role = format!(
            r#"{{"id":"s2","type":"reveal_secret","roomId":1,"address":"{}","role":300,"salt":"x","signature":"0xab"}}"#,
            ALICE
        );
        let rejected = ClientEnvelope::parse(&big_role).unwrap_err();
        assert_eq!(rejected.id.as_deref(), Some("s2"));
        assert_eq!(rejected.error.code, ErrorCode::ValidationError);

        let bad_room = r#"{"id":"s3","type":"check_win","roomId":"seven"}"#;
        assert_eq!(ClientEnvelope::parse(bad_room).unwrap_err().error.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_parse_unknown_frames_are_invalid_messages() {
        let rejected = ClientEnvelope::parse("not json").unwrap_err();
        assert_eq!(rejected.id, None);
        assert_eq!(rejected.error.code, ErrorCode::InvalidMessage);

        let rejected = ClientEnvelope::parse(r#"{"id":"v1","type":"vote","roomId":1}"#).unwrap_err();
        assert_eq!(rejected.id.as_deref(), Some("v1"));
        assert_eq!(rejected.error.code, ErrorCode::InvalidMessage);

        let rejected = ClientEnvelope::parse(r#"{"roomId":1}"#).unwrap_err();
        assert_eq!(rejected.error.code, ErrorCode::InvalidMessage);

        let envelope = ClientEnvelope::parse(r#"{"id":"p","type":"ping","timestamp":3}"#).unwrap();
        assert_eq!(envelope.message, ClientMessage::Ping { timestamp: 3 });
    }

    #[test]
    fn test_known_types_match_serde_tags() {
        let samples = [
            ClientMessage::NightSummary(RoomQuery { room_id: 1 }),
            ClientMessage::CheckWin(RoomQuery { room_id: 1 }),
            ClientMessage::Ping { timestamp: 0 },
        ];
        for message in samples {
            let json = serde_json::to_value(&message).unwrap();
            assert!(ClientMessage::is_known_type(json["type"].as_str().unwrap()));
        }
    }

    #[test]
    fn test_server_envelope_shape() {
        let envelope = ServerEnvelope {
            id: Some("r9".into()),
            message: ServerMessage::WinCheck(WinCheckResponse::win(
                WinResult::MafiaWin,
                ProofCalldata {
                    a: ["1".into(), "2".into()],
                    b: [["3".into(), "4".into()], ["5".into(), "6".into()]],
                    c: ["7".into(), "8".into()],
                    inputs: vec!["9".into(), "2".into(), "2".into()],
                },
            )),
        };

        let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(json["id"], "r9");
        assert_eq!(json["type"], "win_check");
        assert_eq!(json["winDetected"], true);
        assert_eq!(json["result"], "MAFIA_WIN");
        assert_eq!(json["formattedProof"]["b"][1][0], "5");
    }

    #[test]
    fn test_server_message_roundtrip() {
        let view = DiscussionView {
            phase: Some(DiscussionPhase::Speaking),
            current_speaker_index: Some(1),
            ..DiscussionView::not_started(4)
        };
        let envelope = ServerEnvelope::unsolicited(ServerMessage::DiscussionState(view.clone()));
        let parsed = ServerEnvelope::from_json(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(parsed.message, ServerMessage::DiscussionState(view));
        assert_eq!(parsed.id, None);
    }

    #[test]
    fn test_error_codes() {
        let cases = [
            (CoordError::validation("x"), "validation_error"),
            (CoordError::Authentication("x".into()), "authentication_error"),
            (CoordError::unauthorized("x"), "authorization_error"),
            (CoordError::not_found("x"), "not_found"),
            (CoordError::Timeout(Duration::from_secs(30)), "timeout"),
            (CoordError::TransientChain("x".into()), "transient_chain_error"),
            (CoordError::Storage("x".into()), "storage_error"),
            (CoordError::Proof("x".into()), "proof_error"),
        ];
        for (err, expected) in cases {
            let json = serde_json::to_value(ServerError::from(&err)).unwrap();
            assert_eq!(json["code"], expected);
        }
    }
}
