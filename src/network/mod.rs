//! Network Layer
//!
//! WebSocket server exposing the coordinator operations.
//! All game decisions run through `service/`; this layer only moves frames.

pub mod protocol;
pub mod server;

pub use protocol::{
    ClientEnvelope, ClientMessage, DiscussionActionRequest, DiscussionQuery, ErrorCode, RejectedFrame, RoomQuery,
    ServerEnvelope, ServerError, ServerMessage,
};
pub use server::{handle_request, CoordinatorServer, CoordinatorServerError, ServerConfig};
