//! Game Rules
//!
//! Pure, deterministic rules. No I/O, no system time.
//!
//! ## Module Structure
//!
//! - `role`: Roles and revealed secrets
//! - `discussion`: Day-time speaking turns
//! - `win`: Win tally, decision rule and night summary

pub mod discussion;
pub mod role;
pub mod win;

// Re-export key types
pub use discussion::{advance_if_due, skip, DiscussionPhase, DiscussionState, DiscussionTiming};
pub use role::{PlayerSecret, Role};
pub use win::{decide, night_summary, tally, NightSummary, Tally, WinDecision, WinResult};
