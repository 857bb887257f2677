//! Discussion Turn Scheduler
//!
//! Pure state machine for the day-time discussion:
//! `initial_delay -> speaking(0) -> speaking(1) -> ... -> finished`.
//!
//! There is no background timer. Every handler calls [`advance_if_due`]
//! with the current time before reading or writing, so the state catches
//! up lazily and redundant calls from racing clients are harmless.

use serde::{Deserialize, Serialize};

use crate::error::CoordError;

/// Minimum time between two transitions. Absorbs duplicate advance calls.
pub const MIN_ADVANCE_INTERVAL_MS: u64 = 1_500;

/// Discussion phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionPhase {
    /// Short pause before the first speaker.
    InitialDelay,
    /// A speaker holds the floor.
    Speaking,
    /// Everyone has spoken.
    Finished,
}

/// Timer configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscussionTiming {
    /// Pause before the first speaker (ms).
    pub delay_ms: u64,
    /// Time each speaker gets (ms).
    pub speaker_ms: u64,
}

impl Default for DiscussionTiming {
    fn default() -> Self {
        Self {
            delay_ms: 5_000,
            speaker_ms: 60_000,
        }
    }
}

/// Persisted discussion state for one `(room, day)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionState {
    /// Index into the speaker order.
    pub current_speaker_index: u32,
    /// When the current speaker started (ms).
    pub speaker_start_time: u64,
    /// Time allotted per speaker (ms).
    pub speaker_duration: u64,
    /// Current phase.
    pub phase: DiscussionPhase,
    /// When the initial delay started (ms).
    pub delay_start_time: u64,
    /// Length of the initial delay (ms).
    pub delay_duration: u64,
}

impl DiscussionState {
    /// Fresh discussion entering the initial delay at `now`.
    pub fn start(now: u64, timing: DiscussionTiming) -> Self {
        Self {
            current_speaker_index: 0,
            speaker_start_time: 0,
            speaker_duration: timing.speaker_ms,
            phase: DiscussionPhase::InitialDelay,
            delay_start_time: now,
            delay_duration: timing.delay_ms,
        }
    }

    /// Timestamp of the most recent transition.
    pub fn last_transition(&self) -> u64 {
        match self.phase {
            DiscussionPhase::InitialDelay => self.delay_start_time,
            DiscussionPhase::Speaking | DiscussionPhase::Finished => self.speaker_start_time,
        }
    }

    /// Is the discussion over?
    pub fn is_finished(&self) -> bool {
        self.phase == DiscussionPhase::Finished
    }

    /// Whole seconds left in the current phase.
    ///
    /// Speaking rounds down, the initial delay rounds up, finished is 0.
    pub fn time_remaining(&self, now: u64) -> u64 {
        match self.phase {
            DiscussionPhase::Speaking => {
                let elapsed = now.saturating_sub(self.speaker_start_time);
                self.speaker_duration.saturating_sub(elapsed) / 1000
            }
            DiscussionPhase::InitialDelay => {
                let elapsed = now.saturating_sub(self.delay_start_time);
                let left = self.delay_duration.saturating_sub(elapsed);
                left.div_ceil(1000)
            }
            DiscussionPhase::Finished => 0,
        }
    }

    fn move_to_next_speaker(&self, now: u64, total_speakers: u32) -> Self {
        let mut next = self.clone();
        next.speaker_start_time = now;
        if self.current_speaker_index + 1 >= total_speakers {
            next.phase = DiscussionPhase::Finished;
        } else {
            next.current_speaker_index += 1;
        }
        next
    }
}

/// Advance the state by at most one step if its timer has expired.
///
/// Returns the input unchanged when nothing is due or when the last
/// transition happened less than [`MIN_ADVANCE_INTERVAL_MS`] ago.
pub fn advance_if_due(state: &DiscussionState, now: u64, total_speakers: u32) -> DiscussionState {
    // Speaker list shrank under us (a death mid-discussion)
    if state.phase == DiscussionPhase::Speaking && state.current_speaker_index >= total_speakers {
        let mut finished = state.clone();
        finished.phase = DiscussionPhase::Finished;
        finished.speaker_start_time = now;
        return finished;
    }

    let since_last = now.saturating_sub(state.last_transition());
    if since_last < MIN_ADVANCE_INTERVAL_MS {
        return state.clone();
    }

    match state.phase {
        DiscussionPhase::InitialDelay if since_last >= state.delay_duration => {
            let mut next = state.clone();
            next.current_speaker_index = 0;
            next.speaker_start_time = now;
            next.phase = if total_speakers == 0 {
                DiscussionPhase::Finished
            } else {
                DiscussionPhase::Speaking
            };
            next
        }
        DiscussionPhase::Speaking if since_last >= state.speaker_duration => {
            state.move_to_next_speaker(now, total_speakers)
        }
        _ => state.clone(),
    }
}

/// End the current speaker's turn early.
///
/// Authorization is the caller's job. Skips inside the guard window are
/// ignored, and skipping a finished discussion is a no-op.
pub fn skip(state: &DiscussionState, now: u64, total_speakers: u32) -> Result<DiscussionState, CoordError> {
    match state.phase {
        DiscussionPhase::InitialDelay => Err(CoordError::validation(
            "discussion has not reached the speaking phase",
        )),
        DiscussionPhase::Finished => Ok(state.clone()),
        DiscussionPhase::Speaking => {
            if now.saturating_sub(state.speaker_start_time) < MIN_ADVANCE_INTERVAL_MS {
                return Ok(state.clone());
            }
            Ok(state.move_to_next_speaker(now, total_speakers))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
