//! Win Conditions
//!
//! Tallies alive players against their revealed secrets.
//! A decision is only ever made from a complete snapshot: if any alive
//! player has no secret on file the result is `Pending`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::address::Address;
use crate::game::role::PlayerSecret;

/// Alive-player tally.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Alive mafia-aligned players.
    pub mafia: u32,
    /// Alive town-aligned players.
    pub town: u32,
    /// Alive players with no secret on file.
    pub missing: Vec<Address>,
}

/// Outcome of a finished game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinResult {
    /// All mafia eliminated.
    TownWin,
    /// Mafia reached parity.
    MafiaWin,
}

/// What the tally says about the game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WinDecision {
    /// Some alive players have not synced their secret yet.
    Pending {
        /// Addresses still missing.
        missing: Vec<Address>,
    },
    /// No side has won.
    Continue,
    /// Game over.
    Decided(WinResult),
}

/// Classify every alive player using the secret snapshot.
pub fn tally(alive: &[Address], secrets: &BTreeMap<Address, PlayerSecret>) -> Tally {
    let mut result = Tally::default();
    for player in alive {
        match secrets.get(player) {
            Some(secret) if secret.role.is_mafia() => result.mafia += 1,
            Some(_) => result.town += 1,
            None => result.missing.push(*player),
        }
    }
    result
}

/// Apply the win rule to a tally.
pub fn decide(tally: &Tally) -> WinDecision {
    if !tally.missing.is_empty() {
        return WinDecision::Pending {
            missing: tally.missing.clone(),
        };
    }
    if tally.mafia == 0 {
        WinDecision::Decided(WinResult::TownWin)
    } else if tally.mafia >= tally.town {
        WinDecision::Decided(WinResult::MafiaWin)
    } else {
        WinDecision::Continue
    }
}

/// Expected night reveals, counts only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightSummary {
    /// Alive doctors and detectives.
    pub expected_town_reveals: u32,
    /// Alive mafia.
    pub expected_mafia_reveals: u32,
}

/// Count expected night reveals among alive players with known roles.
pub fn night_summary(alive: &[Address], secrets: &BTreeMap<Address, PlayerSecret>) -> NightSummary {
    let mut summary = NightSummary::default();
    for secret in alive.iter().filter_map(|p| secrets.get(p)) {
        if secret.role.is_mafia() {
            summary.expected_mafia_reveals += 1;
        } else if secret.role.acts_at_night_for_town() {
            summary.expected_town_reveals += 1;
        }
    }
    summary
}
