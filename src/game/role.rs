//! Roles and Secrets
//!
//! Role values as committed on-chain and the off-chain `(role, salt)`
//! secret each player reveals to the coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoordError;

/// Player role, using the contract's numeric encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Role {
    /// Kills at night, wins on parity.
    Mafia = 1,
    /// Protects one player per night.
    Doctor = 2,
    /// Investigates one player per night.
    Detective = 3,
    /// No night action.
    Civilian = 4,
}

impl Role {
    /// All valid roles.
    pub const ALL: [Role; 4] = [Role::Mafia, Role::Doctor, Role::Detective, Role::Civilian];

    /// Numeric wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Mafia-aligned?
    pub fn is_mafia(self) -> bool {
        matches!(self, Role::Mafia)
    }

    /// Does this role submit a night reveal for the town?
    pub fn acts_at_night_for_town(self) -> bool {
        matches!(self, Role::Doctor | Role::Detective)
    }

    /// Upper-case name used in API responses.
    pub fn name(self) -> &'static str {
        match self {
            Role::Mafia => "MAFIA",
            Role::Doctor => "DOCTOR",
            Role::Detective => "DETECTIVE",
            Role::Civilian => "CIVILIAN",
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = CoordError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::Mafia),
            2 => Ok(Role::Doctor),
            3 => Ok(Role::Detective),
            4 => Ok(Role::Civilian),
            other => Err(CoordError::validation(format!("invalid role value {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A player's revealed secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSecret {
    /// Role the player committed to.
    pub role: Role,
    /// Salt used in the on-chain commitment.
    pub salt: String,
}

impl PlayerSecret {
    /// Validate raw request fields into a secret.
    pub fn parse(role: u8, salt: &str) -> Result<Self, CoordError> {
        let role = Role::try_from(role)?;
        if salt.is_empty() {
            return Err(CoordError::validation("salt is required"));
        }
        Ok(Self { role, salt: salt.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_roles() {
        for role in Role::ALL {
            assert_eq!(Role::try_from(role.as_u8()).unwrap(), role);
        }
    }

    #[test]
    fn test_invalid_roles_rejected() {
        assert!(matches!(Role::try_from(0), Err(CoordError::Validation(_))));
        assert!(matches!(Role::try_from(5), Err(CoordError::Validation(_))));
    }

    #[test]
    fn test_secret_requires_salt() {
        assert!(PlayerSecret::parse(1, "").is_err());
        let secret = PlayerSecret::parse(3, "s4lt").unwrap();
        assert_eq!(secret.role, Role::Detective);
    }

    #[test]
    fn test_alignment_helpers() {
        assert!(Role::Mafia.is_mafia());
        assert!(!Role::Civilian.is_mafia());
        assert!(Role::Doctor.acts_at_night_for_town());
        assert!(!Role::Civilian.acts_at_night_for_town());
        assert_eq!(Role::Detective.to_string(), "DETECTIVE");
    }
}
