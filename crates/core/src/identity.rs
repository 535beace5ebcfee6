//! Identities, roles and the claims a validated session resolves to.

use crate::error::CoreError;
use clinic_ids::RecordId;
use clinic_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A capability set a user account may act under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    /// Every role, in a stable order.
    pub const ALL: [Role; 2] = [Role::Patient, Role::Doctor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PATIENT" => Ok(Role::Patient),
            "DOCTOR" => Ok(Role::Doctor),
            other => Err(CoreError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// A user account as seen by the session broker.
///
/// The permitted role set is fixed when the account is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: RecordId,
    pub email: EmailAddress,
    pub display_name: NonEmptyText,
    pub roles: BTreeSet<Role>,
}

impl Identity {
    pub fn permits(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// What a valid session token resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityClaim {
    pub user_id: RecordId,
    pub role: Role,
    pub email: EmailAddress,
    pub display_name: NonEmptyText,
}
