use crate::identity::{IdentityClaim, Role};
use chrono::{DateTime, Utc};
use clinic_ids::{RecordId, TokenId};
use clinic_types::{EmailAddress, NonEmptyText};

/// A bearer credential scoped to one `(user, role)` pair.
///
/// Immutable once issued apart from `revoked`. The email and display name are snapshotted at
/// issuance so validation never has to consult the account directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionToken {
    pub token_id: TokenId,
    pub user_id: RecordId,
    pub role: Role,
    pub email: EmailAddress,
    pub display_name: NonEmptyText,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl SessionToken {
    /// Not revoked and not past `expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now <= self.expires_at
    }

    pub fn claim(&self) -> IdentityClaim {
        IdentityClaim {
            user_id: self.user_id,
            role: self.role,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::token_for;
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn token_expires_strictly_after_expires_at() {
        let issued = Utc.with_ymd_and_hms(2024, 10, 15, 8, 0, 0).unwrap();
        let token = token_for(RecordId::new(), Role::Patient, issued);

        assert!(token.is_live(token.expires_at));
        assert!(!token.is_live(token.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn revoked_token_is_never_live() {
        let issued = Utc.with_ymd_and_hms(2024, 10, 15, 8, 0, 0).unwrap();
        let mut token = token_for(RecordId::new(), Role::Doctor, issued);
        token.revoked = true;
        assert!(!token.is_live(issued));
    }
}
