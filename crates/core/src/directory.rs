//! Account and doctor directory.
//!
//! The broker and the scheduler never own user data. They look accounts up through the
//! [`IdentityRepository`] and [`DoctorDirectory`] traits, which are injected at construction.
//! [`ClinicDirectory`] is the in-memory implementation of both, loaded from a YAML seed:
//!
//! ```yaml
//! accounts:
//!   - id: 550e8400e29b41d4a716446655440000
//!     email: a@x.com
//!     name: Alex Example
//!     roles: [PATIENT, DOCTOR]
//!     password_salt: 3f1c...
//!     password_sha256: 9a7b...
//!     accepting_bookings: true
//! ```
//!
//! Password digests are `sha256(salt || password)` in lowercase hex.

use crate::error::{CoreError, CoreResult};
use crate::identity::{Identity, Role};
use clinic_ids::RecordId;
use clinic_types::{EmailAddress, NonEmptyText};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Read access to user accounts.
pub trait IdentityRepository: Send + Sync {
    fn find_by_email(&self, email: &EmailAddress) -> Option<Account>;
    fn find_by_id(&self, user_id: &RecordId) -> Option<Account>;
}

/// Read access to doctors that can be booked.
pub trait DoctorDirectory: Send + Sync {
    fn find_doctor(&self, doctor_id: &RecordId) -> Option<DoctorProfile>;
}

/// A bookable doctor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoctorProfile {
    pub doctor_id: RecordId,
    pub display_name: NonEmptyText,
    pub accepting_bookings: bool,
}

/// Salted password digest.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    salt: String,
    sha256: String,
}

impl PasswordDigest {
    /// Digest `password` with a fresh random salt.
    pub fn generate(password: &str) -> Self {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        Self::with_salt(&hex::encode(salt), password)
    }

    pub fn with_salt(salt: &str, password: &str) -> Self {
        Self {
            salt: salt.to_string(),
            sha256: digest_hex(salt, password),
        }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Constant-time comparison of the stored digest against `password`.
    pub fn matches(&self, password: &str) -> bool {
        let candidate = digest_hex(&self.salt, password);
        let stored = self.sha256.as_bytes();
        let candidate = candidate.as_bytes();
        if stored.len() != candidate.len() {
            return false;
        }
        stored
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordDigest(..)")
    }
}

fn digest_hex(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// A stored user account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: RecordId,
    pub email: EmailAddress,
    pub name: NonEmptyText,
    pub roles: BTreeSet<Role>,
    pub password: PasswordDigest,
    pub accepting_bookings: bool,
}

impl Account {
    /// Build an account with a freshly salted password digest.
    pub fn new(
        email: EmailAddress,
        name: NonEmptyText,
        roles: impl IntoIterator<Item = Role>,
        password: &str,
    ) -> Self {
        Self {
            id: RecordId::new(),
            email,
            name,
            roles: roles.into_iter().collect(),
            password: PasswordDigest::generate(password),
            accepting_bookings: true,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.clone(),
            display_name: self.name.clone(),
            roles: self.roles.clone(),
        }
    }
}

// ============================================================================
// Seed wire model
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedFileWire {
    #[serde(default)]
    accounts: Vec<AccountWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AccountWire {
    id: RecordId,
    email: EmailAddress,
    name: NonEmptyText,
    roles: BTreeSet<Role>,
    password_salt: String,
    password_sha256: String,
    #[serde(default = "default_accepting_bookings")]
    accepting_bookings: bool,
}

fn default_accepting_bookings() -> bool {
    true
}

impl From<AccountWire> for Account {
    fn from(wire: AccountWire) -> Self {
        Self {
            id: wire.id,
            email: wire.email,
            name: wire.name,
            roles: wire.roles,
            password: PasswordDigest {
                salt: wire.password_salt,
                sha256: wire.password_sha256.to_ascii_lowercase(),
            },
            accepting_bookings: wire.accepting_bookings,
        }
    }
}

/// In-memory account and doctor directory.
///
/// Contents are fixed after construction; lookups take `&self` and need no locking.
#[derive(Debug, Default, Clone)]
pub struct ClinicDirectory {
    by_id: HashMap<RecordId, Account>,
    by_email: HashMap<EmailAddress, RecordId>,
}

impl ClinicDirectory {
    /// Build a directory from accounts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if two accounts share an id or an email, or if an
    /// account has no roles.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> CoreResult<Self> {
        let mut directory = Self::default();
        for account in accounts {
            if account.roles.is_empty() {
                return Err(CoreError::InvalidInput(format!(
                    "account {} has no roles",
                    account.email
                )));
            }
            if directory.by_email.contains_key(&account.email) {
                return Err(CoreError::InvalidInput(format!(
                    "duplicate account email {}",
                    account.email
                )));
            }
            if directory.by_id.contains_key(&account.id) {
                return Err(CoreError::InvalidInput(format!(
                    "duplicate account id {}",
                    account.id
                )));
            }
            directory.by_email.insert(account.email.clone(), account.id);
            directory.by_id.insert(account.id, account);
        }
        Ok(directory)
    }

    /// Parse a YAML seed document.
    pub fn from_yaml(yaml_text: &str) -> CoreResult<Self> {
        let seed: SeedFileWire = serde_yaml::from_str(yaml_text).map_err(CoreError::SeedParse)?;
        Self::new(seed.accounts.into_iter().map(Account::from))
    }

    /// Load a YAML seed file from disk.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(CoreError::SeedRead)?;
        let directory = Self::from_yaml(&text)?;
        tracing::info!(
            accounts = directory.account_count(),
            doctors = directory.doctor_count(),
            "loaded directory seed from {}",
            path.display()
        );
        Ok(directory)
    }

    pub fn account_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn doctor_count(&self) -> usize {
        self.by_id
            .values()
            .filter(|a| a.roles.contains(&Role::Doctor))
            .count()
    }
}

impl IdentityRepository for ClinicDirectory {
    fn find_by_email(&self, email: &EmailAddress) -> Option<Account> {
        self.by_email
            .get(email)
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }

    fn find_by_id(&self, user_id: &RecordId) -> Option<Account> {
        self.by_id.get(user_id).cloned()
    }
}

impl DoctorDirectory for ClinicDirectory {
    fn find_doctor(&self, doctor_id: &RecordId) -> Option<DoctorProfile> {
        self.by_id
            .get(doctor_id)
            .filter(|a| a.roles.contains(&Role::Doctor))
            .map(|a| DoctorProfile {
                doctor_id: a.id,
                display_name: a.name.clone(),
                accepting_bookings: a.accepting_bookings,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn account(email: &str, roles: &[Role]) -> Account {
        Account::new(
            EmailAddress::parse(email).unwrap(),
            NonEmptyText::new("Test User").unwrap(),
            roles.iter().copied(),
            "pw",
        )
    }

    #[test]
    fn password_digest_matches_only_the_right_password() {
        let digest = PasswordDigest::generate("correct horse");
        assert!(digest.matches("correct horse"));
        assert!(!digest.matches("correct horse "));
        assert!(!digest.matches(""));
    }

    #[test]
    fn fixed_salt_digest_is_stable() {
        let a = PasswordDigest::with_salt("abc", "pw");
        let b = PasswordDigest::with_salt("abc", "pw");
        assert_eq!(a.sha256(), b.sha256());
        assert_eq!(a.sha256().len(), 64);
    }

    #[test]
    fn lookups_by_email_are_case_insensitive() {
        let acct = account("a@x.com", &[Role::Patient]);
        let directory = ClinicDirectory::new([acct.clone()]).unwrap();

        let found = directory
            .find_by_email(&EmailAddress::parse("A@X.COM").unwrap())
            .expect("should find account");
        assert_eq!(found.id, acct.id);
    }

    #[test]
    fn only_doctors_are_bookable() {
        let patient = account("p@x.com", &[Role::Patient]);
        let doctor = account("d@x.com", &[Role::Doctor]);
        let directory = ClinicDirectory::new([patient.clone(), doctor.clone()]).unwrap();

        assert!(directory.find_doctor(&patient.id).is_none());
        let profile = directory.find_doctor(&doctor.id).expect("doctor exists");
        assert!(profile.accepting_bookings);
        assert_eq!(directory.doctor_count(), 1);
    }

    #[test]
    fn duplicate_emails_are_rejected() {
        let err = ClinicDirectory::new([
            account("a@x.com", &[Role::Patient]),
            account("A@x.com", &[Role::Doctor]),
        ])
        .expect_err("should reject duplicate");
        assert!(err.to_string().contains("duplicate account email"));
    }

    #[test]
    fn accounts_without_roles_are_rejected() {
        let err = ClinicDirectory::new([account("a@x.com", &[])]).expect_err("should reject");
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn loads_yaml_seed_from_disk() {
        let digest = PasswordDigest::with_salt("s4lt", "secret");
        let yaml = format!(
            r#"accounts:
  - id: 550e8400e29b41d4a716446655440000
    email: doc@clinic.org
    name: Dr Who
    roles: [DOCTOR, PATIENT]
    password_salt: s4lt
    password_sha256: {}
    accepting_bookings: false
"#,
            digest.sha256()
        );
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write seed");

        let directory = ClinicDirectory::load(file.path()).expect("seed should load");
        let account = directory
            .find_by_email(&EmailAddress::parse("doc@clinic.org").unwrap())
            .expect("account present");

        assert!(account.password.matches("secret"));
        assert_eq!(account.roles.len(), 2);
        let doctor = directory.find_doctor(&account.id).unwrap();
        assert!(!doctor.accepting_bookings);
    }

    #[test]
    fn seed_rejects_unknown_keys() {
        let err = ClinicDirectory::from_yaml("accounts: []\nextra: 1\n").expect_err("reject");
        assert!(matches!(err, CoreError::SeedParse(_)));
    }
}
