//! # Clinic Core
//!
//! Core logic for clinic sessions and appointment scheduling.
//!
//! This crate contains the two parts of the clinic service with real invariants:
//! - Per-role session tokens: at most one live token per `(user, role)`, any number of roles
//!   per user at once ([`sessions`])
//! - Slot availability and atomic reservation: no two occupying reservations of a doctor ever
//!   overlap ([`scheduling`])
//!
//! Storage, credential verification and the clock are injected as trait objects, so every
//! service runs against in-memory implementations in tests.
//!
//! **No API concerns**: HTTP servers and wire formats belong in `api-rest` and `api-shared`.

pub mod clock;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod identity;
pub mod scheduling;
pub mod sessions;

pub use clinic_ids::{RecordId, TokenId};
pub use clinic_types::{EmailAddress, NonEmptyText, TextError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CoreConfig, SessionSettings};
pub use directory::{Account, ClinicDirectory, DoctorDirectory, DoctorProfile, IdentityRepository};
pub use error::{CoreError, CoreResult, ErrorKind, StoreError, StoreResult};
pub use identity::{Identity, IdentityClaim, Role};
pub use scheduling::{
    DayAvailability, InMemoryReservationStore, Reservation, ReservationRequest,
    ReservationStatus, SlotAvailability, SlotPolicy, SlotScheduler, UnavailableReason,
};
pub use sessions::{
    CredentialProof, CredentialVerifier, DirectoryVerifier, InMemoryTokenStore, SessionBroker,
    SessionToken, TokenStore,
};
