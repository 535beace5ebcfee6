//! Constants used throughout the clinic core crate.
//!
//! Defaults here are the values a deployment gets when the corresponding environment variable
//! is unset.

/// Default start of the working day, `HH:MM`.
pub const DEFAULT_WORK_START: &str = "09:00";

/// Default end of the working day, `HH:MM`.
pub const DEFAULT_WORK_END: &str = "17:00";

/// Default slot granularity in minutes.
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// Default lifetime of a role session token.
pub const DEFAULT_SESSION_TTL: &str = "24h";

/// Default grace period between expiry and hard deletion of a token row.
pub const DEFAULT_SESSION_RETENTION: &str = "24h";

/// Upper bound on the session TTL and on the retention grace, in days.
pub const MAX_SESSION_DAYS: u64 = 366;

/// Default period of the expired-token sweeper.
pub const DEFAULT_SWEEP_INTERVAL: &str = "10m";

/// Default bound on a single credential verifier call.
pub const DEFAULT_VERIFIER_TIMEOUT: &str = "2s";

/// Default delay before the single upstream retry.
pub const DEFAULT_UPSTREAM_BACKOFF: &str = "200ms";

/// Default clinic-local UTC offset.
pub const DEFAULT_UTC_OFFSET: &str = "+00:00";

/// Format used for slot times on the wire.
pub const SLOT_TIME_FORMAT: &str = "%H:%M";

/// Format used for calendar dates on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default listen address of the REST server.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Accepted formats for a clinic-local reservation start.
pub const SLOT_START_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];
