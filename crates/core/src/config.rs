//! Core runtime configuration.
//!
//! This module defines configuration that is resolved once at process startup and then passed
//! into core services. Services never read process-wide environment variables during request
//! handling; binaries call [`CoreConfig::from_env_values`] with a lookup closure instead.

use crate::constants::{
    DEFAULT_SESSION_RETENTION, DEFAULT_SESSION_TTL, DEFAULT_SLOT_MINUTES, DEFAULT_SWEEP_INTERVAL,
    DEFAULT_UPSTREAM_BACKOFF, DEFAULT_UTC_OFFSET, DEFAULT_VERIFIER_TIMEOUT, DEFAULT_WORK_END,
    DEFAULT_WORK_START, MAX_SESSION_DAYS, SLOT_TIME_FORMAT,
};
use crate::error::{CoreError, CoreResult};
use crate::scheduling::SlotPolicy;
use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use std::time::Duration;

/// Session lifetime and upstream call settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub verifier_timeout: Duration,
    pub upstream_backoff: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
            verifier_timeout: Duration::from_secs(2),
            upstream_backoff: Duration::from_millis(200),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    slot_policy: SlotPolicy,
    sessions: SessionSettings,
    utc_offset: FixedOffset,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the session TTL, the verifier timeout or the
    /// sweep interval is zero, or if the TTL or the retention exceeds
    /// [`MAX_SESSION_DAYS`] days.
    pub fn new(
        slot_policy: SlotPolicy,
        sessions: SessionSettings,
        utc_offset: FixedOffset,
    ) -> CoreResult<Self> {
        if sessions.ttl.is_zero() {
            return Err(CoreError::InvalidInput(
                "session TTL must be greater than zero".into(),
            ));
        }
        if sessions.verifier_timeout.is_zero() {
            return Err(CoreError::InvalidInput(
                "verifier timeout must be greater than zero".into(),
            ));
        }
        if sessions.sweep_interval.is_zero() {
            return Err(CoreError::InvalidInput(
                "sweep interval must be greater than zero".into(),
            ));
        }
        let ceiling = Duration::from_secs(MAX_SESSION_DAYS * 24 * 60 * 60);
        for (name, value) in [("session TTL", sessions.ttl), ("retention", sessions.retention)] {
            if value > ceiling {
                return Err(CoreError::InvalidInput(format!(
                    "{name} must be at most {MAX_SESSION_DAYS} days"
                )));
            }
        }

        Ok(Self {
            slot_policy,
            sessions,
            utc_offset,
        })
    }

    /// Resolve configuration from named values, falling back to defaults for unset keys.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`. Empty or whitespace-only values
    /// count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] naming the offending key when a value cannot be
    /// parsed, or when the parsed values are inconsistent.
    pub fn from_env_values<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let work_start = time_from_env_value(
            "CLINIC_WORK_START",
            &get("CLINIC_WORK_START", DEFAULT_WORK_START),
        )?;
        let work_end =
            time_from_env_value("CLINIC_WORK_END", &get("CLINIC_WORK_END", DEFAULT_WORK_END))?;
        let minutes_raw = get("CLINIC_SLOT_MINUTES", &DEFAULT_SLOT_MINUTES.to_string());
        let granularity = minutes_raw.parse::<u32>().map_err(|_| {
            CoreError::InvalidInput(format!(
                "CLINIC_SLOT_MINUTES must be a whole number of minutes, got '{minutes_raw}'"
            ))
        })?;
        let slot_policy = SlotPolicy::new(work_start, work_end, granularity)?;

        let sessions = SessionSettings {
            ttl: duration_from_env_value(
                "CLINIC_SESSION_TTL",
                &get("CLINIC_SESSION_TTL", DEFAULT_SESSION_TTL),
            )?,
            retention: duration_from_env_value(
                "CLINIC_SESSION_RETENTION",
                &get("CLINIC_SESSION_RETENTION", DEFAULT_SESSION_RETENTION),
            )?,
            sweep_interval: duration_from_env_value(
                "CLINIC_SWEEP_INTERVAL",
                &get("CLINIC_SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL),
            )?,
            verifier_timeout: duration_from_env_value(
                "CLINIC_VERIFIER_TIMEOUT",
                &get("CLINIC_VERIFIER_TIMEOUT", DEFAULT_VERIFIER_TIMEOUT),
            )?,
            upstream_backoff: duration_from_env_value(
                "CLINIC_UPSTREAM_BACKOFF",
                &get("CLINIC_UPSTREAM_BACKOFF", DEFAULT_UPSTREAM_BACKOFF),
            )?,
        };

        let utc_offset =
            utc_offset_from_env_value(&get("CLINIC_UTC_OFFSET", DEFAULT_UTC_OFFSET))?;

        Self::new(slot_policy, sessions, utc_offset)
    }

    pub fn slot_policy(&self) -> &SlotPolicy {
        &self.slot_policy
    }

    pub fn sessions(&self) -> &SessionSettings {
        &self.sessions
    }

    /// Session lifetime as a calendar duration.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.sessions.ttl).unwrap_or(chrono::Duration::zero())
    }

    /// Grace between expiry and hard deletion, as a calendar duration.
    pub fn session_retention(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.sessions.retention).unwrap_or(chrono::Duration::zero())
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            slot_policy: SlotPolicy::default(),
            sessions: SessionSettings::default(),
            utc_offset: Utc.fix(),
        }
    }
}

/// Parse an `HH:MM` time of day.
pub fn time_from_env_value(key: &str, value: &str) -> CoreResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), SLOT_TIME_FORMAT).map_err(|_| {
        CoreError::InvalidInput(format!("{key} must be a time as HH:MM, got '{value}'"))
    })
}

/// Parse a duration such as `24h`, `10m`, `2s`, `200ms`, or bare seconds (`3600`).
pub fn duration_from_env_value(key: &str, value: &str) -> CoreResult<Duration> {
    let value = value.trim();
    let invalid = || {
        CoreError::InvalidInput(format!(
            "{key} must be a duration like 24h, 10m, 2s or 200ms, got '{value}'"
        ))
    };

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "" | "s" => Duration::from_secs(amount),
        "ms" => Duration::from_millis(amount),
        "m" => Duration::from_secs(amount.checked_mul(60).ok_or_else(invalid)?),
        "h" => Duration::from_secs(amount.checked_mul(60 * 60).ok_or_else(invalid)?),
        _ => return Err(invalid()),
    };
    Ok(duration)
}

/// Parse a UTC offset in the form `+HH:MM` or `-HH:MM`.
pub fn utc_offset_from_env_value(value: &str) -> CoreResult<FixedOffset> {
    let value = value.trim();
    let invalid = || {
        CoreError::InvalidInput(format!(
            "CLINIC_UTC_OFFSET must look like +01:00 or -05:30, got '{value}'"
        ))
    };

    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
