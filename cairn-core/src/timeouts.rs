//! Timeouts - Per-operation timeout overrides
//!
//! Each resource type declares default timeouts for its lifecycle operations.
//! Configuration may override any of them with a duration string such as
//! `"10m"`, `"1h30m"` or `"45s"`.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Furthest a deadline is placed from now, about thirty years
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Lifecycle operation a timeout applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Optional per-operation overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Option<Duration>,
    pub read: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

impl Timeouts {
    pub fn get(&self, op: Operation) -> Option<Duration> {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// The override for `op`, or `default` when none is configured
    pub fn resolve(&self, op: Operation, default: Duration) -> Duration {
        self.get(op).unwrap_or(default)
    }

    /// Build from a JSON object like `{"create": "30m", "delete": "1h"}`
    pub fn from_json(json: &serde_json::Value) -> Result<Self, DurationError> {
        let mut timeouts = Timeouts::default();
        let Some(map) = json.as_object() else {
            return Ok(timeouts);
        };
        for (key, value) in map {
            let Some(text) = value.as_str() else {
                return Err(DurationError::Invalid(value.to_string()));
            };
            let duration = parse_duration(text)?;
            match key.as_str() {
                "create" => timeouts.create = Some(duration),
                "read" => timeouts.read = Some(duration),
                "update" => timeouts.update = Some(duration),
                "delete" => timeouts.delete = Some(duration),
                other => return Err(DurationError::UnknownOperation(other.to_string())),
            }
        }
        Ok(timeouts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration '{0}'")]
    Invalid(String),

    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { input: String, unit: String },

    #[error("unknown timeout operation '{0}', expected create, read, update or delete")]
    UnknownOperation(String),
}

/// Deadline `timeout` from `start`, capped so huge timeouts cannot overflow `Instant`
pub fn deadline_from(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout.min(FAR_FUTURE))
        .unwrap_or(start)
}

/// Deadline `timeout` from now
pub fn deadline_after(timeout: Duration) -> Instant {
    deadline_from(Instant::now(), timeout)
}

/// Parse durations like `"90s"`, `"10m"`, `"1h30m"`, `"500ms"`
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| DurationError::Invalid(input.to_string()))?;
        if digits == 0 {
            return Err(DurationError::Invalid(input.to_string()));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| DurationError::Invalid(input.to_string()))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => Some(Duration::from_secs(amount)),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "h" => amount.checked_mul(3600).map(Duration::from_secs),
            _ => {
                return Err(DurationError::UnknownUnit {
                    input: input.to_string(),
                    unit: unit.to_string(),
                });
            }
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| DurationError::Invalid(input.to_string()))?;
    }
    Ok(total)
}
