#![deny(missing_docs)]

//! # Encoding Configuration
//!
//! Explicit configuration threaded through every encode, decode and describe
//! call. There is no process-wide default; `EncodingConfig::DEFAULT` is a plain
//! constant.

use crate::error::{ShapeError, ShapeResult};
use crate::naming::KeyEncodingStrategy;
use chrono::{DateTime, SecondsFormat, Utc};

/// How zoned date-time leaves are represented on the wire.
///
/// Must be identical for encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// RFC 3339 strings (`2024-05-01T10:00:00Z`).
    #[default]
    Iso8601,
    /// Whole seconds since the Unix epoch.
    SecondsSince1970,
    /// Milliseconds since the Unix epoch.
    MillisecondsSince1970,
}

impl DateFormat {
    /// Whether dates are carried as integers.
    pub fn is_epoch(&self) -> bool {
        !matches!(self, DateFormat::Iso8601)
    }

    /// Converts an RFC 3339 timestamp into an epoch count.
    ///
    /// Returns `None` for `Iso8601`, where the string is kept as is.
    pub fn to_epoch(&self, rfc3339: &str) -> ShapeResult<Option<i64>> {
        if !self.is_epoch() {
            return Ok(None);
        }
        let parsed = DateTime::parse_from_rfc3339(rfc3339).map_err(|e| {
            ShapeError::UnsupportedShape(format!("invalid date-time '{}': {}", rfc3339, e))
        })?;
        Ok(Some(match self {
            DateFormat::MillisecondsSince1970 => parsed.timestamp_millis(),
            _ => parsed.timestamp(),
        }))
    }

    /// Converts an epoch count back into an RFC 3339 timestamp (UTC).
    pub fn from_epoch(&self, count: i64) -> ShapeResult<String> {
        let parsed = match self {
            DateFormat::MillisecondsSince1970 => DateTime::<Utc>::from_timestamp_millis(count),
            _ => DateTime::<Utc>::from_timestamp(count, 0),
        };
        parsed
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .ok_or_else(|| ShapeError::DecodingMismatch(format!("epoch {} is out of range", count)))
    }
}

/// Configuration shared by both directions of every round trip.
#[derive(Debug, Clone)]
pub struct EncodingConfig {
    /// Transform applied to struct field names (map keys are data and pass unchanged).
    pub key_strategy: KeyEncodingStrategy,
    /// Representation of zoned date-time leaves.
    pub date_format: DateFormat,
}

impl EncodingConfig {
    /// Snake-case keys, ISO-8601 dates.
    pub const DEFAULT: EncodingConfig = EncodingConfig {
        key_strategy: KeyEncodingStrategy::DEFAULT,
        date_format: DateFormat::Iso8601,
    };

    /// Replaces the key strategy.
    pub fn with_key_strategy(mut self, key_strategy: KeyEncodingStrategy) -> Self {
        self.key_strategy = key_strategy;
        self
    }

    /// Replaces the date format.
    pub fn with_date_format(mut self, date_format: DateFormat) -> Self {
        self.date_format = date_format;
        self
    }

    /// Shorthand for `key_strategy.encode(key)`.
    pub fn encode_key(&self, key: &str) -> String {
        self.key_strategy.encode(key)
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
