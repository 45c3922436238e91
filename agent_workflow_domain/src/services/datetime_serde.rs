// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DateTime Serde Module
//!
//! RFC3339-compliant serialization and deserialization for `DateTime<Utc>`
//! fields across the workflow system.
//!
//! ## Overview
//!
//! - **RFC3339 Compliance**: `YYYY-MM-DDTHH:MM:SS.sssZ`, always UTC
//! - **Serde Integration**: Use with `#[serde(with = "datetime_serde")]`
//! - **Optional Fields**: `#[serde(with = "datetime_serde::optional")]` for
//!   fields such as `completed_at` that may be absent
//!
//! Invalid datetime strings are rejected during deserialization with a
//! descriptive serde error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Serializes a `DateTime<Utc>` to an RFC3339 string.
pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

/// Deserializes an RFC3339 datetime string to a `DateTime<Utc>`.
///
/// Any timezone offset in the input is normalized to UTC.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

/// RFC3339 serialization for `Option<DateTime<Utc>>` fields.
pub mod optional {
    use super::*;

    /// Serializes `Some(datetime)` to an RFC3339 string, `None` to null.
    pub fn serialize<S>(opt_dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match opt_dt {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional RFC3339 string to `Option<DateTime<Utc>>`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "super")]
        at: DateTime<Utc>,
        #[serde(with = "super::optional")]
        maybe_at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_round_trip() {
        let original = Stamped {
            at: Utc::now(),
            maybe_at: Some(Utc::now()),
        };
        let json = serde_json::to_string(&original).unwrap();
        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(original.at, back.at);
        assert_eq!(original.maybe_at, back.maybe_at);
    }

    #[test]
    fn test_none_round_trip() {
        let original = Stamped {
            at: Utc::now(),
            maybe_at: None,
        };
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("null"));
        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert!(back.maybe_at.is_none());
    }

    #[test]
    fn test_invalid_string_rejected() {
        let err = serde_json::from_str::<Stamped>(r#"{"at":"yesterday","maybe_at":null}"#);
        assert!(err.is_err());
    }
}
