//! Strongly-typed snowflake identifiers
//!
//! The platform hands out 64-bit snowflakes for every entity. They travel as
//! decimal strings on the wire; each kind gets its own newtype so a role ID
//! can never be passed where a channel ID is expected.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Milliseconds between the Unix epoch and the platform epoch (2015-01-01).
pub const PLATFORM_EPOCH_MS: u64 = 1_420_070_400_000;

/// Failed to parse an identifier from text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} id: {value:?}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Creation time encoded in the upper bits of the snowflake.
            pub fn timestamp(self) -> DateTime<Utc> {
                snowflake_timestamp(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                raw.parse::<u64>().map(Self).map_err(|_| IdParseError {
                    kind: $prefix,
                    value: s.to_string(),
                })
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                string_u64::serialize(&self.0, serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                string_u64::deserialize(deserializer).map(Self)
            }
        }
    };
}

snowflake_id!(
    /// Untyped snowflake, used where the audit trail does not say what it points at
    Snowflake,
    "id"
);
snowflake_id!(
    /// Guild (community) identifier
    GuildId,
    "guild"
);
snowflake_id!(
    /// User identifier; members, bots and the guard itself share this space
    UserId,
    "user"
);
snowflake_id!(
    /// Role identifier
    RoleId,
    "role"
);
snowflake_id!(
    /// Channel identifier
    ChannelId,
    "channel"
);
snowflake_id!(
    /// Webhook identifier
    WebhookId,
    "webhook"
);

fn snowflake_timestamp(raw: u64) -> DateTime<Utc> {
    let millis = (raw >> 22) + PLATFORM_EPOCH_MS;
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Serde helpers for `u64` values carried as decimal strings.
///
/// Deserialization also accepts bare numbers, which is what configuration
/// files and environment overrides tend to produce.
pub mod string_u64 {
    use serde::de::{self, Deserialize, Deserializer};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.trim().parse().map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_parse() {
        let id = RoleId::new(42);
        assert_eq!(id.to_string(), "role:42");
        assert_eq!("role:42".parse::<RoleId>().unwrap(), id);
        assert_eq!("42".parse::<RoleId>().unwrap(), id);
        assert!("channel:42".parse::<RoleId>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let json = serde_json::to_string(&UserId::new(175928847299117063)).unwrap();
        assert_eq!(json, "\"175928847299117063\"");

        let from_text: UserId = serde_json::from_str("\"175928847299117063\"").unwrap();
        let from_number: UserId = serde_json::from_str("175928847299117063").unwrap();
        assert_eq!(from_text, from_number);
    }

    #[test]
    fn test_snowflake_timestamp() {
        // Documented example snowflake: 2016-04-30 11:18:25.796 UTC
        let id = Snowflake::new(175928847299117063);
        assert_eq!(id.timestamp().timestamp_millis(), 1_462_015_105_796);
    }
}
