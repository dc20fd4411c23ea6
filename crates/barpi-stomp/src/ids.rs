//! Random, prefixed identifiers for sessions and messages.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

fn random_hex() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrow as `&str`.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

prefixed_id!(
    /// Server-assigned session id, `session-<32 hex>`.
    SessionId
);
prefixed_id!(
    /// Per-delivery message id, `msg-<32 hex>-<unix nanos>`.
    MessageId
);

impl SessionId {
    /// Generate a fresh id from 16 CSPRNG bytes.
    pub fn generate() -> Self {
        Self(format!("session-{}", random_hex()))
    }
}

impl MessageId {
    /// Generate a fresh id from 16 CSPRNG bytes and the wall clock.
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        Self(format!("msg-{}-{nanos}", random_hex()))
    }
}
