//! Short-hash identifiers used for users, servers and groups.
//!
//! Channels, messages and webhooks are identified by UUIDs; everything
//! else uses an 8-character alphanumeric hash such as `Ann6LewA`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidHashId;

/// Length of every [`HashId`].
pub const HASH_ID_LEN: usize = 8;

/// An 8-character alphanumeric identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashId(String);

impl HashId {
    /// Validate and wrap a raw identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidHashId> {
        let raw = raw.into();
        if Self::is_valid(&raw) {
            Ok(Self(raw))
        } else {
            Err(InvalidHashId(raw))
        }
    }

    /// Check whether `raw` has the hash identifier shape.
    pub fn is_valid(raw: &str) -> bool {
        raw.len() == HASH_ID_LEN && raw.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HashId {
    type Err = InvalidHashId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for HashId {
    type Error = InvalidHashId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HashId> for String {
    fn from(id: HashId) -> Self {
        id.0
    }
}

impl AsRef<str> for HashId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
