//! Strongly-typed identifiers.
//!
//! Entry ids double as filenames in the content store, so they are validated
//! at construction time: non-empty, no path separators, filename-safe charset.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique, filename-safe key for a catalog entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryId(String);

impl EntryId {
    /// Maximum id length; ids are used as filenames and must stay short.
    pub const MAX_LEN: usize = 128;

    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if s.is_empty() {
            return Err("entry id cannot be empty".to_string());
        }
        if s.len() > Self::MAX_LEN {
            return Err(format!("entry id exceeds {} characters", Self::MAX_LEN));
        }
        if s.starts_with('.') {
            return Err("entry id cannot start with '.'".to_string());
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(format!("entry id contains invalid character '{}'", bad));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntryId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EntryId> for String {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
