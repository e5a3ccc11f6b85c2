//! Request correlation ids.

use std::fmt;

use uuid::Uuid;

/// Correlation token tying a response back to the request that caused it.
///
/// Generated fresh per call, collision-resistant for the lifetime of a
/// connection, never reused.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("req_{}", Uuid::now_v7()))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
