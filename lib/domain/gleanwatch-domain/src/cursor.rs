use serde::{Deserialize, Serialize};
use std::fmt;

/// Pagination token handed out by a backend.
///
/// Stored exactly as returned and passed back verbatim; never parsed or built locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Wrap a cursor field from a response; `None` and empty both end pagination.
    pub fn from_response(raw: Option<String>) -> Option<Self> {
        raw.filter(|value| !value.is_empty()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
