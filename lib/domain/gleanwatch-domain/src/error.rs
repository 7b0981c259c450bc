use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure classes shared by every backend client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection failure, timeout or server-side outage.
    Unreachable,
    /// 401/403 or a rejected key.
    AuthRejected,
    /// The backend refused the request shape (wrong path, missing section).
    Unsupported,
    /// Well-formed response that is semantically an error.
    QueryError,
    NotFound,
    /// Normalizer fallback. Never fatal.
    UnknownStatus,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::AuthRejected => "auth_rejected",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::QueryError => "query_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UnknownStatus => "unknown_status",
        }
    }

    /// Classify an HTTP status code that is not a success.
    pub fn from_http_status(code: u16) -> Self {
        match code {
            401 | 403 => ErrorKind::AuthRejected,
            500..=599 => ErrorKind::Unreachable,
            _ => ErrorKind::Unsupported,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct BackendError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl BackendError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unreachable, detail)
    }

    pub fn auth_rejected(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthRejected, detail)
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, detail)
    }

    pub fn query(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::QueryError, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, detail)
    }

    /// Error for a non-success HTTP response, keeping the code and body.
    pub fn from_http(code: u16, body: &str) -> Self {
        let body = body.trim();
        let detail = if body.is_empty() {
            format!("HTTP {code}")
        } else {
            format!("HTTP {code}: {body}")
        };
        Self::new(ErrorKind::from_http_status(code), detail)
    }

    pub fn not_configured(section: &str) -> Self {
        Self::unsupported(format!("{section} is not configured for this environment"))
    }
}

/// Rejected run-filter combinations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("at least one run status is required")]
    NoStatuses,
    #[error("job name must not be blank")]
    BlankJobName,
    #[error("page size must be between 1 and {max}, got {got}")]
    PageSize { got: u32, max: u32 },
    #[error("createdAfter must be positive, got {0}")]
    NegativeBound(i64),
}
