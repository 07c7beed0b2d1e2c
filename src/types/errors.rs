//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and map to
//! a stable set of wire codes consumed by clients.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the curator server.
#[derive(Error, Debug)]
pub enum Error {
    /// Parameter validation failure, with per-field violations.
    #[error("invalid params: {message}")]
    InvalidParams {
        message: String,
        violations: Vec<FieldViolation>,
    },

    /// Unknown method name.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Mutation attempted while the mutation-enabled flag is off.
    /// This code must survive any wrapping layer untouched.
    #[error("mutation disabled: {0}")]
    MutationDisabled(String),

    /// Entry (or other resource) not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate id without overwrite.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored hash does not match the recomputed one.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Durable write failed (temp file, rename, usage snapshot).
    #[error("write failure: {0}")]
    WriteFailure(String),

    /// Request was cancelled before completion.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One field-level validation violation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldViolation {
    /// JSON-pointer-ish path to the offending field (e.g. `/categories/2`).
    pub path: String,
    /// Short rule name (`required`, `type`, `enum`, `unknown`, ...).
    pub rule: String,
    /// Human-readable message.
    pub message: String,
}

impl FieldViolation {
    pub fn new(
        path: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl Error {
    /// Stable wire code for this error.
    pub fn wire_code(&self) -> &'static str {
        match self {
            Error::InvalidParams { .. } => "INVALID_PARAMS",
            Error::MethodNotFound(_) => "METHOD_NOT_FOUND",
            Error::MutationDisabled(_) => "MUTATION_DISABLED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Conflict(_) => "CONFLICT",
            Error::Integrity(_) => "INTEGRITY",
            Error::WriteFailure(_) => "WRITE_FAILURE",
            Error::Cancelled(_) => "CANCELLED",
            Error::Internal(_) => "INTERNAL",
            Error::Serialization(_) => "INTERNAL",
            Error::Io(_) => "INTERNAL",
        }
    }

    /// Whether the code is one of the semantic (non-internal) codes.
    ///
    /// Semantic codes must never be collapsed into `INTERNAL` by a wrapping
    /// layer; the dispatcher uses this to deep-unwrap nested errors.
    pub fn is_semantic(&self) -> bool {
        self.wire_code() != "INTERNAL"
    }

    /// Walk the error source chain and return the most specific error.
    ///
    /// Prefers the innermost semantic code over any outer internal wrapper,
    /// so e.g. an `Internal` io error that wraps a `MutationDisabled` still
    /// reports `MUTATION_DISABLED`.
    pub fn most_specific(&self) -> &(dyn std::error::Error + 'static) {
        let mut best: &(dyn std::error::Error + 'static) = self;
        let mut cursor: &(dyn std::error::Error + 'static) = self;
        while let Some(source) = cursor.source() {
            if let Some(app) = source.downcast_ref::<Error>() {
                if app.is_semantic() {
                    best = source;
                }
            }
            cursor = source;
        }
        best
    }
}

// Convenience constructors
impl Error {
    pub fn invalid_params(msg: impl Into<String>, violations: Vec<FieldViolation>) -> Self {
        Self::InvalidParams {
            message: msg.into(),
            violations,
        }
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound(method.into())
    }

    pub fn mutation_disabled(msg: impl Into<String>) -> Self {
        Self::MutationDisabled(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn write_failure(msg: impl Into<String>) -> Self {
        Self::WriteFailure(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Single-violation validation error, the common case in handlers.
    pub fn validation(msg: impl Into<String>) -> Self {
        let message = msg.into();
        Self::InvalidParams {
            violations: vec![FieldViolation::new("", "invalid", message.clone())],
            message,
        }
    }
}
