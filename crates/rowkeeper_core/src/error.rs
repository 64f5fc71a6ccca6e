//! Error taxonomy shared by every persistence component.
//!
//! # Responsibility
//! - Give callers one typed outcome for every failure path.
//! - Keep intentional outcomes (`NotFound`, `Validation`) distinct from
//!   unexpected driver failures (`Internal`).
//!
//! # Invariants
//! - Driver failures never escape a handler as anything but `Internal` or
//!   `Cancelled`.
//! - `Configuration` and `ContextNotFound` are never retried.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PersistResult<T> = Result<T, PersistError>;

/// Outcome of a failed persistence operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// Bad or missing entity metadata.
    Configuration(String),
    /// Bad caller input, reported before any I/O.
    Validation(String),
    /// Expected absence of a row.
    NotFound { entity: String, key: String },
    /// Operation requested against a descriptor that cannot support it.
    UnsupportedOperation(String),
    /// No configured storage context owns the entity.
    ContextNotFound { entity: String, declared: Vec<String> },
    /// Insert succeeded at the driver level but no key could be determined.
    CreateFailed(String),
    /// The caller's cancellation signal fired at an I/O boundary.
    Cancelled,
    /// Unexpected driver/storage failure.
    Internal {
        message: String,
        source_type: Option<String>,
    },
}

impl PersistError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation(message.into())
    }

    pub fn not_found(entity: impl Into<String>, key: impl Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source_type: Some(source_type.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns whether repeating the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal { .. } | Self::Cancelled)
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::ContextNotFound { .. } => "context_not_found",
            Self::CreateFailed(_) => "create_failed",
            Self::Cancelled => "cancelled",
            Self::Internal { .. } => "internal",
        }
    }
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Validation(message) => write!(f, "validation error: {message}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::UnsupportedOperation(message) => write!(f, "unsupported operation: {message}"),
            Self::ContextNotFound { entity, declared } => {
                if declared.is_empty() {
                    write!(f, "no storage context declared for {entity}")
                } else {
                    write!(
                        f,
                        "no configured storage context for {entity}; declared: {}",
                        declared.join(", ")
                    )
                }
            }
            Self::CreateFailed(message) => write!(f, "create failed: {message}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Internal {
                message,
                source_type: Some(source_type),
            } => write!(f, "internal error ({source_type}): {message}"),
            Self::Internal {
                message,
                source_type: None,
            } => write!(f, "internal error: {message}"),
        }
    }
}

impl Error for PersistError {}
