//! Error types for the TodoLists server.
//!
//! This module defines the error hierarchy used throughout the server.
//!
//! # Error Types
//!
//! - [`TodoError`] - Expected user-input conditions (bad names, unknown ids).
//!   These never escape a handler: they become flash messages.
//! - [`ConfigError`] - Configuration-related errors (missing values, parse failures)
//! - [`ServerError`] - Session capacity and template faults, rendered as 5xx responses
//!
//! # Example
//!
//! ```rust
//! use todolists_server::error::TodoError;
//! use todolists_server::validation::validate_todo_name;
//!
//! let err = validate_todo_name("   ").unwrap_err();
//! assert!(matches!(err, TodoError::InvalidLength { .. }));
//! assert_eq!(err.to_string(), "Todo must be between 1 and 100 characters.");
//! ```

use std::error::Error;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error as ThisError;
use tracing::error;

use crate::session::SessionError;

/// Which kind of name failed a length check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// The name of a todo list.
    List,
    /// The text of a todo item.
    Todo,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("List name"),
            Self::Todo => f.write_str("Todo"),
        }
    }
}

/// Which kind of entity could not be resolved from a request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    List,
    Todo,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("list"),
            Self::Todo => f.write_str("todo"),
        }
    }
}

/// Expected user-input failures.
///
/// The `Display` output of each variant is the exact flash message shown
/// to the visitor.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum TodoError {
    /// The trimmed name is empty or longer than 100 characters.
    #[error("{subject} must be between 1 and 100 characters.")]
    InvalidLength {
        /// Whether a list name or a todo was rejected.
        subject: NameKind,
    },

    /// Another list in the session already carries this exact name.
    #[error("List name must be unique.")]
    DuplicateName,

    /// The requested id is malformed or matches nothing.
    #[error("The specified {0} was not found.")]
    NotFound(EntityKind),
}

impl TodoError {
    /// Creates a length error for the given kind of name.
    pub fn invalid_length(subject: NameKind) -> Self {
        Self::InvalidLength { subject }
    }

    /// Creates a not-found error for the given kind of entity.
    pub fn not_found(entity: EntityKind) -> Self {
        Self::NotFound(entity)
    }
}

/// Errors that occur during configuration loading and validation.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable has invalid format.
    #[error("invalid format for {var}: {message}")]
    InvalidFormat { var: String, message: String },

    /// Configuration validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Creates a new invalid format error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use todolists_server::error::ConfigError;
    ///
    /// let err = ConfigError::invalid_format("PORT", "must be a number");
    /// assert!(matches!(err, ConfigError::InvalidFormat { .. }));
    /// ```
    pub fn invalid_format(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Top-level error type for the TodoLists server.
///
/// Everything here is a server fault or a resource limit; visitor mistakes
/// are [`TodoError`]s and are handled inside the route handlers.
#[derive(Debug)]
pub enum ServerError {
    /// The session store had no room to keep a new session.
    Session(SessionError),

    /// A page template failed to compile or render.
    Template(minijinja::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(err) => write!(f, "session error: {err}"),
            Self::Template(err) => write!(f, "template error: {err}"),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
            Self::Template(err) => Some(err),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<minijinja::Error> for ServerError {
    fn from(err: minijinja::Error) -> Self {
        Self::Template(err)
    }
}

impl ServerError {
    /// HTTP status used when this error reaches a client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Session(SessionError::AtCapacity { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        error!(error = %self, status = status.as_u16(), "Request failed");
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}

/// A specialized Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
