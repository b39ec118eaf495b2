//! Error types for the diagnostic flow.

use thiserror::Error;

/// Errors that can occur while resolving, authorizing, extracting or waiting.
#[derive(Debug, Error)]
pub enum DiagError {
    /// A required environment variable is unset or empty
    #[error("Missing environment variable [{name}]")]
    MissingEnvironmentVariable { name: String },

    /// None of a group of alternative environment variables is set
    #[error("Missing one of the following environment variables [{}]", .names.join(", "))]
    MissingAnyOfEnvironmentVariables { names: Vec<String> },

    /// An environment variable is set but cannot be used
    #[error("Invalid environment variable [{name}]: {reason}")]
    InvalidEnvironmentVariable { name: String, reason: String },

    /// The identity service refused or failed the authorization request
    #[error("Authorization failed: {0}")]
    AuthorizationFailure(String),

    /// The application credential lookup failed
    #[error("Application credential {credential_id} lookup for user {user_id} failed: {message}")]
    EnrichmentLookupFailure {
        user_id: String,
        credential_id: String,
        message: String,
    },

    /// The token detail lacks a field that must be read
    #[error("Malformed token detail: missing {0}")]
    MalformedTokenDetail(&'static str),

    /// The termination signal handler could not be installed
    #[error("Failed to install termination signal handler: {0}")]
    SignalHandler(#[source] std::io::Error),
}

/// Result type for diagnostic operations.
pub type Result<T> = std::result::Result<T, DiagError>;
