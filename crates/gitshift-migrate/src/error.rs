//! Error types for migration operations.

use thiserror::Error;

use crate::registry::Role;

/// Top-level error for everything the migrator does.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Missing or invalid credentials and settings. Fatal, raised before any
    /// repository is touched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No constructor registered under the requested provider name.
    #[error("Unsupported {role} provider '{name}' (available: {available})")]
    UnsupportedProvider {
        /// Role that was requested.
        role: Role,
        /// Name that was looked up.
        name: String,
        /// Comma-separated list of registered names for the role.
        available: String,
    },

    /// A remote API call failed.
    #[error("{provider} error: {source}")]
    Provider {
        /// Provider that produced the error.
        provider: &'static str,
        /// Underlying failure.
        #[source]
        source: ProviderError,
    },

    /// A target name was rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Local clone or push failure.
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Wraps a provider failure with the provider's name.
    pub fn provider(provider: &'static str, source: ProviderError) -> Self {
        Self::Provider { provider, source }
    }
}

/// Remote API failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Token rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Access denied or throttled.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimitExceeded(u64),

    /// Resource does not exist or is not visible.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("API request failed with status {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Response could not be decoded.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Target-name rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Blank input.
    #[error("repository name must not be empty")]
    Empty,

    /// Longer than the destination allows.
    #[error("repository name is {len} characters long, {provider} allows at most {max}")]
    TooLong {
        /// Actual length in characters.
        len: usize,
        /// Destination maximum.
        max: usize,
        /// Destination provider.
        provider: &'static str,
    },

    /// Character outside the allowed alphabet.
    #[error("invalid character {0:?}, only letters, digits, '-', '_' and '.' are allowed")]
    InvalidCharacter(char),

    /// Leading '.' or '-', or trailing '.'.
    #[error("repository name must not start with '.' or '-' or end with '.'")]
    BadBoundary,

    /// Reserved name or suffix.
    #[error("'{0}' is reserved")]
    Reserved(String),

    /// Another item already claims this name.
    #[error("'{0}' is already used by another repository")]
    Collision(String),

    /// A rename points at a repository the destination already has.
    #[error("'{0}' already exists on the destination")]
    ExistsOnDestination(String),

    /// Two tasks of the same run share a target.
    #[error("duplicate target name '{0}' in one run")]
    DuplicateTarget(String),
}

/// Local git failures. Messages are sanitized before construction.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The git executable could not be started.
    #[error("Could not run git: {0}")]
    GitUnavailable(String),

    /// Mirror clone failed.
    #[error("Git clone failed: {0}")]
    CloneFailed(String),

    /// Mirror push failed.
    #[error("Git push failed: {0}")]
    PushFailed(String),

    /// Destination refs do not match the local mirror after pushing.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Scoped working directory could not be created.
    #[error("Working directory error: {0}")]
    Workspace(#[source] std::io::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
