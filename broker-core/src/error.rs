//! Shared error type for the dynamiq broker.
//!
//! Every crate in the workspace returns [`BrokerError`] so that
//! `broker-server` can map a single enum onto HTTP status codes (see
//! `broker-server::error`) the same way `mixtape_server::ServerError` maps
//! `AgentError` in the teacher crate.

use thiserror::Error;

/// Errors observable to a caller, per spec.md §7.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Missing, invalid, or expired session token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Token lacks the scope required for the requested operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No such conversation / provider / stored credential.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed JSON, unknown method, or unparseable address.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No adapter matches the request and no default provider is set.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// An adapter's remote returned a non-success or unparseable response.
    #[error("upstream failed: {0}")]
    UpstreamFailed(String),

    /// A stored credential failed authenticated decryption.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Entropy failure, signing failure, or an unreachable branch.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// Short machine-readable tag for the error kind, used in logs and in
    /// the tool-access proxy's `{success:false, error}` envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::Unauthenticated(_) => "unauthenticated",
            BrokerError::Forbidden(_) => "forbidden",
            BrokerError::NotFound(_) => "not-found",
            BrokerError::InvalidArgument(_) => "invalid-argument",
            BrokerError::ProviderUnavailable(_) => "provider-unavailable",
            BrokerError::UpstreamFailed(_) => "upstream-failed",
            BrokerError::Integrity(_) => "integrity",
            BrokerError::Internal(_) => "internal",
        }
    }
}

/// Result alias used throughout the workspace.
pub type BrokerResult<T> = Result<T, BrokerError>;
