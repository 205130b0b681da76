//! Error types for the payment gateway.

use rust_decimal::Decimal;

use fee_rules::{Currency, FeeError};

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient funds: available {available} {currency}, requested {requested} {currency}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
        currency: Currency,
    },

    #[error("Reference {0} is already used by a different request")]
    ReferenceConflict(String),

    #[error(transparent)]
    Fee(#[from] FeeError),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Failures at the provider adapter boundary.
///
/// Adapters convert every transport problem, non-success status, and
/// incomplete payload into one of these; nothing provider-specific leaks past.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider call timed out: {0}")]
    Timeout(String),

    #[error("Provider unreachable: {0}")]
    Transport(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// The provider answered and explicitly declined.
    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("Operation not supported by {provider}: {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("Provider misconfigured: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// True when the outcome at the provider is unknown.
    ///
    /// The ledger record must then stay non-terminal so that reconciliation
    /// can resolve it.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_)
                | ProviderError::Transport(_)
                | ProviderError::MalformedResponse(_)
        )
    }
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient funds: available {available} {currency}, requested {requested} {currency}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
        currency: Currency,
    },

    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientFunds {
                available,
                requested,
                currency,
            } => AppError::InsufficientFunds {
                available,
                requested,
                currency,
            },
            DomainError::ValidationError(msg) => AppError::BadRequest(msg),
            DomainError::ReferenceConflict(reference) => AppError::Conflict(format!(
                "Reference {} is already used by a different request",
                reference
            )),
            // A negative net means the catalog is wrong, not the caller.
            DomainError::Fee(e @ FeeError::NegativeNet { .. }) => AppError::Internal(e.to_string()),
            DomainError::Fee(e) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unsupported { .. } => AppError::BadRequest(err.to_string()),
            ProviderError::Configuration(_) => AppError::Internal(err.to_string()),
            _ => AppError::Upstream(err.to_string()),
        }
    }
}
