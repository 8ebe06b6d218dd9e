//! Error taxonomy.
//!
//! Nothing in this taxonomy is fatal to the process: every variant is
//! recovered locally by degrading to an empty or negative result and logging.

use thiserror::Error;

/// Result type used across the entitlement crates.
pub type EntitlementResult<T> = Result<T, EntitlementError>;

/// Why a signed payload failed verification.
///
/// Verification failure is an ordinary outcome, carried inside
/// `VerificationResult::Unverified`, not propagated as a fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The token is not `header.payload.signature` or a segment is not base64url.
    #[error("malformed signed payload: {0}")]
    Malformed(String),

    /// The header names an algorithm other than EdDSA.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not match the payload under the trusted key.
    #[error("signature verification failed")]
    InvalidSignature,

    /// Signature is valid but the payload does not decode to the expected record.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The source did not answer within the configured bound.
    #[error("verification timed out")]
    Timeout,
}

/// Entitlement-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    /// A value failed validation (e.g. empty identifier).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A payload signature could not be verified.
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// Product metadata could not be fetched from the catalog source.
    #[error("catalog fetch failed: {0}")]
    CatalogFetch(String),

    /// The catalog is loaded once per process and is immutable afterwards.
    #[error("catalog already loaded")]
    CatalogAlreadyLoaded,

    /// A purchase produced no transaction (cancelled, pending or failed).
    #[error("purchase failed: {0}")]
    Purchase(String),

    /// Subscription status lookup failed.
    #[error("subscription status query failed: {0}")]
    StatusQuery(String),

    /// Latest-transaction or current-entitlements lookup failed.
    #[error("entitlement query failed: {0}")]
    EntitlementQuery(String),

    /// An external call exceeded the configured bound.
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u64 },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EntitlementError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn catalog_fetch(msg: impl Into<String>) -> Self {
        Self::CatalogFetch(msg.into())
    }

    pub fn purchase(msg: impl Into<String>) -> Self {
        Self::Purchase(msg.into())
    }

    pub fn status_query(msg: impl Into<String>) -> Self {
        Self::StatusQuery(msg.into())
    }

    pub fn entitlement_query(msg: impl Into<String>) -> Self {
        Self::EntitlementQuery(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
