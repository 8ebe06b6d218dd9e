//! Signed commerce payloads and their verification.
//!
//! Every record the commerce backend hands out (transactions, renewal info)
//! arrives as a compact signed token. Nothing downstream may act on a record
//! until it has passed through [`TransactionVerifier`].

pub mod jws;
pub mod payload;
pub mod verifier;

pub use jws::{PayloadSigner, SignedPayload, SignedRenewalInfo, SignedTransaction};
pub use payload::{
    ExpirationReason, RenewalInfo, SignedSubscriptionStatus, SubscriptionState, SubscriptionStatus,
    Transaction,
};
pub use verifier::{OwnershipDelta, TransactionVerifier, VerificationResult, ownership_delta};
