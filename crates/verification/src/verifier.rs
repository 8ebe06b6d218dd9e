//! Transaction verification.

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::de::DeserializeOwned;
use tracing::debug;

use entitlekit_core::{EntitlementError, EntitlementResult, VerificationError};

use crate::jws::{ALGORITHM, Header, SignedPayload, SignedRenewalInfo, SignedTransaction};
use crate::payload::{RenewalInfo, SignedSubscriptionStatus, SubscriptionStatus, Transaction};

/// Outcome of checking a signed payload.
///
/// Failure is a value, not an error: callers log it and treat the record as
/// "not owned" / "unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult<T> {
    Verified(T),
    Unverified(VerificationError),
}

impl<T> VerificationResult<T> {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationResult::Verified(_))
    }

    pub fn verified(&self) -> Option<&T> {
        match self {
            VerificationResult::Verified(v) => Some(v),
            VerificationResult::Unverified(_) => None,
        }
    }

    pub fn into_verified(self) -> Option<T> {
        match self {
            VerificationResult::Verified(v) => Some(v),
            VerificationResult::Unverified(_) => None,
        }
    }

    /// Convert to a `Result`, for callers that propagate the reason with `?`.
    pub fn into_result(self) -> Result<T, VerificationError> {
        match self {
            VerificationResult::Verified(v) => Ok(v),
            VerificationResult::Unverified(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> VerificationResult<U> {
        match self {
            VerificationResult::Verified(v) => VerificationResult::Verified(f(v)),
            VerificationResult::Unverified(e) => VerificationResult::Unverified(e),
        }
    }
}

/// Ownership change implied by a single verified transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipDelta {
    Grant,
    Revoke,
}

/// Incremental ownership rule: a transaction without a revocation date grants
/// its product, one with a revocation date revokes it.
///
/// `is_upgraded` is deliberately not consulted here; the snapshot and
/// point-query paths are the ones that exclude upgraded transactions.
pub fn ownership_delta(transaction: &Transaction) -> OwnershipDelta {
    if transaction.revocation_date.is_none() {
        OwnershipDelta::Grant
    } else {
        OwnershipDelta::Revoke
    }
}

/// Checks signed payloads against the backend's Ed25519 public key.
#[derive(Debug, Clone)]
pub struct TransactionVerifier {
    key: VerifyingKey,
}

impl TransactionVerifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Build a verifier from a standard-base64 32-byte public key.
    pub fn from_base64(public_key: &str) -> EntitlementResult<Self> {
        let bytes = STANDARD
            .decode(public_key.trim())
            .map_err(|e| EntitlementError::config(format!("root key is not base64: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EntitlementError::config("root key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| EntitlementError::config(format!("root key rejected: {e}")))?;
        Ok(Self::new(key))
    }

    /// Verify a token and decode its payload.
    pub fn verify<T: DeserializeOwned>(&self, signed: &SignedPayload<T>) -> VerificationResult<T> {
        let body = match self.check_signature(signed.as_str()) {
            Ok(body) => body,
            Err(err) => {
                debug!(error = %err, "signed payload rejected");
                return VerificationResult::Unverified(err);
            }
        };

        match serde_json::from_slice(&body) {
            Ok(payload) => VerificationResult::Verified(payload),
            Err(e) => VerificationResult::Unverified(VerificationError::InvalidPayload(e.to_string())),
        }
    }

    pub fn verify_transaction(&self, signed: &SignedTransaction) -> VerificationResult<Transaction> {
        self.verify(signed)
    }

    pub fn verify_renewal_info(&self, signed: &SignedRenewalInfo) -> VerificationResult<RenewalInfo> {
        self.verify(signed)
    }

    /// Verify both payloads of a status record; the state passes through untouched.
    pub fn verify_status(&self, status: &SignedSubscriptionStatus) -> SubscriptionStatus {
        SubscriptionStatus {
            product_id: status.product_id.clone(),
            state: status.state,
            renewal_info: self.verify_renewal_info(&status.renewal_info),
            transaction: self.verify_transaction(&status.transaction),
        }
    }

    /// Returns the decoded payload bytes if the signature holds.
    fn check_signature(&self, token: &str) -> Result<Vec<u8>, VerificationError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(VerificationError::Malformed(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }

        let header = URL_SAFE_NO_PAD
            .decode(parts[0])
            .map_err(|_| VerificationError::Malformed("header is not base64url".to_string()))?;
        let header: Header = serde_json::from_slice(&header)
            .map_err(|_| VerificationError::Malformed("header is not JSON".to_string()))?;
        if header.alg != ALGORITHM {
            return Err(VerificationError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| VerificationError::Malformed("signature is not base64url".to_string()))?;
        let signature = Signature::from_slice(&signature)
            .map_err(|_| VerificationError::Malformed("signature has wrong length".to_string()))?;

        let message = format!("{}.{}", parts[0], parts[1]);
        self.key
            .verify(message.as_bytes(), &signature)
            .map_err(|_| VerificationError::InvalidSignature)?;

        URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| VerificationError::Malformed("payload is not base64url".to_string()))
    }
}
