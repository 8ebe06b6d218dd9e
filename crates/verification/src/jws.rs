//! Compact signed token format.
//!
//! A token is `header.payload.signature`, each segment base64url without
//! padding. The header is `{"alg":"EdDSA","typ":"JWS"}`, the payload is the
//! JSON record, and the signature is Ed25519 over the ASCII bytes of
//! `header.payload`.

use core::marker::PhantomData;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use entitlekit_core::{EntitlementError, EntitlementResult};

use crate::payload::{RenewalInfo, Transaction};

pub(crate) const ALGORITHM: &str = "EdDSA";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Header {
    pub alg: String,
    #[serde(default)]
    pub typ: Option<String>,
}

/// A signed token whose payload decodes to `T` once verified.
///
/// The type parameter only records what the payload is expected to be; no
/// decoding happens until [`crate::TransactionVerifier::verify`].
pub struct SignedPayload<T> {
    token: String,
    _payload: PhantomData<fn() -> T>,
}

pub type SignedTransaction = SignedPayload<Transaction>;
pub type SignedRenewalInfo = SignedPayload<RenewalInfo>;

impl<T> SignedPayload<T> {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            _payload: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn into_token(self) -> String {
        self.token
    }
}

impl<T> Clone for SignedPayload<T> {
    fn clone(&self) -> Self {
        Self::from_token(self.token.clone())
    }
}

impl<T> PartialEq for SignedPayload<T> {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl<T> Eq for SignedPayload<T> {}

impl<T> core::fmt::Debug for SignedPayload<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("SignedPayload").field(&self.token).finish()
    }
}

/// Issues signed tokens. Stands in for the commerce backend in local sources.
pub struct PayloadSigner {
    key: SigningKey,
}

impl PayloadSigner {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Standard base64 encoding of the public key, as accepted by
    /// [`crate::TransactionVerifier::from_base64`].
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.verifying_key().as_bytes())
    }

    pub fn sign<T: Serialize>(&self, payload: &T) -> EntitlementResult<SignedPayload<T>> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWS".to_string()),
        };
        let header = serde_json::to_vec(&header)
            .map_err(|e| EntitlementError::validation(format!("encode header: {e}")))?;
        let body = serde_json::to_vec(payload)
            .map_err(|e| EntitlementError::validation(format!("encode payload: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(body)
        );
        let signature = self.key.sign(signing_input.as_bytes());

        Ok(SignedPayload::from_token(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )))
    }
}

impl core::fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PayloadSigner")
            .field("public_key", &self.public_key_base64())
            .finish()
    }
}
