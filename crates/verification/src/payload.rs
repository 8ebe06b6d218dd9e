//! Records carried inside signed payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use entitlekit_catalog::ProductKind;
use entitlekit_core::{ProductId, TransactionId};

use crate::jws::{SignedRenewalInfo, SignedTransaction};
use crate::verifier::VerificationResult;

/// A purchase transaction as issued by the commerce backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub product_kind: ProductKind,
    pub purchase_date: DateTime<Utc>,
    /// Subscriptions only.
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Present when the purchase was refunded or otherwise revoked.
    #[serde(default)]
    pub revocation_date: Option<DateTime<Utc>>,
    /// Superseded by a purchase of a higher tier in the same subscription group.
    #[serde(default)]
    pub is_upgraded: bool,
}

impl Transaction {
    pub fn is_revoked(&self) -> bool {
        self.revocation_date.is_some()
    }

    /// Not revoked and not superseded by an upgrade.
    pub fn grants_access(&self) -> bool {
        !self.is_revoked() && !self.is_upgraded
    }
}

/// Why a subscription stopped renewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpirationReason {
    AutoRenewDisabled,
    BillingError,
    DidNotConsentToPriceIncrease,
    ProductUnavailable,
    Unknown,
}

/// Renewal preferences of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalInfo {
    pub product_id: ProductId,
    pub will_auto_renew: bool,
    /// Product the subscription will renew into (differs on a pending crossgrade/downgrade).
    #[serde(default)]
    pub auto_renew_preference: Option<ProductId>,
    #[serde(default)]
    pub expiration_reason: Option<ExpirationReason>,
    #[serde(default)]
    pub grace_period_expiration_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionState {
    Subscribed,
    Expired,
    Revoked,
    InGracePeriod,
    InBillingRetryPeriod,
    Other,
}

impl SubscriptionState {
    /// Expired and revoked are terminal; the others still (or may again) grant service.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionState::Expired | SubscriptionState::Revoked)
    }
}

/// A status record as returned by the backend, before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSubscriptionStatus {
    pub product_id: ProductId,
    pub state: SubscriptionState,
    pub renewal_info: SignedRenewalInfo,
    pub transaction: SignedTransaction,
}

/// A status record after both payloads went through the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub product_id: ProductId,
    pub state: SubscriptionState,
    pub renewal_info: VerificationResult<RenewalInfo>,
    pub transaction: VerificationResult<Transaction>,
}

impl SubscriptionStatus {
    /// Both payloads verified.
    pub fn verified_parts(&self) -> Option<(&RenewalInfo, &Transaction)> {
        Some((self.renewal_info.verified()?, self.transaction.verified()?))
    }
}
