//! External entitlement source (commerce backend).
//!
//! Pull-side queries live here; the push-side update feed is any
//! `EventBus<SignedTransaction>`. Every record crosses this boundary signed
//! and is verified by the store, never by the source.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use entitlekit_core::{EntitlementError, EntitlementResult, ProductId, TransactionId};
use entitlekit_verification::{
    PayloadSigner, RenewalInfo, SignedSubscriptionStatus, SignedTransaction, SubscriptionState,
    Transaction,
};

#[async_trait]
pub trait EntitlementSource: Send + Sync {
    /// Most recent transaction for a product, if it was ever purchased.
    async fn latest(&self, product_id: &ProductId) -> EntitlementResult<Option<SignedTransaction>>;

    /// Finite snapshot of the transactions that currently entitle the user:
    /// one per product, superseded (upgraded) and revoked ones excluded.
    async fn current_entitlements(&self) -> EntitlementResult<Vec<SignedTransaction>>;

    /// Status records of the subscription group a product belongs to.
    async fn subscription_statuses(
        &self,
        product_id: &ProductId,
    ) -> EntitlementResult<Vec<SignedSubscriptionStatus>>;

    /// Acknowledge a processed transaction so it is not redelivered.
    /// Must tolerate being called more than once for the same transaction.
    fn finish(&self, transaction: &Transaction);
}

#[derive(Debug, Clone)]
struct Entry {
    /// `None` for records injected as raw tokens.
    transaction: Option<Transaction>,
    signed: SignedTransaction,
}

#[derive(Debug, Default)]
struct State {
    latest: HashMap<ProductId, Entry>,
    order: Vec<ProductId>,
    statuses: HashMap<ProductId, Vec<SignedSubscriptionStatus>>,
    finished: Vec<TransactionId>,
    failure: Option<String>,
    latency: Option<Duration>,
}

/// In-memory backend for tests/dev. Signs everything it hands out with its own key.
#[derive(Debug)]
pub struct InMemoryEntitlementSource {
    signer: PayloadSigner,
    state: Mutex<State>,
}

impl InMemoryEntitlementSource {
    pub fn new(signer: PayloadSigner) -> Self {
        Self {
            signer,
            state: Mutex::new(State::default()),
        }
    }

    pub fn signer(&self) -> &PayloadSigner {
        &self.signer
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a transaction as the latest for its product and return the
    /// signed token (e.g. to push it onto the update feed as well).
    pub fn record(&self, transaction: Transaction) -> EntitlementResult<SignedTransaction> {
        let signed = self.signer.sign(&transaction)?;
        self.insert(
            transaction.product_id.clone(),
            Entry {
                transaction: Some(transaction),
                signed: signed.clone(),
            },
        );
        Ok(signed)
    }

    /// Record a raw token (possibly forged) as the latest for `product_id`.
    pub fn record_signed(&self, product_id: ProductId, signed: SignedTransaction) {
        self.insert(
            product_id,
            Entry {
                transaction: None,
                signed,
            },
        );
    }

    fn insert(&self, product_id: ProductId, entry: Entry) {
        let mut state = self.state();
        if !state.latest.contains_key(&product_id) {
            state.order.push(product_id.clone());
        }
        state.latest.insert(product_id, entry);
    }

    /// Sign and append a status record for `transaction.product_id`.
    pub fn record_status(
        &self,
        state: SubscriptionState,
        transaction: &Transaction,
        renewal_info: &RenewalInfo,
    ) -> EntitlementResult<()> {
        let status = SignedSubscriptionStatus {
            product_id: transaction.product_id.clone(),
            state,
            renewal_info: self.signer.sign(renewal_info)?,
            transaction: self.signer.sign(transaction)?,
        };
        self.record_raw_status(status);
        Ok(())
    }

    pub fn record_raw_status(&self, status: SignedSubscriptionStatus) {
        self.state()
            .statuses
            .entry(status.product_id.clone())
            .or_default()
            .push(status);
    }

    /// Make every query fail with `reason` until cleared.
    pub fn fail_queries(&self, reason: impl Into<String>) {
        self.state().failure = Some(reason.into());
    }

    pub fn clear_failure(&self) {
        self.state().failure = None;
    }

    /// Delay every query by `latency` (to exercise timeouts).
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    /// Transactions acknowledged so far, in order.
    pub fn finished(&self) -> Vec<TransactionId> {
        self.state().finished.clone()
    }

    async fn before_query(&self) -> Result<(), String> {
        let (latency, failure) = {
            let state = self.state();
            (state.latency, state.failure.clone())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EntitlementSource for InMemoryEntitlementSource {
    async fn latest(&self, product_id: &ProductId) -> EntitlementResult<Option<SignedTransaction>> {
        self.before_query()
            .await
            .map_err(EntitlementError::entitlement_query)?;
        Ok(self.state().latest.get(product_id).map(|e| e.signed.clone()))
    }

    async fn current_entitlements(&self) -> EntitlementResult<Vec<SignedTransaction>> {
        self.before_query()
            .await
            .map_err(EntitlementError::entitlement_query)?;
        let state = self.state();
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.latest.get(id))
            .filter(|e| e.transaction.as_ref().is_none_or(Transaction::grants_access))
            .map(|e| e.signed.clone())
            .collect())
    }

    async fn subscription_statuses(
        &self,
        product_id: &ProductId,
    ) -> EntitlementResult<Vec<SignedSubscriptionStatus>> {
        self.before_query()
            .await
            .map_err(EntitlementError::status_query)?;
        Ok(self
            .state()
            .statuses
            .get(product_id)
            .cloned()
            .unwrap_or_default())
    }

    fn finish(&self, transaction: &Transaction) {
        let mut state = self.state();
        if !state.finished.contains(&transaction.id) {
            state.finished.push(transaction.id.clone());
        }
    }
}
