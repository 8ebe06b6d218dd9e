//! The entitlement store.
//!
//! Holds two pieces of mutable state:
//!
//! - `owned_ids`: maintained incrementally from verified transaction updates
//!   (listener thread, purchase results). Guarded by a lock so concurrent
//!   updates never interleave a read-modify-write.
//! - `owned`: per-kind product lists derived from the backend's entitlement
//!   snapshot by [`EntitlementStore::reconcile`]. Replaced wholesale in a
//!   single `Arc` swap, so readers never see a half-updated partition.
//!
//! The catalog is loaded once and immutable afterwards.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use entitlekit_catalog::{Catalog, CatalogSource, Product, ProductKind};
use entitlekit_core::{EntitlementError, EntitlementResult, ProductId, VerificationError};
use entitlekit_events::{EventBus, InMemoryEventBus, Subscription};
use entitlekit_verification::{
    OwnershipDelta, SignedTransaction, SubscriptionStatus, Transaction, TransactionVerifier,
    VerificationResult, ownership_delta,
};

use crate::change::EntitlementChange;
use crate::config::StoreConfig;
use crate::source::EntitlementSource;
use crate::status;

/// Owned products by kind, derived from the latest reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedProducts {
    pub consumables: Vec<Product>,
    pub non_consumables: Vec<Product>,
    pub subscriptions: Vec<Product>,
}

impl OwnedProducts {
    pub fn of_kind(&self, kind: ProductKind) -> &[Product] {
        match kind {
            ProductKind::Consumable => &self.consumables,
            ProductKind::NonConsumable => &self.non_consumables,
            ProductKind::AutoRenewable => &self.subscriptions,
            ProductKind::Other => &[],
        }
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.iter().any(|p| &p.id == product_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.consumables
            .iter()
            .chain(&self.non_consumables)
            .chain(&self.subscriptions)
    }

    pub fn len(&self) -> usize {
        self.consumables.len() + self.non_consumables.len() + self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_unique(list: &mut Vec<Product>, product: &Product) {
        if !list.iter().any(|p| p.id == product.id) {
            list.push(product.clone());
        }
    }
}

pub struct EntitlementStore {
    config: StoreConfig,
    verifier: TransactionVerifier,
    source: Arc<dyn EntitlementSource>,
    catalog: OnceLock<Arc<Catalog>>,
    owned_ids: RwLock<HashSet<ProductId>>,
    owned: RwLock<Arc<OwnedProducts>>,
    changes: InMemoryEventBus<EntitlementChange>,
}

impl core::fmt::Debug for EntitlementStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntitlementStore")
            .field("config", &self.config)
            .field("owned_ids", &self.owned_ids())
            .finish_non_exhaustive()
    }
}

impl EntitlementStore {
    pub fn new(
        config: StoreConfig,
        verifier: TransactionVerifier,
        source: Arc<dyn EntitlementSource>,
    ) -> Self {
        Self {
            config,
            verifier,
            source,
            catalog: OnceLock::new(),
            owned_ids: RwLock::new(HashSet::new()),
            owned: RwLock::new(Arc::new(OwnedProducts::default())),
            changes: InMemoryEventBus::new(),
        }
    }

    /// Start with an already-fetched catalog (tests, offline mode).
    pub fn with_catalog(self, catalog: Catalog) -> Self {
        if self.catalog.set(Arc::new(catalog)).is_err() {
            debug!("catalog already set; ignoring replacement");
        }
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn verifier(&self) -> &TransactionVerifier {
        &self.verifier
    }

    /// Fetch the configured products once.
    ///
    /// A failed or timed-out fetch is logged and leaves the catalog empty;
    /// there is no retry. Loading twice is rejected.
    pub async fn load_catalog(&self, source: &dyn CatalogSource) -> EntitlementResult<Arc<Catalog>> {
        if self.catalog.get().is_some() {
            return Err(EntitlementError::CatalogAlreadyLoaded);
        }

        let ids = self.config.product_ids.clone();
        let catalog = self
            .bounded("catalog fetch", Catalog::fetch(source, &ids))
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "catalog fetch did not complete; catalog left empty");
                Catalog::empty()
            });

        let catalog = Arc::new(catalog);
        self.catalog
            .set(catalog.clone())
            .map_err(|_| EntitlementError::CatalogAlreadyLoaded)?;

        info!(products = catalog.len(), "catalog loaded");
        self.notify(EntitlementChange::CatalogLoaded {
            products: catalog.len(),
        });
        Ok(catalog)
    }

    /// The loaded catalog, or an empty one before `load_catalog` completed.
    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog
            .get()
            .cloned()
            .unwrap_or_else(|| Arc::new(Catalog::empty()))
    }

    /// Apply one verified transaction to `owned_ids`.
    ///
    /// Idempotent: replaying a grant or a revocation leaves the set unchanged.
    /// Returns whether the set changed.
    ///
    /// The change is published while the write lock is held, so observers
    /// see notifications in the same order as the mutations.
    pub fn apply_transaction(&self, transaction: &Transaction) -> bool {
        let delta = ownership_delta(transaction);
        let mut ids = self.owned_ids.write().unwrap_or_else(PoisonError::into_inner);
        let changed = match delta {
            OwnershipDelta::Grant => ids.insert(transaction.product_id.clone()),
            OwnershipDelta::Revoke => ids.remove(&transaction.product_id),
        };

        debug!(
            product_id = %transaction.product_id,
            transaction_id = %transaction.id,
            ?delta,
            changed,
            "transaction applied"
        );

        if changed {
            let change = match delta {
                OwnershipDelta::Grant => EntitlementChange::Granted(transaction.product_id.clone()),
                OwnershipDelta::Revoke => EntitlementChange::Revoked(transaction.product_id.clone()),
            };
            self.notify(change);
        }
        changed
    }

    /// Verify, apply and acknowledge one transaction update.
    ///
    /// Unverified updates are logged and dropped without acknowledgment.
    pub fn handle_update(&self, signed: &SignedTransaction) -> Option<Transaction> {
        match self.accept_update(signed) {
            Ok(transaction) => Some(transaction),
            Err(err) => {
                warn!(error = %err, "transaction update rejected");
                None
            }
        }
    }

    pub(crate) fn accept_update(&self, signed: &SignedTransaction) -> EntitlementResult<Transaction> {
        let transaction = self.verifier.verify_transaction(signed).into_result()?;
        self.apply_transaction(&transaction);
        self.source.finish(&transaction);
        Ok(transaction)
    }

    pub fn owned_ids(&self) -> HashSet<ProductId> {
        self.owned_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_owned(&self, product_id: &ProductId) -> bool {
        self.owned_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(product_id)
    }

    /// Point-in-time purchase check against the backend, independent of `owned_ids`.
    ///
    /// True iff the latest transaction exists, verifies, is not revoked and
    /// is not upgraded. Any failure reads as "not purchased".
    pub async fn is_purchased(&self, product_id: &ProductId) -> bool {
        match self.latest_transaction(product_id).await {
            Some(VerificationResult::Verified(transaction)) => transaction.grants_access(),
            Some(VerificationResult::Unverified(reason)) => {
                warn!(%product_id, error = %reason, "latest transaction not verified");
                false
            }
            None => false,
        }
    }

    /// The backend's latest transaction for `product_id`, verified.
    ///
    /// `None` when there is no transaction or the lookup failed. A lookup
    /// that exceeds the bound reads as `Unverified(Timeout)`.
    pub async fn latest_transaction(
        &self,
        product_id: &ProductId,
    ) -> Option<VerificationResult<Transaction>> {
        match self.bounded("latest transaction", self.source.latest(product_id)).await {
            Ok(Ok(latest)) => latest.map(|signed| self.verifier.verify_transaction(&signed)),
            Ok(Err(err)) => {
                warn!(%product_id, error = %err, "latest transaction lookup failed");
                None
            }
            Err(err) => {
                warn!(%product_id, error = %err, "latest transaction lookup timed out");
                Some(VerificationResult::Unverified(VerificationError::Timeout))
            }
        }
    }

    /// Rebuild the per-kind owned lists from the backend's entitlement snapshot.
    ///
    /// Only verified transactions count; each is matched against catalog
    /// products of its own kind and dropped if the catalog does not know it.
    /// A snapshot that cannot be fetched in time counts as empty.
    pub async fn reconcile(&self) -> Arc<OwnedProducts> {
        let snapshot = match self
            .bounded("current entitlements", self.source.current_entitlements())
            .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(err)) | Err(err) => {
                warn!(error = %err, "entitlement snapshot unavailable; reconciling as empty");
                Vec::new()
            }
        };

        let catalog = self.catalog();
        let mut next = OwnedProducts::default();
        for signed in &snapshot {
            let transaction = match self.verifier.verify_transaction(signed) {
                VerificationResult::Verified(t) => t,
                VerificationResult::Unverified(reason) => {
                    warn!(error = %reason, "entitlement failed verification; skipped");
                    continue;
                }
            };

            let Some(product) = catalog.find(transaction.product_kind, &transaction.product_id) else {
                debug!(
                    product_id = %transaction.product_id,
                    kind = ?transaction.product_kind,
                    "entitlement for product outside the catalog; skipped"
                );
                continue;
            };

            let list = match transaction.product_kind {
                ProductKind::Consumable => &mut next.consumables,
                ProductKind::NonConsumable => &mut next.non_consumables,
                ProductKind::AutoRenewable => &mut next.subscriptions,
                ProductKind::Other => continue,
            };
            OwnedProducts::push_unique(list, product);
        }

        let next = Arc::new(next);
        let mut owned = self.owned.write().unwrap_or_else(PoisonError::into_inner);
        *owned = next.clone();

        info!(
            snapshot = snapshot.len(),
            consumables = next.consumables.len(),
            non_consumables = next.non_consumables.len(),
            subscriptions = next.subscriptions.len(),
            "entitlements reconciled"
        );
        self.notify(EntitlementChange::Reconciled {
            consumables: next.consumables.len(),
            non_consumables: next.non_consumables.len(),
            subscriptions: next.subscriptions.len(),
        });
        drop(owned);
        next
    }

    /// Lists from the latest reconcile (empty before the first one).
    pub fn owned_products(&self) -> Arc<OwnedProducts> {
        self.owned
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current status of an auto-renewable product.
    ///
    /// Prefers the first record that is neither expired nor revoked; `None`
    /// for other product kinds, when no such record exists, or when the
    /// lookup fails.
    pub async fn subscription_status(&self, product: &Product) -> Option<SubscriptionStatus> {
        if !product.is_auto_renewable() {
            return None;
        }

        let statuses = match self
            .bounded("subscription status", self.source.subscription_statuses(&product.id))
            .await
        {
            Ok(Ok(statuses)) => statuses,
            Ok(Err(err)) | Err(err) => {
                warn!(product_id = %product.id, error = %err, "subscription status unavailable");
                return None;
            }
        };

        statuses
            .iter()
            .find(|s| !s.state.is_terminal())
            .map(|s| self.verifier.verify_status(s))
    }

    /// User-facing description of `status`, resolving renewal targets against the catalog.
    pub fn status_message(
        &self,
        status: &SubscriptionStatus,
        product: &Product,
        now: DateTime<Utc>,
    ) -> String {
        status::describe(status, product, self.catalog().auto_renewables(), now)
    }

    /// Observe ownership changes. Each subscription sees changes published after it was created.
    pub fn subscribe_changes(&self) -> Subscription<EntitlementChange> {
        self.changes.subscribe()
    }

    fn notify(&self, change: EntitlementChange) {
        if let Err(err) = self.changes.publish(change) {
            warn!(error = ?err, "failed to publish entitlement change");
        }
    }

    /// Run an external call under the configured bound.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = T>,
    ) -> Result<T, EntitlementError> {
        let timeout = self.config.query_timeout();
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| EntitlementError::Timeout {
                operation,
                millis: self.config.query_timeout_ms,
            })
    }
}
