use entitlekit_core::ProductId;

/// Notification published by the store after it changed owned state.
///
/// Observers subscribe through `EntitlementStore::subscribe_changes` and
/// re-read whatever they render; the payload only says what moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementChange {
    CatalogLoaded { products: usize },
    Granted(ProductId),
    Revoked(ProductId),
    Reconciled {
        consumables: usize,
        non_consumables: usize,
        subscriptions: usize,
    },
}
