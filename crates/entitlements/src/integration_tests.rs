//! Integration tests for the update pipeline.
//!
//! Tests: Feed → Listener → Verifier → Store → change notifications
//!
//! Verifies:
//! - Verified updates change ownership and are acknowledged once
//! - Forged updates are rejected without touching state
//! - Shutdown joins the listener and stops consumption

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use chrono::{TimeZone, Utc};

    use entitlekit_catalog::{Catalog, DisplayMetadata, Product, ProductKind};
    use entitlekit_core::{EntitlementError, ProductId, TransactionId, VerificationError};
    use entitlekit_events::{EventBus, InMemoryEventBus};
    use entitlekit_verification::{PayloadSigner, SignedTransaction, Transaction, TransactionVerifier};

    use crate::change::EntitlementChange;
    use crate::config::StoreConfig;
    use crate::listener::{ListenerHandle, ListenerStats, TransactionListener};
    use crate::purchase::PurchaseResult;
    use crate::source::InMemoryEntitlementSource;
    use crate::store::EntitlementStore;

    type Feed = Arc<InMemoryEventBus<SignedTransaction>>;

    fn pid(id: &str) -> ProductId {
        ProductId::new(id).unwrap()
    }

    fn transaction(id: &str, kind: ProductKind) -> Transaction {
        Transaction {
            id: TransactionId::generate(),
            product_id: pid(id),
            product_kind: kind,
            purchase_date: Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap(),
            expiration_date: None,
            revocation_date: None,
            is_upgraded: false,
        }
    }

    fn setup() -> (Arc<InMemoryEntitlementSource>, Arc<EntitlementStore>, Feed, ListenerHandle) {
        let source = Arc::new(InMemoryEntitlementSource::new(PayloadSigner::from_seed([5u8; 32])));
        let verifier = TransactionVerifier::new(source.signer().verifying_key());
        let config = StoreConfig::default().with_listener_tick(Duration::from_millis(10));
        let catalog = Catalog::from_products(vec![Product::new(
            pid("com.sub.home"),
            ProductKind::AutoRenewable,
            DisplayMetadata {
                name: "Home".to_string(),
                price: "$4.99".to_string(),
                description: "Home subscription".to_string(),
            },
        )]);
        let store = Arc::new(EntitlementStore::new(config, verifier, source.clone()).with_catalog(catalog));
        let feed: Feed = Arc::new(InMemoryEventBus::new());
        let listener = TransactionListener::spawn(store.clone(), &feed).unwrap();
        (source, store, feed, listener)
    }

    /// Poll until the listener has received `count` updates.
    fn wait_for_received(listener: &ListenerHandle, count: u64) -> ListenerStats {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let stats = listener.stats();
            if stats.received >= count || Instant::now() > deadline {
                return stats;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn pushed_update_grants_and_is_acknowledged() {
        let (source, store, feed, listener) = setup();
        let t = transaction("com.sub.home", ProductKind::AutoRenewable);

        feed.publish(source.signer().sign(&t).unwrap()).unwrap();
        let stats = wait_for_received(&listener, 1);

        assert_eq!(stats, ListenerStats { received: 1, applied: 1, rejected: 0 });
        assert!(store.is_owned(&t.product_id));
        assert_eq!(source.finished(), vec![t.id]);
        listener.shutdown();
    }

    #[test]
    fn pushed_refund_revokes() {
        let (source, store, feed, listener) = setup();
        let t = transaction("com.sub.home", ProductKind::AutoRenewable);
        let mut refund = t.clone();
        refund.id = TransactionId::generate();
        refund.revocation_date = Some(Utc.with_ymd_and_hms(2025, 5, 3, 10, 0, 0).unwrap());

        feed.publish(source.signer().sign(&t).unwrap()).unwrap();
        feed.publish(source.signer().sign(&refund).unwrap()).unwrap();
        wait_for_received(&listener, 2);

        assert!(!store.is_owned(&t.product_id));
        assert_eq!(source.finished().len(), 2);
        listener.shutdown();
    }

    #[test]
    fn forged_update_is_rejected() {
        let (source, store, feed, listener) = setup();
        let forged = PayloadSigner::from_seed([99u8; 32])
            .sign(&transaction("com.sub.home", ProductKind::AutoRenewable))
            .unwrap();

        feed.publish(forged).unwrap();
        let stats = wait_for_received(&listener, 1);

        assert_eq!(stats.rejected, 1);
        assert!(store.owned_ids().is_empty());
        assert!(source.finished().is_empty());
        listener.shutdown();
    }

    #[test]
    fn observers_see_listener_changes() {
        let (source, store, feed, listener) = setup();
        let changes = store.subscribe_changes();
        let t = transaction("com.sub.home", ProductKind::AutoRenewable);

        feed.publish(source.signer().sign(&t).unwrap()).unwrap();

        let change = changes.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(change, EntitlementChange::Granted(t.product_id));
        listener.shutdown();
    }

    #[test]
    fn shutdown_stops_consumption() {
        let (source, store, feed, listener) = setup();
        assert!(listener.is_running());
        listener.shutdown();

        feed.publish(
            source
                .signer()
                .sign(&transaction("com.sub.home", ProductKind::AutoRenewable))
                .unwrap(),
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert!(store.owned_ids().is_empty());
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn dropping_the_handle_joins_the_listener() {
        let (_, store, _feed, listener) = setup();
        drop(listener);

        // The listener's clone of the store is released once the thread has exited.
        assert_eq!(Arc::strong_count(&store), 1);
    }

    #[test]
    fn purchase_outcomes() {
        let (source, store, _feed, listener) = setup();
        let t = transaction("com.sub.home", ProductKind::AutoRenewable);

        assert!(store.handle_purchase_result(PurchaseResult::UserCancelled).is_none());
        assert!(store.handle_purchase_result(PurchaseResult::Pending).is_none());
        assert!(store
            .handle_purchase_result(PurchaseResult::Failed("card declined".to_string()))
            .is_none());
        assert!(store.owned_ids().is_empty());

        let signed = source.signer().sign(&t).unwrap();
        let purchased = store.handle_purchase_result(PurchaseResult::Success(signed));

        assert_eq!(purchased, Some(t.clone()));
        assert!(store.is_owned(&t.product_id));
        assert_eq!(source.finished(), vec![t.id]);
        listener.shutdown();
    }

    #[test]
    fn forged_purchase_is_a_verification_error() {
        let (source, store, _feed, listener) = setup();
        let forged = PayloadSigner::from_seed([99u8; 32])
            .sign(&transaction("com.apple.mac", ProductKind::Consumable))
            .unwrap();

        let result = store.complete_purchase(PurchaseResult::Success(forged));

        assert_eq!(
            result,
            Err(EntitlementError::Verification(VerificationError::InvalidSignature))
        );
        assert!(store.owned_ids().is_empty());
        assert!(source.finished().is_empty());
        listener.shutdown();
    }

    #[tokio::test]
    async fn pushed_update_and_reconcile_agree() {
        let (source, store, feed, listener) = setup();
        let t = transaction("com.sub.home", ProductKind::AutoRenewable);

        let signed = source.record(t.clone()).unwrap();
        feed.publish(signed).unwrap();
        wait_for_received(&listener, 1);

        let owned = store.reconcile().await;

        assert!(store.is_owned(&t.product_id));
        assert!(owned.contains(&t.product_id));
        assert!(store.is_purchased(&t.product_id).await);
        listener.shutdown();
    }
}
