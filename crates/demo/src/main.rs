//! Runs the entitlement core against an in-memory backend and prints what a
//! purchases screen would render.

mod fixtures;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use entitlekit_catalog::{InMemoryCatalogSource, Product, ProductKind};
use entitlekit_entitlements::{
    EntitlementStore, InMemoryEntitlementSource, PurchaseResult, StoreConfig, TransactionListener,
};
use entitlekit_events::{EventBus, InMemoryEventBus};
use entitlekit_verification::{PayloadSigner, SignedTransaction, SubscriptionState, TransactionVerifier};

/// Fixed development key; real deployments configure `ENTITLEKIT_ROOT_KEY`.
const DEV_SIGNING_SEED: [u8; 32] = [0x2a; 32];

#[derive(Debug, Serialize)]
struct Section {
    kind: &'static str,
    products: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusLine {
    product: String,
    price: String,
    purchased: bool,
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct Summary {
    owned_ids: Vec<String>,
    sections: Vec<Section>,
    subscriptions: Vec<StatusLine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    entitlekit_observability::init();

    let config = StoreConfig::from_env();
    let signer = PayloadSigner::from_seed(DEV_SIGNING_SEED);
    let verifier = match config.root_key.as_deref() {
        Some(key) => TransactionVerifier::from_base64(key)?,
        None => {
            tracing::warn!("ENTITLEKIT_ROOT_KEY not set; trusting the built-in dev key");
            TransactionVerifier::new(signer.verifying_key())
        }
    };

    let source = Arc::new(InMemoryEntitlementSource::new(signer));
    let store = Arc::new(EntitlementStore::new(config, verifier, source.clone()));
    store.load_catalog(&InMemoryCatalogSource::new(fixtures::catalog()?)).await?;

    let feed: Arc<InMemoryEventBus<SignedTransaction>> = Arc::new(InMemoryEventBus::new());
    let listener = TransactionListener::spawn(store.clone(), &feed)?;

    let now = Utc::now();

    // Purchases made in this session come back as purchase results.
    let backpack = source.record(fixtures::transaction(
        "com.amzn.backpack",
        ProductKind::NonConsumable,
        now - Duration::days(3),
    )?)?;
    store.handle_purchase_result(PurchaseResult::Success(backpack));
    store.handle_purchase_result(PurchaseResult::UserCancelled);

    // Purchases made elsewhere arrive on the update feed.
    let home = fixtures::transaction("com.sub.home", ProductKind::AutoRenewable, now - Duration::days(10))?;
    feed.publish(source.record(home.clone())?)
        .map_err(|e| anyhow::anyhow!("publish failed: {e:?}"))?;
    source.record_status(
        SubscriptionState::Subscribed,
        &home,
        &fixtures::renewal_switching_to("com.sub.home", "com.sub.living")?,
    )?;

    let living = fixtures::transaction("com.sub.living", ProductKind::AutoRenewable, now - Duration::days(45))?;
    source.record(living.clone())?;
    source.record_status(
        SubscriptionState::InBillingRetryPeriod,
        &living,
        &fixtures::renewal_after_billing_error("com.sub.living")?,
    )?;

    let scooter = fixtures::transaction("com.amzn.scooter", ProductKind::NonConsumable, now - Duration::days(60))?;
    let mut refund = scooter.clone();
    refund.revocation_date = Some(now - Duration::days(1));
    feed.publish(source.record(scooter)?)
        .map_err(|e| anyhow::anyhow!("publish failed: {e:?}"))?;
    feed.publish(source.record(refund)?)
        .map_err(|e| anyhow::anyhow!("publish failed: {e:?}"))?;

    // Give the listener a moment to drain the feed before rendering.
    tokio::time::sleep(store.config().listener_tick() * 2).await;

    let owned = store.reconcile().await;
    let catalog = store.catalog();

    let mut owned_ids: Vec<String> = store.owned_ids().into_iter().map(|id| id.into_inner()).collect();
    owned_ids.sort();

    let sections = [ProductKind::Consumable, ProductKind::NonConsumable, ProductKind::AutoRenewable]
        .into_iter()
        .filter(|kind| !owned.of_kind(*kind).is_empty())
        .map(|kind| Section {
            kind: kind.label(),
            products: owned.of_kind(kind).iter().map(|p| p.display.name.clone()).collect(),
        })
        .collect();

    let mut subscriptions = Vec::new();
    for product in catalog.auto_renewables() {
        subscriptions.push(status_line(&store, product, now).await);
    }

    let summary = Summary {
        owned_ids,
        sections,
        subscriptions,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    listener.shutdown();
    Ok(())
}

async fn status_line(store: &EntitlementStore, product: &Product, now: chrono::DateTime<Utc>) -> StatusLine {
    let purchased = store.is_purchased(&product.id).await;
    let status = store
        .subscription_status(product)
        .await
        .map(|status| store.status_message(&status, product, now));
    let period = product
        .subscription
        .map(|period| period.describe())
        .unwrap_or_default();

    StatusLine {
        product: product.display.name.clone(),
        price: format!("{}{}", product.display.price, period),
        purchased,
        status,
    }
}
