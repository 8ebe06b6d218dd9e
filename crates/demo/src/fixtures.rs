//! Sample catalog and purchase history for the demo backend.

use chrono::{DateTime, Duration, Utc};

use entitlekit_catalog::{DisplayMetadata, PeriodUnit, Product, ProductKind, SubscriptionPeriod};
use entitlekit_core::{EntitlementResult, ProductId, TransactionId};
use entitlekit_verification::{ExpirationReason, RenewalInfo, Transaction};

fn product(id: &str, kind: ProductKind, name: &str, price: &str) -> EntitlementResult<Product> {
    Ok(Product::new(
        ProductId::new(id)?,
        kind,
        DisplayMetadata {
            name: name.to_string(),
            price: price.to_string(),
            description: format!("{name} ({price})"),
        },
    ))
}

pub fn catalog() -> EntitlementResult<Vec<Product>> {
    let monthly = SubscriptionPeriod {
        value: 1,
        unit: PeriodUnit::Month,
    };
    Ok(vec![
        product("com.apple.mac", ProductKind::Consumable, "Mac", "$1,299.00")?,
        product("com.apple.pad", ProductKind::Consumable, "iPad", "$329.00")?,
        product("com.apple.phone", ProductKind::Consumable, "iPhone", "$799.00")?,
        product("com.apple.watch", ProductKind::Consumable, "Apple Watch", "$249.00")?,
        product("com.amzn.backpack", ProductKind::NonConsumable, "Backpack", "$49.99")?,
        product("com.amzn.scooter", ProductKind::NonConsumable, "Scooter", "$199.99")?,
        product("com.amzn.headphone", ProductKind::NonConsumable, "Headphones", "$89.99")?,
        product("com.sub.home", ProductKind::AutoRenewable, "Home", "$4.99")?.with_subscription_period(monthly),
        product("com.sub.living", ProductKind::AutoRenewable, "Living", "$9.99")?
            .with_subscription_period(monthly),
    ])
}

pub fn transaction(
    product_id: &str,
    kind: ProductKind,
    purchased: DateTime<Utc>,
) -> EntitlementResult<Transaction> {
    let expiration_date = (kind == ProductKind::AutoRenewable).then(|| purchased + Duration::days(30));
    Ok(Transaction {
        id: TransactionId::generate(),
        product_id: ProductId::new(product_id)?,
        product_kind: kind,
        purchase_date: purchased,
        expiration_date,
        revocation_date: None,
        is_upgraded: false,
    })
}

/// Renewal info for a subscription the user plans to switch to `next`.
pub fn renewal_switching_to(product_id: &str, next: &str) -> EntitlementResult<RenewalInfo> {
    Ok(RenewalInfo {
        product_id: ProductId::new(product_id)?,
        will_auto_renew: true,
        auto_renew_preference: Some(ProductId::new(next)?),
        expiration_reason: None,
        grace_period_expiration_date: None,
    })
}

/// Renewal info for a subscription that lapsed after a billing problem.
pub fn renewal_after_billing_error(product_id: &str) -> EntitlementResult<RenewalInfo> {
    Ok(RenewalInfo {
        product_id: ProductId::new(product_id)?,
        will_auto_renew: false,
        auto_renew_preference: Some(ProductId::new(product_id)?),
        expiration_reason: Some(ExpirationReason::BillingError),
        grace_period_expiration_date: None,
    })
}
