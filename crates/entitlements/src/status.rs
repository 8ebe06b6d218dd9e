//! Subscription status messages.

use chrono::{DateTime, Utc};

use entitlekit_catalog::Product;
use entitlekit_verification::{ExpirationReason, RenewalInfo, SubscriptionState, SubscriptionStatus};

pub const UNVERIFIED_STATUS: &str = "The App Store could not verify your subscription status.";

/// Build the user-facing description of a subscription status.
///
/// `subscriptions` is the known auto-renewable catalog, used to name the
/// product a subscription will switch to. `now` decides between "will
/// expire" and "expired" for subscriptions the user stopped renewing.
pub fn describe(
    status: &SubscriptionStatus,
    product: &Product,
    subscriptions: &[Product],
    now: DateTime<Utc>,
) -> String {
    let Some((renewal_info, transaction)) = status.verified_parts() else {
        return UNVERIFIED_STATUS.to_string();
    };
    let name = product.display_name();

    let mut description = match status.state {
        SubscriptionState::Subscribed => format!("You are currently subscribed to {name}."),
        SubscriptionState::Expired => match (transaction.expiration_date, renewal_info.expiration_reason) {
            (Some(expiration), Some(reason)) => expiration_description(reason, expiration, now),
            _ => String::new(),
        },
        SubscriptionState::Revoked => match transaction.revocation_date {
            Some(revoked) => format!(
                "Your subscription to {name} was refunded on {}.",
                format_date(revoked)
            ),
            None => String::new(),
        },
        SubscriptionState::InGracePeriod => grace_period_description(name, renewal_info),
        SubscriptionState::InBillingRetryPeriod => format!(
            "The App Store could not confirm your billing information for {name}. \
             Please verify your billing information to resume service."
        ),
        SubscriptionState::Other => String::new(),
    };

    if let Some(expiration) = transaction.expiration_date {
        description.push_str(&renewal_description(product, renewal_info, subscriptions, expiration));
    }
    description
}

fn grace_period_description(name: &str, renewal_info: &RenewalInfo) -> String {
    let mut description = format!("The App Store could not confirm your billing information for {name}.");
    if let Some(date) = renewal_info.grace_period_expiration_date {
        description.push_str(&format!(
            " Please verify your billing information to continue service after {}",
            format_date(date)
        ));
    }
    description
}

/// Renewal clause: a pending switch to another known subscription, then the
/// next billing date, else nothing.
fn renewal_description(
    product: &Product,
    renewal_info: &RenewalInfo,
    subscriptions: &[Product],
    expiration: DateTime<Utc>,
) -> String {
    let switch_target = renewal_info
        .auto_renew_preference
        .as_ref()
        .filter(|id| **id != product.id)
        .and_then(|id| subscriptions.iter().find(|p| &p.id == id));

    if let Some(next) = switch_target {
        return format!(
            "\nYour subscription to {} will begin when your current subscription expires on {}.",
            next.display_name(),
            format_date(expiration)
        );
    }

    if renewal_info.will_auto_renew {
        return format!("\nNext billing date: {}.", format_date(expiration));
    }

    String::new()
}

fn expiration_description(
    reason: ExpirationReason,
    expiration: DateTime<Utc>,
    now: DateTime<Utc>,
) -> String {
    match reason {
        ExpirationReason::AutoRenewDisabled if expiration > now => {
            format!("Your subscription will expire on {}.", format_date(expiration))
        }
        ExpirationReason::AutoRenewDisabled => {
            format!("Your subscription expired on {}.", format_date(expiration))
        }
        ExpirationReason::BillingError => {
            "Your subscription was not renewed due to a billing error.".to_string()
        }
        ExpirationReason::DidNotConsentToPriceIncrease => {
            "Your subscription was not renewed due to a price increase that you disapproved.".to_string()
        }
        ExpirationReason::ProductUnavailable => {
            "Your subscription was not renewed because the product is no longer available.".to_string()
        }
        ExpirationReason::Unknown => "Your subscription was not renewed.".to_string(),
    }
}

/// `MMM dd, yyyy`, e.g. `Mar 05, 2025`.
fn format_date(date: DateTime<Utc>) -> String {
    date.format("%b %d, %Y").to_string()
}
