use serde::{Deserialize, Serialize};

use entitlekit_core::ProductId;

/// What kind of purchase a product represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProductKind {
    Consumable,
    NonConsumable,
    AutoRenewable,
    /// Anything the entitlement logic does not track (e.g. non-renewing subscriptions).
    #[serde(alias = "nonRenewable")]
    Other,
}

impl ProductKind {
    /// Section label used when listing owned products by kind.
    pub fn label(&self) -> &'static str {
        match self {
            ProductKind::Consumable => "CONSUMABLE",
            ProductKind::NonConsumable => "NON-CONSUMABLE",
            ProductKind::AutoRenewable => "AUTO-RENEWABLE",
            ProductKind::Other => "OTHER",
        }
    }
}

/// Display metadata, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    pub name: String,
    /// Localized, already formatted price (e.g. "$4.99").
    pub price: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

impl PeriodUnit {
    fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Week => "week",
            PeriodUnit::Month => "month",
            PeriodUnit::Year => "year",
        }
    }
}

/// Billing period of an auto-renewable subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPeriod {
    pub value: u32,
    pub unit: PeriodUnit,
}

impl SubscriptionPeriod {
    /// Price suffix, e.g. `" / 1 month"` or `" / 3 months"`.
    pub fn describe(&self) -> String {
        let plural = if self.value > 1 { "s" } else { "" };
        format!(" / {} {}{}", self.value, self.unit.as_str(), plural)
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub kind: ProductKind,
    pub display: DisplayMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionPeriod>,
}

impl Product {
    pub fn new(id: ProductId, kind: ProductKind, display: DisplayMetadata) -> Self {
        Self {
            id,
            kind,
            display,
            subscription: None,
        }
    }

    pub fn with_subscription_period(mut self, period: SubscriptionPeriod) -> Self {
        self.subscription = Some(period);
        self
    }

    pub fn display_name(&self) -> &str {
        &self.display.name
    }

    pub fn is_auto_renewable(&self) -> bool {
        self.kind == ProductKind::AutoRenewable
    }
}
