//! Product catalog.
//!
//! Products are fetched once at startup and never mutated afterwards; the
//! display metadata they carry is opaque to the entitlement logic.

pub mod catalog;
pub mod product;

pub use catalog::{Catalog, CatalogSource, InMemoryCatalogSource};
pub use product::{DisplayMetadata, PeriodUnit, Product, ProductKind, SubscriptionPeriod};
