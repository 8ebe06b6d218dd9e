//! Entitlement reconciliation.
//!
//! Ingests signed transaction updates, keeps the set of owned product ids,
//! derives per-kind owned product lists from the backend's entitlement
//! snapshot and answers point queries about purchases and subscriptions.

pub mod change;
pub mod config;
pub mod listener;
pub mod purchase;
pub mod source;
pub mod status;
pub mod store;

mod integration_tests;

pub use change::EntitlementChange;
pub use config::StoreConfig;
pub use listener::{ListenerHandle, ListenerStats, TransactionListener};
pub use purchase::PurchaseResult;
pub use source::{EntitlementSource, InMemoryEntitlementSource};
pub use status::describe as describe_status;
pub use store::{EntitlementStore, OwnedProducts};
