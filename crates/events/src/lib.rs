//! Push-style message distribution.
//!
//! Two streams flow through this crate: the transaction-update feed coming
//! from the commerce backend, and the change notifications the entitlement
//! store publishes to its observers.

pub mod bus;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
