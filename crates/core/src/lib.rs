//! `entitlekit-core` — shared building blocks for the entitlement crates.
//!
//! This crate contains **pure** primitives (identifiers, error taxonomy) and
//! performs no IO.

pub mod error;
pub mod id;

pub use error::{EntitlementError, EntitlementResult, VerificationError};
pub use id::{ProductId, TransactionId};
