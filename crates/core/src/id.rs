//! Strongly-typed identifiers.
//!
//! Product and transaction identifiers are opaque strings assigned by the
//! commerce backend; the only local rule is that they are non-empty once
//! trimmed.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EntitlementError;

/// Identifier of a catalog product (e.g. `"com.sub.home"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

/// Identifier of a single purchase transaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Build an identifier, rejecting blank input.
            pub fn new(value: impl Into<String>) -> Result<Self, EntitlementError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(EntitlementError::validation(concat!($name, " must not be empty")));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = EntitlementError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_string_newtype!(ProductId, "ProductId");
impl_string_newtype!(TransactionId, "TransactionId");

impl TransactionId {
    /// Generate a fresh, time-ordered transaction id (UUIDv7).
    ///
    /// Only local sources (tests, demo) mint ids; real ones come from the backend.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_is_trimmed() {
        let id = ProductId::new("  com.sub.home ").unwrap();
        assert_eq!(id.as_str(), "com.sub.home");
    }

    #[test]
    fn blank_product_id_is_rejected() {
        let err = "   ".parse::<ProductId>().unwrap_err();
        match err {
            EntitlementError::Validation(_) => {}
            _ => panic!("Expected Validation error for blank id"),
        }
    }

    #[test]
    fn generated_transaction_ids_are_unique() {
        assert_ne!(TransactionId::generate(), TransactionId::generate());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ProductId::new("com.apple.mac").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"com.apple.mac\"");
    }
}
