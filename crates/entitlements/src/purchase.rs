//! Purchase outcomes.
//!
//! The payment sheet itself is outside this crate; whatever drives it hands
//! the outcome back here so a successful purchase lands in the store the same
//! way a pushed update does.

use tracing::{info, warn};

use entitlekit_core::{EntitlementError, EntitlementResult};
use entitlekit_verification::{SignedTransaction, Transaction};

use crate::store::EntitlementStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseResult {
    Success(SignedTransaction),
    UserCancelled,
    /// Awaiting an external action (e.g. parental approval); the transaction
    /// will arrive later on the update feed.
    Pending,
    Failed(String),
}

impl PurchaseResult {
    /// The signed transaction of a successful purchase; every other outcome
    /// is a `Purchase` error.
    pub fn into_signed(self) -> EntitlementResult<SignedTransaction> {
        match self {
            PurchaseResult::Success(signed) => Ok(signed),
            PurchaseResult::UserCancelled => Err(EntitlementError::purchase("user cancelled")),
            PurchaseResult::Pending => Err(EntitlementError::purchase("pending external action")),
            PurchaseResult::Failed(reason) => Err(EntitlementError::purchase(reason)),
        }
    }
}

impl EntitlementStore {
    /// Verify, apply and acknowledge the transaction of a purchase.
    ///
    /// Fails with `Purchase` when no transaction was produced and with
    /// `Verification` when the transaction does not verify.
    pub fn complete_purchase(&self, result: PurchaseResult) -> EntitlementResult<Transaction> {
        let signed = result.into_signed()?;
        self.accept_update(&signed)
    }

    /// Apply a purchase outcome. Only a verified success produces a transaction.
    pub fn handle_purchase_result(&self, result: PurchaseResult) -> Option<Transaction> {
        let expected = matches!(result, PurchaseResult::UserCancelled | PurchaseResult::Pending);
        match self.complete_purchase(result) {
            Ok(transaction) => Some(transaction),
            Err(err) if expected => {
                info!(reason = %err, "purchase produced no transaction");
                None
            }
            Err(err) => {
                warn!(error = %err, "purchase failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_outcomes_are_purchase_errors() {
        assert_eq!(
            PurchaseResult::UserCancelled.into_signed(),
            Err(EntitlementError::Purchase("user cancelled".to_string()))
        );
        assert_eq!(
            PurchaseResult::Pending.into_signed(),
            Err(EntitlementError::Purchase("pending external action".to_string()))
        );
        assert_eq!(
            PurchaseResult::Failed("card declined".to_string()).into_signed(),
            Err(EntitlementError::Purchase("card declined".to_string()))
        );
    }

    #[test]
    fn success_yields_the_signed_transaction() {
        let signed = SignedTransaction::from_token("a.b.c");
        assert_eq!(PurchaseResult::Success(signed.clone()).into_signed(), Ok(signed));
    }
}
