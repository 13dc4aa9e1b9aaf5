//! Billing domain errors

use core_kernel::{EncounterId, Money, MoneyError};
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Billing record not found
    #[error("Billing not found: {0}")]
    NotFound(String),

    /// An encounter already has a billing record
    #[error("Billing already exists for encounter {0}")]
    BillingAlreadyExists(EncounterId),

    /// Payment amount is non-positive or exceeds the remaining balance
    #[error("Invalid payment amount: offered {offered}, remaining balance {remaining}")]
    InvalidPaymentAmount { offered: Money, remaining: Money },

    /// Cash tendered is less than the payment amount
    #[error("Insufficient amount received: tendered {received}, payment requires {required}")]
    InsufficientAmountReceived { received: Money, required: Money },

    /// Discount or insurance adjustment is out of range
    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    /// Money arithmetic failure
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}
