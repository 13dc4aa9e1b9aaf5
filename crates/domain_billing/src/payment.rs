//! Payment records and requests

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BillingId, Money, PaymentId, StaffId};

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    DebitCard,
    CreditCard,
    Insurance,
}

/// A recorded settlement against a billing; append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Billing being paid
    pub billing_id: BillingId,
    /// Payment amount
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// External reference (transfer ref, card slip number)
    pub reference: Option<String>,
    /// Cash tendered; present for cash payments only
    pub amount_received: Option<Money>,
    /// Change handed back; never negative
    pub change_given: Money,
    /// Who received the payment
    pub received_by: StaffId,
    /// When the payment was recorded
    pub received_at: DateTime<Utc>,
}

/// Discount and insurance adjustments applied before a payment is evaluated
///
/// If both a flat discount and a percentage are supplied, the percentage
/// wins; the flat amount is recomputed from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingAdjustment {
    /// Flat discount amount
    pub discount: Option<Money>,
    /// Discount percentage of the subtotal (0-100)
    pub discount_percentage: Option<Decimal>,
    /// Insurance coverage amount
    pub insurance_coverage: Option<Money>,
}

impl BillingAdjustment {
    pub fn is_empty(&self) -> bool {
        self.discount.is_none()
            && self.discount_percentage.is_none()
            && self.insurance_coverage.is_none()
    }
}

/// A validated-on-apply payment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Amount to settle
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// External reference
    pub reference: Option<String>,
    /// Cash tendered; required when method is cash
    pub amount_received: Option<Money>,
    /// Optional discount/insurance adjustment applied first
    pub adjustment: Option<BillingAdjustment>,
}

impl PaymentRequest {
    /// Creates a plain payment request with no adjustment
    pub fn new(amount: Money, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            reference: None,
            amount_received: None,
            adjustment: None,
        }
    }

    /// Sets the cash tendered
    pub fn with_amount_received(mut self, received: Money) -> Self {
        self.amount_received = Some(received);
        self
    }

    /// Sets an external reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Attaches a discount/insurance adjustment
    pub fn with_adjustment(mut self, adjustment: BillingAdjustment) -> Self {
        self.adjustment = Some(adjustment);
        self
    }
}

/// The result handed back after a successful payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub paid_amount: Money,
    pub remaining_amount: Money,
    pub payment_status: crate::billing::PaymentStatus,
    pub change: Money,
}
