//! Billing aggregate
//!
//! One billing exists per encounter. All derived figures are recomputed
//! together whenever anything that feeds them changes:
//!
//! - `total_amount = subtotal - discount + tax`
//! - `patient_payable = total_amount - insurance_coverage`
//! - `remaining_amount = patient_payable - paid_amount`
//! - `payment_status` is a pure function of `paid_amount` vs `patient_payable`
//!
//! `paid_amount` only ever grows, and the payments vec is an append-only
//! ledger whose sum equals it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use core_kernel::{BillingId, EncounterId, Money, PaymentId, Rate, StaffId};

use crate::charges::BillingItem;
use crate::error::BillingError;
use crate::payment::{BillingAdjustment, Payment, PaymentMethod, PaymentOutcome, PaymentRequest};

/// Settlement state of a billing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing paid yet
    Pending,
    /// Some, but not all, of the payable amount settled
    Partial,
    /// Fully settled
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        };
        write!(f, "{s}")
    }
}

/// Derives the payment status from the two numbers alone
///
/// Kept pure so the stored status can never drift from `paid_amount` and
/// `patient_payable`.
pub fn payment_status_for(paid_amount: Money, patient_payable: Money) -> PaymentStatus {
    if paid_amount.is_zero() {
        PaymentStatus::Pending
    } else if paid_amount >= patient_payable {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

/// The billing record for one encounter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Billing {
    /// Unique identifier
    pub id: BillingId,
    /// Encounter this billing belongs to; unique per encounter
    pub encounter_id: EncounterId,
    /// Line items; replaced as a full set, never patched individually
    pub items: Vec<BillingItem>,
    /// Sum of line totals
    pub subtotal: Money,
    /// Effective flat discount
    pub discount: Money,
    /// Discount percentage the flat amount was derived from, if any
    pub discount_percentage: Option<Decimal>,
    /// Tax amount
    pub tax: Money,
    /// Insurance coverage amount
    pub insurance_coverage: Money,
    /// subtotal - discount + tax
    pub total_amount: Money,
    /// total_amount - insurance_coverage
    pub patient_payable: Money,
    /// Monotonically non-decreasing sum of payments
    pub paid_amount: Money,
    /// patient_payable - paid_amount
    pub remaining_amount: Money,
    /// Derived from paid_amount vs patient_payable
    pub payment_status: PaymentStatus,
    /// Append-only settlement ledger
    pub payments: Vec<Payment>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Billing {
    /// Creates a billing for an encounter from an aggregated item set
    pub fn new(encounter_id: EncounterId, items: Vec<BillingItem>) -> Self {
        let now = Utc::now();
        let mut billing = Self {
            id: BillingId::new_v7(),
            encounter_id,
            items,
            subtotal: Money::zero(),
            discount: Money::zero(),
            discount_percentage: None,
            tax: Money::zero(),
            insurance_coverage: Money::zero(),
            total_amount: Money::zero(),
            patient_payable: Money::zero(),
            paid_amount: Money::zero(),
            remaining_amount: Money::zero(),
            payment_status: PaymentStatus::Pending,
            payments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        billing.recalculate();
        billing
    }

    /// Sets the tax amount and recomputes
    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = tax;
        self.recalculate();
        self
    }

    /// Replaces the entire item set and recomputes every derived figure
    ///
    /// Delete-all/insert-all semantics: items and cached totals can never
    /// drift apart because they only move together.
    pub fn replace_items(&mut self, items: Vec<BillingItem>) {
        self.items = items;
        self.recalculate();
        self.updated_at = Utc::now();
    }

    /// Applies an optional adjustment and records a payment, atomically
    ///
    /// The adjustment is staged against candidate totals first; a payment
    /// that fails validation leaves the billing exactly as it was, discount
    /// included.
    ///
    /// # Errors
    ///
    /// - `InvalidAdjustment` for an out-of-range percentage or negative
    ///   discount/coverage
    /// - `InvalidPaymentAmount` when the amount is non-positive or exceeds
    ///   the remaining balance computed with the adjusted totals
    /// - `InsufficientAmountReceived` when cash tendered is below the amount
    pub fn apply_discount_and_pay(
        &mut self,
        request: PaymentRequest,
        received_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome, BillingError> {
        // Step 1: stage the adjustment without touching self.
        let staged = self.stage_adjustment(request.adjustment.as_ref())?;
        let candidate_remaining = staged.patient_payable - self.paid_amount;

        // Step 2: the amount must fit the just-adjusted remaining balance.
        if !request.amount.is_positive() || request.amount > candidate_remaining {
            return Err(BillingError::InvalidPaymentAmount {
                offered: request.amount,
                remaining: candidate_remaining,
            });
        }

        // Step 3: cash must be tendered in full; underpayment is rejected,
        // never clamped.
        let change = match request.method {
            PaymentMethod::Cash => {
                let received = request.amount_received.unwrap_or_else(Money::zero);
                if received < request.amount {
                    return Err(BillingError::InsufficientAmountReceived {
                        received,
                        required: request.amount,
                    });
                }
                received - request.amount
            }
            _ => Money::zero(),
        };

        // Step 4: validation passed; commit the staged adjustment and the
        // payment together.
        self.discount = staged.discount;
        self.discount_percentage = staged.discount_percentage;
        self.insurance_coverage = staged.insurance_coverage;
        self.total_amount = staged.total_amount;
        self.patient_payable = staged.patient_payable;

        let payment = Payment {
            id: PaymentId::new_v7(),
            billing_id: self.id,
            amount: request.amount,
            method: request.method,
            reference: request.reference,
            amount_received: match request.method {
                PaymentMethod::Cash => request.amount_received,
                _ => None,
            },
            change_given: change,
            received_by,
            received_at: now,
        };
        self.payments.push(payment);
        self.paid_amount = self.paid_amount + request.amount;
        self.remaining_amount = self.patient_payable - self.paid_amount;
        self.payment_status = payment_status_for(self.paid_amount, self.patient_payable);
        self.updated_at = now;

        info!(
            billing_id = %self.id,
            amount = %request.amount,
            paid = %self.paid_amount,
            remaining = %self.remaining_amount,
            status = %self.payment_status,
            "payment recorded"
        );

        Ok(PaymentOutcome {
            paid_amount: self.paid_amount,
            remaining_amount: self.remaining_amount,
            payment_status: self.payment_status,
            change,
        })
    }

    /// Computes the adjusted figures without mutating the billing
    fn stage_adjustment(
        &self,
        adjustment: Option<&BillingAdjustment>,
    ) -> Result<StagedTotals, BillingError> {
        let mut discount = self.discount;
        let mut discount_percentage = self.discount_percentage;
        let mut insurance_coverage = self.insurance_coverage;

        if let Some(adj) = adjustment {
            // Percentage wins over a flat value when both are given; the
            // two fields always describe the same effective discount.
            if let Some(pct) = adj.discount_percentage {
                let rate = Rate::from_percentage(pct)
                    .map_err(|e| BillingError::InvalidAdjustment(e.to_string()))?;
                discount = rate.apply(self.subtotal);
                discount_percentage = Some(pct);
            } else if let Some(flat) = adj.discount {
                if flat.is_negative() || flat > self.subtotal {
                    return Err(BillingError::InvalidAdjustment(format!(
                        "discount {} is outside 0..={}",
                        flat, self.subtotal
                    )));
                }
                discount = flat;
                discount_percentage = None;
            }
            if let Some(coverage) = adj.insurance_coverage {
                if coverage.is_negative() {
                    return Err(BillingError::InvalidAdjustment(format!(
                        "insurance coverage {} is negative",
                        coverage
                    )));
                }
                insurance_coverage = coverage;
            }
        }

        let total_amount = self.subtotal - discount + self.tax;
        let patient_payable = total_amount - insurance_coverage;

        Ok(StagedTotals {
            discount,
            discount_percentage,
            insurance_coverage,
            total_amount,
            patient_payable,
        })
    }

    /// Re-derives every computed field from the item set and adjustments
    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().map(BillingItem::total).sum();
        if let Some(pct) = self.discount_percentage {
            if let Ok(rate) = Rate::from_percentage(pct) {
                self.discount = rate.apply(self.subtotal);
            }
        }
        self.total_amount = self.subtotal - self.discount + self.tax;
        self.patient_payable = self.total_amount - self.insurance_coverage;
        self.remaining_amount = self.patient_payable - self.paid_amount;
        self.payment_status = payment_status_for(self.paid_amount, self.patient_payable);
    }
}

/// Adjusted figures staged before a payment commits
struct StagedTotals {
    discount: Money,
    discount_percentage: Option<Decimal>,
    insurance_coverage: Money,
    total_amount: Money,
    patient_payable: Money,
}
