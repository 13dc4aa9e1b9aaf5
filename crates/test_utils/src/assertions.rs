//! Custom Test Assertions
//!
//! Specialized assertion helpers for domain types that give more meaningful
//! error messages than standard assertions.

use core_kernel::Money;
use domain_billing::{payment_status_for, Billing};
use domain_inventory::AllocationPlan;

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts every derived figure of a billing against its inputs
///
/// Checks the arithmetic chain (total, payable, remaining), that the payment
/// ledger sums to the paid amount, and that the stored status matches the
/// derived one.
pub fn assert_billing_consistent(billing: &Billing) {
    assert_eq!(
        billing.total_amount,
        billing.subtotal - billing.discount + billing.tax,
        "total_amount out of step with subtotal/discount/tax"
    );
    assert_eq!(
        billing.patient_payable,
        billing.total_amount - billing.insurance_coverage,
        "patient_payable out of step with total_amount/insurance_coverage"
    );
    assert_eq!(
        billing.remaining_amount,
        billing.patient_payable - billing.paid_amount,
        "remaining_amount out of step with patient_payable/paid_amount"
    );

    let ledger_sum: Money = billing.payments.iter().map(|p| p.amount).sum();
    assert_eq!(
        ledger_sum, billing.paid_amount,
        "payment ledger does not sum to paid_amount"
    );

    assert_eq!(
        billing.payment_status,
        payment_status_for(billing.paid_amount, billing.patient_payable),
        "stored payment_status does not match the derived one"
    );
}

/// Asserts that an allocation plan covers its requirement exactly
pub fn assert_plan_complete(plan: &AllocationPlan) {
    assert!(
        plan.is_complete(),
        "Expected a complete plan, got {}/{} (shortfall {})",
        plan.allocated,
        plan.required,
        plan.shortfall()
    );
    let total: i64 = plan.allocations.iter().map(|a| a.quantity).sum();
    assert_eq!(total, plan.allocated, "plan takings do not sum to allocated");
}
