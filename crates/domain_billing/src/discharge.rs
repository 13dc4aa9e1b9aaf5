//! Discharge gate
//!
//! A pure predicate over the billing's payment state. No side effects;
//! callable any number of times.

use serde::{Deserialize, Serialize};

use crate::billing::{Billing, PaymentStatus};

/// Whether an encounter may be closed, with a display-ready reason when not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DischargeDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl DischargeDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Gates discharge on the billing being fully paid
///
/// Allowed exactly when a billing exists and its status is `paid`.
pub fn can_discharge(billing: Option<&Billing>) -> DischargeDecision {
    match billing {
        None => DischargeDecision::blocked("billing not created yet"),
        Some(b) if b.payment_status == PaymentStatus::Paid => DischargeDecision::allowed(),
        Some(b) => DischargeDecision::blocked(format!(
            "payment status is {}; outstanding amount {}",
            b.payment_status, b.remaining_amount
        )),
    }
}
