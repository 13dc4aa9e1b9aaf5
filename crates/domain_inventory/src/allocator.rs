//! First-Expired-First-Out batch allocation
//!
//! Given the allocatable batches of an item and a required quantity, the
//! allocator produces an ordered plan of (batch, quantity) takings. Earliest
//! expiry wins; equal expiries fall back to receipt order so the result is
//! reproducible. The walk never skips ahead: a later-expiring batch is only
//! touched once every earlier one is drained.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::BatchId;

use crate::batch::InventoryBatch;
use crate::error::InventoryError;

/// One taking within an allocation plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAllocation {
    /// Batch to take from
    pub batch_id: BatchId,
    /// Units to take
    pub quantity: i64,
}

/// The ordered outcome of an allocation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Takings in dispense order
    pub allocations: Vec<BatchAllocation>,
    /// Quantity the caller asked for
    pub required: i64,
    /// Quantity the plan actually covers
    pub allocated: i64,
}

impl AllocationPlan {
    /// Returns true if the plan covers the full requirement
    pub fn is_complete(&self) -> bool {
        self.allocated >= self.required
    }

    /// Units the plan falls short by
    pub fn shortfall(&self) -> i64 {
        (self.required - self.allocated).max(0)
    }
}

/// Allocates `required` units from `batches` using FEFO
///
/// Expired batches and batches with no stock are skipped. The plan walks
/// batches in FEFO order, taking `min(stock, remaining)` from each until the
/// requirement is met. A plan that runs out of batches is returned partial;
/// strictness is the caller's decision.
///
/// # Errors
///
/// Returns `InvalidQuantity` if `required` is zero or negative.
pub fn allocate(
    batches: &[InventoryBatch],
    required: i64,
    today: NaiveDate,
) -> Result<AllocationPlan, InventoryError> {
    if required <= 0 {
        return Err(InventoryError::InvalidQuantity(required));
    }

    let mut candidates: Vec<&InventoryBatch> =
        batches.iter().filter(|b| b.is_allocatable(today)).collect();
    candidates.sort_by_key(|b| (b.expiry_date, b.received_seq));

    let mut allocations = Vec::new();
    let mut remaining = required;
    for batch in candidates {
        if remaining == 0 {
            break;
        }
        let take = batch.stock_quantity.min(remaining);
        allocations.push(BatchAllocation {
            batch_id: batch.id,
            quantity: take,
        });
        remaining -= take;
    }

    Ok(AllocationPlan {
        allocations,
        required,
        allocated: required - remaining,
    })
}
