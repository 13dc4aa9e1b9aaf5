//! Stock movements
//!
//! Every change to a batch's stock quantity is recorded as exactly one
//! immutable movement row. Movements are append-only and never updated or
//! deleted, forming the audit trail for the stock ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, DemandId, MovementId, StaffId};

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock received into a batch
    In,
    /// Stock dispensed out of a batch
    Out,
    /// Manual correction
    Adjustment,
    /// Expired stock written off
    Expired,
}

/// An immutable audit record of one stock change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    /// Unique identifier
    pub id: MovementId,
    /// Batch the movement applies to
    pub batch_id: BatchId,
    /// Signed quantity delta (positive = in, negative = out)
    pub quantity: i64,
    /// Movement kind
    pub movement_type: MovementType,
    /// Free-text reason
    pub reason: String,
    /// Demand record that caused the movement, if any
    pub demand_id: Option<DemandId>,
    /// Who performed the movement
    pub performed_by: StaffId,
    /// When the movement occurred
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub(crate) fn record(
        batch_id: BatchId,
        quantity: i64,
        movement_type: MovementType,
        reason: impl Into<String>,
        demand_id: Option<DemandId>,
        performed_by: StaffId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new_v7(),
            batch_id,
            quantity,
            movement_type,
            reason: reason.into(),
            demand_id,
            performed_by,
            occurred_at,
        }
    }
}
