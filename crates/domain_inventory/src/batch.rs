//! Inventory batches
//!
//! A batch is one receipt lot of an item with its own expiry date and stock
//! quantity. Batches are created on stock receipt, drained to zero through
//! fulfillment or adjustment, and never deleted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, ItemId, Money};

/// A receipt lot of an inventory item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryBatch {
    /// Unique identifier
    pub id: BatchId,
    /// Item this batch belongs to
    pub item_id: ItemId,
    /// Batch number, unique per item
    pub batch_number: String,
    /// Expiry date; expired batches are excluded from allocation
    pub expiry_date: NaiveDate,
    /// Units currently on hand; never negative
    pub stock_quantity: i64,
    /// Purchase price per unit at receipt
    pub purchase_price: Money,
    /// Supplier the batch was received from
    pub supplier: Option<String>,
    /// Monotonic receipt sequence, used as the FEFO tie-break for equal
    /// expiry dates
    pub received_seq: u64,
    /// When the batch was received
    pub received_at: DateTime<Utc>,
}

impl InventoryBatch {
    /// Returns true if the batch is past its expiry date on the given day
    pub fn is_expired(&self, on: NaiveDate) -> bool {
        self.expiry_date < on
    }

    /// Returns true if the batch can contribute to an allocation on the
    /// given day
    pub fn is_allocatable(&self, on: NaiveDate) -> bool {
        self.stock_quantity > 0 && !self.is_expired(on)
    }
}

/// Input for receiving a new batch into stock
#[derive(Debug, Clone, Deserialize)]
pub struct NewBatch {
    /// Item being received
    pub item_id: ItemId,
    /// Batch number from the supplier
    pub batch_number: String,
    /// Expiry date
    pub expiry_date: NaiveDate,
    /// Units received
    pub quantity: i64,
    /// Purchase price per unit
    pub purchase_price: Money,
    /// Supplier
    pub supplier: Option<String>,
}
