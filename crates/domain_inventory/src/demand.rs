//! Demand records
//!
//! A demand record is a prescription or material-usage request: a stated need
//! for a quantity of an inventory item. Its `fulfilled` flag moves from false
//! to true exactly once; after that the fulfillment fields are immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, DemandId, EncounterId, ItemId, StaffId};

use crate::error::InventoryError;

/// What kind of need the demand represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandKind {
    /// A prescription to be dispensed
    Prescription,
    /// A material-usage request
    MaterialUsage,
}

/// Units taken from one batch during fulfillment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUse {
    pub batch_id: BatchId,
    pub quantity: i64,
}

/// Fulfillment details, recorded once and never changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentRecord {
    /// Batches the stock was taken from, in dispense order
    pub batches: Vec<BatchUse>,
    /// Total units dispensed
    pub dispensed_quantity: i64,
    /// Who fulfilled the demand
    pub fulfilled_by: StaffId,
    /// When it was fulfilled
    pub fulfilled_at: DateTime<Utc>,
}

/// A prescription or material-usage request awaiting stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandRecord {
    /// Unique identifier
    pub id: DemandId,
    /// Kind of demand
    pub kind: DemandKind,
    /// Encounter the demand belongs to
    pub encounter_id: EncounterId,
    /// Item required
    pub item_id: ItemId,
    /// Units required
    pub required_quantity: i64,
    /// One-way flag; set by the fulfillment engine only
    pub fulfilled: bool,
    /// Present exactly when `fulfilled` is true
    pub fulfillment: Option<FulfillmentRecord>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl DemandRecord {
    /// Creates a new unfulfilled demand record
    pub fn new(
        kind: DemandKind,
        encounter_id: EncounterId,
        item_id: ItemId,
        required_quantity: i64,
    ) -> Self {
        Self {
            id: DemandId::new_v7(),
            kind,
            encounter_id,
            item_id,
            required_quantity,
            fulfilled: false,
            fulfillment: None,
            created_at: Utc::now(),
        }
    }

    /// Transitions the record to fulfilled
    ///
    /// # Errors
    ///
    /// Returns `AlreadyFulfilled` if the record was fulfilled before; the
    /// existing fulfillment fields are left untouched.
    pub(crate) fn mark_fulfilled(
        &mut self,
        batches: Vec<BatchUse>,
        fulfilled_by: StaffId,
        fulfilled_at: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        if self.fulfilled {
            return Err(InventoryError::AlreadyFulfilled(self.id));
        }
        let dispensed_quantity = batches.iter().map(|b| b.quantity).sum();
        self.fulfillment = Some(FulfillmentRecord {
            batches,
            dispensed_quantity,
            fulfilled_by,
            fulfilled_at,
        });
        self.fulfilled = true;
        Ok(())
    }
}
