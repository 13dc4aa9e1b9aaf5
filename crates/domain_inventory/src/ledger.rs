//! Stock ledger
//!
//! The ledger tracks per-batch quantities and their movements. Every change
//! to a batch goes through one of its methods and leaves exactly one
//! append-only movement behind.
//!
//! # Invariants
//!
//! - No batch quantity is ever negative
//! - One movement per stock change; movements are never updated or deleted
//! - Batches are drained to zero, never deleted

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use core_kernel::{BatchId, DemandId, ItemId, StaffId};

use crate::batch::{InventoryBatch, NewBatch};
use crate::error::InventoryError;
use crate::item::InventoryItem;
use crate::movement::{MovementType, StockMovement};

/// In-memory stock ledger over items, batches, and movements
#[derive(Debug, Default)]
pub struct StockLedger {
    items: HashMap<ItemId, InventoryItem>,
    batches: HashMap<BatchId, InventoryBatch>,
    movements: Vec<StockMovement>,
    next_receipt_seq: u64,
}

impl StockLedger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a catalog item with the ledger
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the item is already registered
    pub fn register_item(&mut self, item: InventoryItem) -> Result<(), InventoryError> {
        if self.items.contains_key(&item.id) {
            return Err(InventoryError::AlreadyExists(format!(
                "item {} is already registered",
                item.id
            )));
        }
        self.items.insert(item.id, item);
        Ok(())
    }

    /// Receives a new batch into stock, recording an `in` movement
    ///
    /// # Errors
    ///
    /// - `NotFound` if the item is not registered
    /// - `AlreadyExists` if the item already has a batch with this number
    /// - `InvalidQuantity` if the received quantity is not positive
    pub fn receive_batch(
        &mut self,
        new_batch: NewBatch,
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<BatchId, InventoryError> {
        if !self.items.contains_key(&new_batch.item_id) {
            return Err(InventoryError::not_found("Item", new_batch.item_id));
        }
        if new_batch.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(new_batch.quantity));
        }
        let duplicate = self.batches.values().any(|b| {
            b.item_id == new_batch.item_id && b.batch_number == new_batch.batch_number
        });
        if duplicate {
            return Err(InventoryError::AlreadyExists(format!(
                "batch number '{}' already exists for item {}",
                new_batch.batch_number, new_batch.item_id
            )));
        }

        self.next_receipt_seq += 1;
        let batch = InventoryBatch {
            id: BatchId::new_v7(),
            item_id: new_batch.item_id,
            batch_number: new_batch.batch_number,
            expiry_date: new_batch.expiry_date,
            stock_quantity: new_batch.quantity,
            purchase_price: new_batch.purchase_price,
            supplier: new_batch.supplier,
            received_seq: self.next_receipt_seq,
            received_at: now,
        };
        let batch_id = batch.id;

        info!(%batch_id, item_id = %batch.item_id, quantity = batch.stock_quantity, "batch received");
        self.movements.push(StockMovement::record(
            batch_id,
            batch.stock_quantity,
            MovementType::In,
            "stock receipt",
            None,
            performed_by,
            now,
        ));
        self.batches.insert(batch_id, batch);

        Ok(batch_id)
    }

    /// Applies a signed manual correction to a batch
    ///
    /// # Errors
    ///
    /// - `NotFound` if the batch does not exist
    /// - `InvalidQuantity` if the delta is zero
    /// - `InsufficientStock` if the correction would drive stock negative
    pub fn adjust_stock(
        &mut self,
        batch_id: BatchId,
        delta: i64,
        reason: impl Into<String>,
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<i64, InventoryError> {
        if delta == 0 {
            return Err(InventoryError::InvalidQuantity(0));
        }
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| InventoryError::not_found("Batch", batch_id))?;

        let new_quantity = batch.stock_quantity + delta;
        if new_quantity < 0 {
            return Err(InventoryError::InsufficientStock {
                batch_id,
                available: batch.stock_quantity,
                requested: -delta,
            });
        }
        batch.stock_quantity = new_quantity;

        self.movements.push(StockMovement::record(
            batch_id,
            delta,
            MovementType::Adjustment,
            reason,
            None,
            performed_by,
            now,
        ));

        Ok(new_quantity)
    }

    /// Writes off the remaining stock of an expired batch
    ///
    /// # Errors
    ///
    /// - `NotFound` if the batch does not exist
    /// - `InvalidQuantity` if the batch has not expired yet or is already empty
    pub fn write_off_expired(
        &mut self,
        batch_id: BatchId,
        today: NaiveDate,
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<i64, InventoryError> {
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| InventoryError::not_found("Batch", batch_id))?;

        if !batch.is_expired(today) || batch.stock_quantity == 0 {
            return Err(InventoryError::InvalidQuantity(batch.stock_quantity));
        }

        let written_off = batch.stock_quantity;
        batch.stock_quantity = 0;

        info!(%batch_id, written_off, "expired stock written off");
        self.movements.push(StockMovement::record(
            batch_id,
            -written_off,
            MovementType::Expired,
            "expired stock write-off",
            None,
            performed_by,
            now,
        ));

        Ok(written_off)
    }

    /// Deducts dispensed stock from a batch, recording an `out` movement
    ///
    /// Used by the fulfillment engine only; the sufficiency check runs here,
    /// at the moment of mutation, not against an earlier read.
    pub(crate) fn deduct(
        &mut self,
        batch_id: BatchId,
        quantity: i64,
        demand_id: DemandId,
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<(), InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| InventoryError::not_found("Batch", batch_id))?;

        if batch.stock_quantity < quantity {
            return Err(InventoryError::InsufficientStock {
                batch_id,
                available: batch.stock_quantity,
                requested: quantity,
            });
        }
        batch.stock_quantity -= quantity;

        debug!(%batch_id, %demand_id, quantity, remaining = batch.stock_quantity, "stock deducted");
        self.movements.push(StockMovement::record(
            batch_id,
            -quantity,
            MovementType::Out,
            "dispensed",
            Some(demand_id),
            performed_by,
            now,
        ));

        Ok(())
    }

    /// Looks up an item
    pub fn item(&self, id: &ItemId) -> Option<&InventoryItem> {
        self.items.get(id)
    }

    /// Looks up a batch
    pub fn batch(&self, id: &BatchId) -> Option<&InventoryBatch> {
        self.batches.get(id)
    }

    /// Total stock on hand for an item across all batches
    pub fn stock_on_hand(&self, item_id: &ItemId) -> i64 {
        self.batches
            .values()
            .filter(|b| &b.item_id == item_id)
            .map(|b| b.stock_quantity)
            .sum()
    }

    /// Returns true if the item's total stock is at or below its
    /// minimum-stock threshold
    pub fn is_below_minimum(&self, item_id: &ItemId) -> bool {
        match self.items.get(item_id) {
            Some(item) => self.stock_on_hand(item_id) <= item.minimum_stock,
            None => false,
        }
    }

    /// Unexpired, non-empty batches of an item in FEFO order
    pub fn allocatable_batches(&self, item_id: &ItemId, today: NaiveDate) -> Vec<InventoryBatch> {
        let mut batches: Vec<InventoryBatch> = self
            .batches
            .values()
            .filter(|b| &b.item_id == item_id && b.is_allocatable(today))
            .cloned()
            .collect();
        batches.sort_by_key(|b| (b.expiry_date, b.received_seq));
        batches
    }

    /// All movements recorded against a batch, oldest first
    pub fn movements_for(&self, batch_id: &BatchId) -> Vec<&StockMovement> {
        self.movements
            .iter()
            .filter(|m| &m.batch_id == batch_id)
            .collect()
    }

    /// Every movement in the ledger, oldest first
    pub fn movements(&self) -> &[StockMovement] {
        &self.movements
    }
}
