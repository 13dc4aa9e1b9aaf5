//! Fulfillment engine
//!
//! Consumes allocation output to deduct stock and mark demand records as
//! satisfied, all-or-nothing. Preconditions are re-checked at the commit
//! point, not against an earlier read, so a stale snapshot can never cause a
//! double deduction or negative stock.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

use core_kernel::{BatchId, DemandId, StaffId};

use crate::allocator::allocate;
use crate::demand::{BatchUse, DemandRecord};
use crate::error::InventoryError;
use crate::ledger::StockLedger;

/// One request within a bulk fulfillment
#[derive(Debug, Clone)]
pub struct FulfillmentRequest {
    pub demand_id: DemandId,
    pub batch_id: BatchId,
    pub quantity: i64,
}

/// Fulfillment engine over a stock ledger and its demand records
#[derive(Debug, Default)]
pub struct FulfillmentEngine {
    ledger: StockLedger,
    demands: HashMap<DemandId, DemandRecord>,
}

impl FulfillmentEngine {
    /// Creates an engine over an existing ledger
    pub fn new(ledger: StockLedger) -> Self {
        Self {
            ledger,
            demands: HashMap::new(),
        }
    }

    /// Read access to the underlying stock ledger
    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    /// Mutable access to the underlying stock ledger, for receipt and
    /// adjustment flows that do not involve a demand record
    pub fn ledger_mut(&mut self) -> &mut StockLedger {
        &mut self.ledger
    }

    /// Registers a demand record with the engine
    pub fn register_demand(&mut self, demand: DemandRecord) -> Result<(), InventoryError> {
        if self.demands.contains_key(&demand.id) {
            return Err(InventoryError::AlreadyExists(format!(
                "demand record {} is already registered",
                demand.id
            )));
        }
        self.demands.insert(demand.id, demand);
        Ok(())
    }

    /// Looks up a demand record
    pub fn demand(&self, id: &DemandId) -> Option<&DemandRecord> {
        self.demands.get(id)
    }

    /// Fulfills a single demand record from a single batch
    ///
    /// Effects are all-or-nothing: the stock deduction, the `out` movement,
    /// and the fulfilled flag land together or not at all.
    ///
    /// # Errors
    ///
    /// - `NotFound` for a missing demand record or batch
    /// - `AlreadyFulfilled` if the record was fulfilled before (stock and
    ///   movements are left unchanged)
    /// - `InsufficientStock` if the batch holds less than requested
    /// - `BatchItemMismatch` if the batch holds a different item
    pub fn fulfill(
        &mut self,
        demand_id: DemandId,
        batch_id: BatchId,
        quantity: i64,
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<&DemandRecord, InventoryError> {
        self.validate_request(&FulfillmentRequest { demand_id, batch_id, quantity })?;

        // Validation passed; the deduction re-checks sufficiency at the
        // point of mutation and the flag flips only after it succeeds.
        self.ledger
            .deduct(batch_id, quantity, demand_id, performed_by, now)?;
        let demand = self
            .demands
            .get_mut(&demand_id)
            .ok_or_else(|| InventoryError::not_found("Demand record", demand_id))?;
        demand.mark_fulfilled(vec![BatchUse { batch_id, quantity }], performed_by, now)?;

        info!(%demand_id, %batch_id, quantity, "demand fulfilled");
        Ok(&self.demands[&demand_id])
    }

    /// Fulfills a set of demand records as one atomic batch
    ///
    /// Every request is validated against a consistent snapshot first,
    /// including the combined draw of requests hitting the same batch. Only
    /// when all pass are any deductions applied; a single failing request
    /// leaves every record and every batch untouched.
    pub fn fulfill_bulk(
        &mut self,
        requests: &[FulfillmentRequest],
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DemandRecord>, InventoryError> {
        // Phase 1: validate everything before mutating anything. Stock
        // sufficiency is judged on the combined draw per batch, not request
        // by request, so the error names the total the batch cannot cover.
        let mut draw_per_batch: HashMap<BatchId, i64> = HashMap::new();
        let mut seen: Vec<DemandId> = Vec::with_capacity(requests.len());
        for request in requests {
            if seen.contains(&request.demand_id) {
                return Err(InventoryError::AlreadyFulfilled(request.demand_id));
            }
            seen.push(request.demand_id);
            self.validate_target(request)?;
            *draw_per_batch.entry(request.batch_id).or_insert(0) += request.quantity;
        }
        for (&batch_id, &requested) in &draw_per_batch {
            let available = self
                .ledger
                .batch(&batch_id)
                .map(|b| b.stock_quantity)
                .unwrap_or(0);
            if requested > available {
                warn!(%batch_id, requested, available, "bulk fulfillment over-draws batch");
                return Err(InventoryError::InsufficientStock {
                    batch_id,
                    available,
                    requested,
                });
            }
        }

        // Phase 2: apply. Nothing below can fail after phase 1.
        let mut updated = Vec::with_capacity(requests.len());
        for request in requests {
            self.ledger.deduct(
                request.batch_id,
                request.quantity,
                request.demand_id,
                performed_by,
                now,
            )?;
            let demand = self
                .demands
                .get_mut(&request.demand_id)
                .ok_or_else(|| InventoryError::not_found("Demand record", request.demand_id))?;
            demand.mark_fulfilled(
                vec![BatchUse {
                    batch_id: request.batch_id,
                    quantity: request.quantity,
                }],
                performed_by,
                now,
            )?;
            updated.push(demand.clone());
        }

        info!(count = updated.len(), "bulk fulfillment committed");
        Ok(updated)
    }

    /// Fulfills a demand by running the FEFO allocator over the item's
    /// batches and dispensing across the resulting plan
    ///
    /// An incomplete plan fails with `NoAllocatableStock` unless the caller
    /// opts into partial dispensing, in which case whatever the plan covers
    /// is dispensed and recorded as the dispensed quantity.
    pub fn fulfill_allocated(
        &mut self,
        demand_id: DemandId,
        performed_by: StaffId,
        allow_partial: bool,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<&DemandRecord, InventoryError> {
        let demand = self
            .demands
            .get(&demand_id)
            .ok_or_else(|| InventoryError::not_found("Demand record", demand_id))?;
        if demand.fulfilled {
            return Err(InventoryError::AlreadyFulfilled(demand_id));
        }
        let item_id = demand.item_id;
        let required = demand.required_quantity;

        let batches = self.ledger.allocatable_batches(&item_id, today);
        let plan = allocate(&batches, required, today)?;
        if !plan.is_complete() && !allow_partial {
            return Err(InventoryError::NoAllocatableStock {
                item_id,
                required,
                available: plan.allocated,
            });
        }
        if plan.allocations.is_empty() {
            return Err(InventoryError::NoAllocatableStock {
                item_id,
                required,
                available: 0,
            });
        }

        let mut uses = Vec::with_capacity(plan.allocations.len());
        for taking in &plan.allocations {
            self.ledger
                .deduct(taking.batch_id, taking.quantity, demand_id, performed_by, now)?;
            uses.push(BatchUse {
                batch_id: taking.batch_id,
                quantity: taking.quantity,
            });
        }

        let demand = self
            .demands
            .get_mut(&demand_id)
            .ok_or_else(|| InventoryError::not_found("Demand record", demand_id))?;
        demand.mark_fulfilled(uses, performed_by, now)?;

        info!(%demand_id, allocated = plan.allocated, required, "demand fulfilled from allocation plan");
        Ok(&self.demands[&demand_id])
    }

    /// Precondition checks for a single request, covering everything but
    /// stock sufficiency
    fn validate_target(&self, request: &FulfillmentRequest) -> Result<(), InventoryError> {
        let demand = self
            .demands
            .get(&request.demand_id)
            .ok_or_else(|| InventoryError::not_found("Demand record", request.demand_id))?;
        if demand.fulfilled {
            return Err(InventoryError::AlreadyFulfilled(request.demand_id));
        }
        if request.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(request.quantity));
        }

        let batch = self
            .ledger
            .batch(&request.batch_id)
            .ok_or_else(|| InventoryError::not_found("Batch", request.batch_id))?;
        if batch.item_id != demand.item_id {
            return Err(InventoryError::BatchItemMismatch {
                batch_id: request.batch_id,
                demand_id: request.demand_id,
            });
        }

        Ok(())
    }

    /// Full precondition checks for a single request, stock included
    fn validate_request(&self, request: &FulfillmentRequest) -> Result<(), InventoryError> {
        self.validate_target(request)?;
        let batch = self
            .ledger
            .batch(&request.batch_id)
            .ok_or_else(|| InventoryError::not_found("Batch", request.batch_id))?;
        if batch.stock_quantity < request.quantity {
            return Err(InventoryError::InsufficientStock {
                batch_id: request.batch_id,
                available: batch.stock_quantity,
                requested: request.quantity,
            });
        }
        Ok(())
    }
}
