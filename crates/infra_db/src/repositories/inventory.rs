//! Inventory repository
//!
//! Persistent counterpart of the stock ledger and fulfillment engine. Every
//! mutation runs in a transaction; stock decrements are conditional updates
//! (`WHERE stock_quantity >= $n`) so sufficiency is checked at the point of
//! mutation against the current row, never against an earlier read. Rows are
//! locked with `FOR UPDATE` before validation so concurrent fulfillments of
//! the same demand or batch serialize instead of racing.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use core_kernel::{BatchId, DemandId, EncounterId, ItemId, Money, StaffId};
use domain_inventory::{
    allocate, BatchUse, DemandKind, DemandRecord, FulfillmentRecord, FulfillmentRequest,
    InventoryBatch, InventoryError, InventoryItem, ItemCategory, MovementType, NewBatch,
};

use crate::error::{DatabaseError, EngineError};

/// Repository for inventory items, batches, movements, and demand records
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    batch_id: Uuid,
    item_id: Uuid,
    batch_number: String,
    expiry_date: NaiveDate,
    stock_quantity: i64,
    purchase_price: Decimal,
    supplier: Option<String>,
    received_seq: i64,
    received_at: DateTime<Utc>,
}

impl From<BatchRow> for InventoryBatch {
    fn from(row: BatchRow) -> Self {
        InventoryBatch {
            id: BatchId::from_uuid(row.batch_id),
            item_id: ItemId::from_uuid(row.item_id),
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
            stock_quantity: row.stock_quantity,
            purchase_price: Money::new(row.purchase_price),
            supplier: row.supplier,
            received_seq: row.received_seq.max(0) as u64,
            received_at: row.received_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DemandRow {
    demand_id: Uuid,
    kind: String,
    encounter_id: Uuid,
    item_id: Uuid,
    required_quantity: i64,
    fulfilled: bool,
    dispensed_quantity: Option<i64>,
    fulfilled_by: Option<Uuid>,
    fulfilled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DemandRow {
    fn into_domain(self, batch_uses: Vec<BatchUse>) -> Result<DemandRecord, DatabaseError> {
        let fulfillment = match (self.fulfilled, self.fulfilled_by, self.fulfilled_at) {
            (true, Some(by), Some(at)) => Some(FulfillmentRecord {
                batches: batch_uses,
                dispensed_quantity: self.dispensed_quantity.unwrap_or(0),
                fulfilled_by: StaffId::from_uuid(by),
                fulfilled_at: at,
            }),
            (false, _, _) => None,
            _ => {
                return Err(DatabaseError::RowMapping(format!(
                    "demand record {} is fulfilled but missing fulfillment fields",
                    self.demand_id
                )))
            }
        };
        Ok(DemandRecord {
            id: DemandId::from_uuid(self.demand_id),
            kind: parse_demand_kind(&self.kind)?,
            encounter_id: EncounterId::from_uuid(self.encounter_id),
            item_id: ItemId::from_uuid(self.item_id),
            required_quantity: self.required_quantity,
            fulfilled: self.fulfilled,
            fulfillment,
            created_at: self.created_at,
        })
    }
}

fn demand_kind_str(kind: DemandKind) -> &'static str {
    match kind {
        DemandKind::Prescription => "prescription",
        DemandKind::MaterialUsage => "material_usage",
    }
}

fn parse_demand_kind(s: &str) -> Result<DemandKind, DatabaseError> {
    match s {
        "prescription" => Ok(DemandKind::Prescription),
        "material_usage" => Ok(DemandKind::MaterialUsage),
        other => Err(DatabaseError::RowMapping(format!(
            "unknown demand kind '{other}'"
        ))),
    }
}

fn movement_type_str(movement_type: MovementType) -> &'static str {
    match movement_type {
        MovementType::In => "in",
        MovementType::Out => "out",
        MovementType::Adjustment => "adjustment",
        MovementType::Expired => "expired",
    }
}

// Expects the ids sorted; a repeated demand id means the caller tried to
// fulfill the same record twice in one call.
fn ensure_unique_demands(demand_ids: &[DemandId]) -> Result<(), InventoryError> {
    for window in demand_ids.windows(2) {
        if window[0] == window[1] {
            return Err(InventoryError::AlreadyFulfilled(window[0]));
        }
    }
    Ok(())
}

fn category_str(category: ItemCategory) -> &'static str {
    match category {
        ItemCategory::Drug => "drug",
        ItemCategory::Material => "material",
    }
}

const SELECT_BATCH: &str = "SELECT batch_id, item_id, batch_number, expiry_date, stock_quantity, \
     purchase_price, supplier, received_seq, received_at FROM inventory_batches";

const SELECT_DEMAND: &str = "SELECT demand_id, kind, encounter_id, item_id, required_quantity, \
     fulfilled, dispensed_quantity, fulfilled_by, fulfilled_at, created_at FROM demand_records";

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registers a catalog item
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` when an item with the same id is present.
    pub async fn register_item(&self, item: &InventoryItem) -> Result<(), EngineError> {
        let result = sqlx::query(
            "INSERT INTO inventory_items \
                (item_id, name, unit, unit_price, minimum_stock, category, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::from(item.id))
        .bind(&item.name)
        .bind(&item.unit)
        .bind(item.unit_price.amount())
        .bind(item.minimum_stock)
        .bind(category_str(item.category))
        .bind(item.is_active)
        .bind(item.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match DatabaseError::from(e) {
                DatabaseError::DuplicateEntry(_) => Err(InventoryError::AlreadyExists(format!(
                    "item {} is already registered",
                    item.id
                ))
                .into()),
                other => Err(other.into()),
            },
        }
    }

    /// Receives a new batch into stock and records the `in` movement
    ///
    /// The batch insert and the movement land in one transaction. The
    /// receipt sequence comes from the database so concurrent receipts get
    /// distinct, ordered values.
    #[instrument(skip(self, new_batch), fields(item_id = %new_batch.item_id))]
    pub async fn receive_batch(
        &self,
        new_batch: NewBatch,
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<InventoryBatch, EngineError> {
        if new_batch.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(new_batch.quantity).into());
        }

        let mut tx = self.pool.begin().await?;
        let batch_id = BatchId::new_v7();

        let result = sqlx::query_as::<_, BatchRow>(
            "INSERT INTO inventory_batches \
                (batch_id, item_id, batch_number, expiry_date, stock_quantity, \
                 purchase_price, supplier, received_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING batch_id, item_id, batch_number, expiry_date, stock_quantity, \
                 purchase_price, supplier, received_seq, received_at",
        )
        .bind(Uuid::from(batch_id))
        .bind(Uuid::from(new_batch.item_id))
        .bind(&new_batch.batch_number)
        .bind(new_batch.expiry_date)
        .bind(new_batch.quantity)
        .bind(new_batch.purchase_price.amount())
        .bind(&new_batch.supplier)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                return match DatabaseError::from(e) {
                    DatabaseError::DuplicateEntry(_) => {
                        Err(InventoryError::AlreadyExists(format!(
                            "batch number '{}' already exists for item {}",
                            new_batch.batch_number, new_batch.item_id
                        ))
                        .into())
                    }
                    other => Err(other.into()),
                }
            }
        };

        insert_movement(
            &mut tx,
            batch_id,
            new_batch.quantity,
            MovementType::In,
            "stock receipt",
            None,
            performed_by,
            now,
        )
        .await?;

        tx.commit().await?;
        info!(%batch_id, quantity = new_batch.quantity, "batch received");
        Ok(row.into())
    }

    /// Applies a signed manual correction to a batch
    ///
    /// The decrement path is a conditional update, so a correction can never
    /// push the row negative even under concurrency.
    pub async fn adjust_stock(
        &self,
        batch_id: BatchId,
        delta: i64,
        reason: &str,
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<i64, EngineError> {
        if delta == 0 {
            return Err(InventoryError::InvalidQuantity(0).into());
        }

        let mut tx = self.pool.begin().await?;
        let batch = lock_batch(&mut tx, batch_id).await?;

        let updated = sqlx::query_as::<_, (i64,)>(
            "UPDATE inventory_batches \
             SET stock_quantity = stock_quantity + $2 \
             WHERE batch_id = $1 AND stock_quantity + $2 >= 0 \
             RETURNING stock_quantity",
        )
        .bind(Uuid::from(batch_id))
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((new_quantity,)) = updated else {
            return Err(InventoryError::InsufficientStock {
                batch_id,
                available: batch.stock_quantity,
                requested: -delta,
            }
            .into());
        };

        insert_movement(
            &mut tx,
            batch_id,
            delta,
            MovementType::Adjustment,
            reason,
            None,
            performed_by,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(new_quantity)
    }

    /// Writes off the full remaining quantity of an expired batch
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` when the batch has not expired yet or holds
    /// no stock.
    pub async fn write_off_expired(
        &self,
        batch_id: BatchId,
        performed_by: StaffId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<i64, EngineError> {
        let mut tx = self.pool.begin().await?;
        let batch = lock_batch(&mut tx, batch_id).await?;

        if !batch.is_expired(today) || batch.stock_quantity == 0 {
            return Err(InventoryError::InvalidQuantity(batch.stock_quantity).into());
        }

        sqlx::query("UPDATE inventory_batches SET stock_quantity = 0 WHERE batch_id = $1")
            .bind(Uuid::from(batch_id))
            .execute(&mut *tx)
            .await?;

        insert_movement(
            &mut tx,
            batch_id,
            -batch.stock_quantity,
            MovementType::Expired,
            "expired stock write-off",
            None,
            performed_by,
            now,
        )
        .await?;

        tx.commit().await?;
        info!(%batch_id, quantity = batch.stock_quantity, "expired stock written off");
        Ok(batch.stock_quantity)
    }

    /// Lists the batches of an item that can serve an allocation today,
    /// ordered first-expired-first with receipt order as the tie-break
    pub async fn allocatable_batches(
        &self,
        item_id: ItemId,
        today: NaiveDate,
    ) -> Result<Vec<InventoryBatch>, EngineError> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "{SELECT_BATCH} \
             WHERE item_id = $1 AND stock_quantity > 0 AND expiry_date >= $2 \
             ORDER BY expiry_date, received_seq"
        ))
        .bind(Uuid::from(item_id))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InventoryBatch::from).collect())
    }

    /// Total on-hand quantity for an item across all its batches
    pub async fn stock_on_hand(&self, item_id: ItemId) -> Result<i64, EngineError> {
        let (total,): (Option<i64>,) = sqlx::query_as(
            "SELECT SUM(stock_quantity) FROM inventory_batches WHERE item_id = $1",
        )
        .bind(Uuid::from(item_id))
        .fetch_one(&self.pool)
        .await?;
        Ok(total.unwrap_or(0))
    }

    /// Stores a new demand record
    pub async fn create_demand(&self, demand: &DemandRecord) -> Result<(), EngineError> {
        if demand.required_quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(demand.required_quantity).into());
        }
        sqlx::query(
            "INSERT INTO demand_records \
                (demand_id, kind, encounter_id, item_id, required_quantity, fulfilled, created_at) \
             VALUES ($1, $2, $3, $4, $5, FALSE, $6)",
        )
        .bind(Uuid::from(demand.id))
        .bind(demand_kind_str(demand.kind))
        .bind(Uuid::from(demand.encounter_id))
        .bind(Uuid::from(demand.item_id))
        .bind(demand.required_quantity)
        .bind(demand.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Loads a demand record with its batch takings rebuilt from the
    /// movement trail
    pub async fn find_demand(
        &self,
        demand_id: DemandId,
    ) -> Result<Option<DemandRecord>, EngineError> {
        let row = sqlx::query_as::<_, DemandRow>(&format!("{SELECT_DEMAND} WHERE demand_id = $1"))
            .bind(Uuid::from(demand_id))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };

        let uses: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT batch_id, quantity FROM stock_movements \
             WHERE demand_id = $1 ORDER BY occurred_at, movement_id",
        )
        .bind(Uuid::from(demand_id))
        .fetch_all(&self.pool)
        .await?;

        let batch_uses = uses
            .into_iter()
            .map(|(batch_id, quantity)| BatchUse {
                batch_id: BatchId::from_uuid(batch_id),
                quantity: -quantity,
            })
            .collect();

        Ok(Some(row.into_domain(batch_uses)?))
    }

    /// Fulfills a single demand record from a single batch
    ///
    /// Locks the demand and batch rows, re-validates, decrements the batch
    /// with a conditional update, records the `out` movement, and flips the
    /// fulfilled flag, all in one transaction.
    #[instrument(skip(self), fields(%demand_id, %batch_id))]
    pub async fn fulfill(
        &self,
        demand_id: DemandId,
        batch_id: BatchId,
        quantity: i64,
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<DemandRecord, EngineError> {
        let mut tx = self.pool.begin().await?;

        let demand = lock_demand(&mut tx, demand_id).await?;
        if demand.fulfilled {
            return Err(InventoryError::AlreadyFulfilled(demand_id).into());
        }
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity).into());
        }

        let batch = lock_batch(&mut tx, batch_id).await?;
        if Uuid::from(batch.item_id) != demand.item_id {
            return Err(InventoryError::BatchItemMismatch {
                batch_id,
                demand_id,
            }
            .into());
        }

        deduct_batch(&mut tx, &batch, quantity).await?;
        insert_movement(
            &mut tx,
            batch_id,
            -quantity,
            MovementType::Out,
            "demand fulfillment",
            Some(demand_id),
            performed_by,
            now,
        )
        .await?;
        mark_demand_fulfilled(&mut tx, demand_id, quantity, performed_by, now).await?;

        tx.commit().await?;
        info!(quantity, "demand fulfilled");

        self.find_demand(demand_id).await?.ok_or_else(|| {
            DatabaseError::not_found("Demand record", demand_id).into()
        })
    }

    /// Fulfills a set of demand records as one atomic batch
    ///
    /// Locks every involved row up front (in id order, so two bulk calls
    /// touching the same rows cannot deadlock), validates the combined draw
    /// per batch, and only then mutates. Any failure rolls the whole
    /// transaction back.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn fulfill_bulk(
        &self,
        requests: &[FulfillmentRequest],
        performed_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DemandRecord>, EngineError> {
        use std::collections::HashMap;

        let mut tx = self.pool.begin().await?;

        let mut demand_ids: Vec<DemandId> = requests.iter().map(|r| r.demand_id).collect();
        demand_ids.sort();
        ensure_unique_demands(&demand_ids)?;

        let mut batch_ids: Vec<BatchId> = requests.iter().map(|r| r.batch_id).collect();
        batch_ids.sort();
        batch_ids.dedup();

        // Phase 1: lock and validate everything before mutating anything.
        let mut demands = HashMap::new();
        for demand_id in &demand_ids {
            let demand = lock_demand(&mut tx, *demand_id).await?;
            if demand.fulfilled {
                return Err(InventoryError::AlreadyFulfilled(*demand_id).into());
            }
            demands.insert(*demand_id, demand);
        }

        let mut batches = HashMap::new();
        for batch_id in &batch_ids {
            let batch = lock_batch(&mut tx, *batch_id).await?;
            batches.insert(*batch_id, batch);
        }

        let mut draw_per_batch: HashMap<BatchId, i64> = HashMap::new();
        for request in requests {
            if request.quantity <= 0 {
                return Err(InventoryError::InvalidQuantity(request.quantity).into());
            }
            let demand = &demands[&request.demand_id];
            let batch = &batches[&request.batch_id];
            if Uuid::from(batch.item_id) != demand.item_id {
                return Err(InventoryError::BatchItemMismatch {
                    batch_id: request.batch_id,
                    demand_id: request.demand_id,
                }
                .into());
            }
            *draw_per_batch.entry(request.batch_id).or_insert(0) += request.quantity;
        }
        for (batch_id, draw) in &draw_per_batch {
            let batch = &batches[batch_id];
            if batch.stock_quantity < *draw {
                return Err(InventoryError::InsufficientStock {
                    batch_id: *batch_id,
                    available: batch.stock_quantity,
                    requested: *draw,
                }
                .into());
            }
        }

        // Phase 2: every request passed; apply them all.
        for request in requests {
            let batch = &batches[&request.batch_id];
            deduct_batch(&mut tx, batch, request.quantity).await?;
            insert_movement(
                &mut tx,
                request.batch_id,
                -request.quantity,
                MovementType::Out,
                "bulk demand fulfillment",
                Some(request.demand_id),
                performed_by,
                now,
            )
            .await?;
            mark_demand_fulfilled(&mut tx, request.demand_id, request.quantity, performed_by, now)
                .await?;
        }

        tx.commit().await?;
        info!("bulk fulfillment committed");

        // Reload in request order; the sorted id vecs exist only to keep the
        // lock acquisition order deterministic.
        let mut fulfilled = Vec::with_capacity(requests.len());
        for request in requests {
            let demand = self.find_demand(request.demand_id).await?.ok_or_else(|| {
                DatabaseError::not_found("Demand record", request.demand_id)
            })?;
            fulfilled.push(demand);
        }
        Ok(fulfilled)
    }

    /// Fulfills a demand record from a first-expired-first allocation plan
    ///
    /// Locks the demand row and the item's allocatable batches, runs the
    /// allocator over the locked snapshot, and dispenses the plan. A plan
    /// that falls short fails closed unless `allow_partial` is set.
    #[instrument(skip(self), fields(%demand_id))]
    pub async fn fulfill_allocated(
        &self,
        demand_id: DemandId,
        performed_by: StaffId,
        allow_partial: bool,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DemandRecord, EngineError> {
        let mut tx = self.pool.begin().await?;

        let demand = lock_demand(&mut tx, demand_id).await?;
        if demand.fulfilled {
            return Err(InventoryError::AlreadyFulfilled(demand_id).into());
        }

        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "{SELECT_BATCH} \
             WHERE item_id = $1 AND stock_quantity > 0 AND expiry_date >= $2 \
             ORDER BY expiry_date, received_seq FOR UPDATE"
        ))
        .bind(demand.item_id)
        .bind(today)
        .fetch_all(&mut *tx)
        .await?;

        let batches: Vec<InventoryBatch> = rows.into_iter().map(InventoryBatch::from).collect();
        let plan = allocate(&batches, demand.required_quantity, today)
            .map_err(EngineError::Inventory)?;

        if !plan.is_complete() && !allow_partial {
            return Err(InventoryError::NoAllocatableStock {
                item_id: ItemId::from_uuid(demand.item_id),
                required: plan.required,
                available: plan.allocated,
            }
            .into());
        }

        for taking in &plan.allocations {
            let batch = batches
                .iter()
                .find(|b| b.id == taking.batch_id)
                .ok_or_else(|| DatabaseError::not_found("Batch", taking.batch_id))?;
            deduct_batch(&mut tx, batch, taking.quantity).await?;
            insert_movement(
                &mut tx,
                taking.batch_id,
                -taking.quantity,
                MovementType::Out,
                "allocated demand fulfillment",
                Some(demand_id),
                performed_by,
                now,
            )
            .await?;
        }
        mark_demand_fulfilled(&mut tx, demand_id, plan.allocated, performed_by, now).await?;

        tx.commit().await?;
        info!(allocated = plan.allocated, "allocated demand fulfilled");

        self.find_demand(demand_id).await?.ok_or_else(|| {
            DatabaseError::not_found("Demand record", demand_id).into()
        })
    }
}

async fn lock_batch(
    tx: &mut Transaction<'_, Postgres>,
    batch_id: BatchId,
) -> Result<InventoryBatch, EngineError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!("{SELECT_BATCH} WHERE batch_id = $1 FOR UPDATE"))
        .bind(Uuid::from(batch_id))
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| InventoryError::not_found("Batch", batch_id))?;
    Ok(row.into())
}

async fn lock_demand(
    tx: &mut Transaction<'_, Postgres>,
    demand_id: DemandId,
) -> Result<DemandRow, EngineError> {
    sqlx::query_as::<_, DemandRow>(&format!("{SELECT_DEMAND} WHERE demand_id = $1 FOR UPDATE"))
        .bind(Uuid::from(demand_id))
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| InventoryError::not_found("Demand record", demand_id).into())
}

/// Conditional decrement; the `stock_quantity >= $2` predicate is the
/// sufficiency check, evaluated on the current row inside the transaction.
async fn deduct_batch(
    tx: &mut Transaction<'_, Postgres>,
    batch: &InventoryBatch,
    quantity: i64,
) -> Result<(), EngineError> {
    let result = sqlx::query(
        "UPDATE inventory_batches \
         SET stock_quantity = stock_quantity - $2 \
         WHERE batch_id = $1 AND stock_quantity >= $2",
    )
    .bind(Uuid::from(batch.id))
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(InventoryError::InsufficientStock {
            batch_id: batch.id,
            available: batch.stock_quantity,
            requested: quantity,
        }
        .into());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    batch_id: BatchId,
    quantity: i64,
    movement_type: MovementType,
    reason: &str,
    demand_id: Option<DemandId>,
    performed_by: StaffId,
    occurred_at: DateTime<Utc>,
) -> Result<(), EngineError> {
    sqlx::query(
        "INSERT INTO stock_movements \
            (movement_id, batch_id, quantity, movement_type, reason, demand_id, \
             performed_by, occurred_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(Uuid::new_v4())
    .bind(Uuid::from(batch_id))
    .bind(quantity)
    .bind(movement_type_str(movement_type))
    .bind(reason)
    .bind(demand_id.map(Uuid::from))
    .bind(Uuid::from(performed_by))
    .bind(occurred_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn mark_demand_fulfilled(
    tx: &mut Transaction<'_, Postgres>,
    demand_id: DemandId,
    dispensed_quantity: i64,
    performed_by: StaffId,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    sqlx::query(
        "UPDATE demand_records \
         SET fulfilled = TRUE, dispensed_quantity = $2, fulfilled_by = $3, fulfilled_at = $4 \
         WHERE demand_id = $1 AND fulfilled = FALSE",
    )
    .bind(Uuid::from(demand_id))
    .bind(dispensed_quantity)
    .bind(Uuid::from(performed_by))
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_mappings_round_trip() {
        for kind in [DemandKind::Prescription, DemandKind::MaterialUsage] {
            assert_eq!(parse_demand_kind(demand_kind_str(kind)).unwrap(), kind);
        }
        assert!(parse_demand_kind("refund").is_err());
    }

    #[test]
    fn test_repeated_bulk_demand_is_already_fulfilled() {
        let dup = DemandId::new();
        let mut ids = vec![DemandId::new(), dup, DemandId::new(), dup];
        ids.sort();

        let err = ensure_unique_demands(&ids).unwrap_err();
        assert!(matches!(err, InventoryError::AlreadyFulfilled(id) if id == dup));

        ids.dedup();
        assert!(ensure_unique_demands(&ids).is_ok());
    }

    #[test]
    fn test_movement_type_strings_match_schema_check() {
        let allowed = ["in", "out", "adjustment", "expired"];
        for movement_type in [
            MovementType::In,
            MovementType::Out,
            MovementType::Adjustment,
            MovementType::Expired,
        ] {
            assert!(allowed.contains(&movement_type_str(movement_type)));
        }
    }
}
