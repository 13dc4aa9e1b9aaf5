//! Inventory domain errors

use core_kernel::{BatchId, DemandId, ItemId};
use thiserror::Error;

/// Errors that can occur in the inventory domain
#[derive(Debug, Error)]
pub enum InventoryError {
    /// A referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Attempt to register an entity that already exists
    #[error("{0}")]
    AlreadyExists(String),

    /// Idempotency guard: the demand record has already been fulfilled
    #[error("Demand record {0} is already fulfilled")]
    AlreadyFulfilled(DemandId),

    /// A batch holds less stock than the deduction requires
    #[error("Insufficient stock in batch {batch_id}: available {available}, requested {requested}")]
    InsufficientStock {
        batch_id: BatchId,
        available: i64,
        requested: i64,
    },

    /// The allocator exhausted all batches before meeting the requirement
    #[error("No allocatable stock for item {item_id}: required {required}, available {available}")]
    NoAllocatableStock {
        item_id: ItemId,
        required: i64,
        available: i64,
    },

    /// A quantity that must be positive was zero or negative
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// The batch does not belong to the item the demand record requires
    #[error("Batch {batch_id} does not hold the item required by demand {demand_id}")]
    BatchItemMismatch {
        batch_id: BatchId,
        demand_id: DemandId,
    },
}

impl InventoryError {
    /// Creates a not-found error for a specific entity type and identifier
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        InventoryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
