//! Inventory Domain - Stock Ledger, Batch Allocation, and Fulfillment
//!
//! This crate implements the consumption side of the hospital engine:
//!
//! - **Stock ledger**: per-batch quantities with an append-only movement
//!   trail; no batch quantity ever goes negative
//! - **Batch allocator**: First-Expired-First-Out selection over a demand's
//!   required quantity, deterministic under equal expiry dates
//! - **Fulfillment engine**: atomic deduct-and-mark flows, with an
//!   all-or-nothing bulk variant that validates every request before any
//!   mutation
//!
//! Billing is a separate domain; it reads fulfillment output but is never
//! called from here.

pub mod allocator;
pub mod batch;
pub mod demand;
pub mod error;
pub mod fulfillment;
pub mod item;
pub mod ledger;
pub mod movement;

pub use allocator::{allocate, AllocationPlan, BatchAllocation};
pub use batch::{InventoryBatch, NewBatch};
pub use demand::{BatchUse, DemandKind, DemandRecord, FulfillmentRecord};
pub use error::InventoryError;
pub use fulfillment::{FulfillmentEngine, FulfillmentRequest};
pub use item::{InventoryItem, ItemCategory};
pub use ledger::StockLedger;
pub use movement::{MovementType, StockMovement};
