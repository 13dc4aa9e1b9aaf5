//! Core Kernel - Foundational types for the hospital inventory and billing engine
//!
//! This crate provides the building blocks used across the domain modules:
//! - Money with precise decimal arithmetic (never binary floating point)
//! - Strongly-typed identifiers generated at entity construction time

pub mod identifiers;
pub mod money;

pub use identifiers::{
    BatchId, BillingId, BillingItemId, DemandId, EncounterId, ItemId, MovementId, PaymentId,
    StaffId,
};
pub use money::{Money, MoneyError, Rate};
