//! Property-Based Test Generators
//!
//! Proptest strategies for generating random test data that maintains
//! domain invariants.

use chrono::{Days, NaiveDate, Utc};
use core_kernel::{BatchId, ItemId, Money};
use domain_inventory::InventoryBatch;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for positive Money values
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(Money::from_minor)
}

/// Strategy for positive stock quantities
pub fn quantity_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000
}

/// Strategy for expiry dates spread around a fixed base date
pub fn expiry_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u64..800).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(offset)
    })
}

/// Strategy for a set of batches of one item with distinct receipt order
///
/// Stock quantities may be zero and expiry dates may be in the past, so the
/// set exercises the allocator's filtering as well as its ordering.
pub fn batch_set_strategy() -> impl Strategy<Value = Vec<InventoryBatch>> {
    prop::collection::vec((0i64..500, expiry_date_strategy()), 0..16).prop_map(|specs| {
        let item_id = ItemId::new();
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (stock, expiry))| InventoryBatch {
                id: BatchId::new(),
                item_id,
                batch_number: format!("BN-{i:04}"),
                expiry_date: expiry,
                stock_quantity: stock,
                purchase_price: Money::new(Decimal::from(1000)),
                supplier: None,
                received_seq: i as u64,
                received_at: Utc::now(),
            })
            .collect()
    })
}
