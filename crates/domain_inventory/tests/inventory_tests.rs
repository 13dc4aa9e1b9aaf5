//! Integration tests for the inventory domain

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;

use core_kernel::{ItemId, Money, StaffId};
use domain_inventory::{
    allocate, DemandKind, DemandRecord, FulfillmentEngine, FulfillmentRequest, InventoryError,
    InventoryItem, ItemCategory, MovementType, NewBatch, StockLedger,
};
use test_utils::{assert_plan_complete, BatchBuilder, TemporalFixtures};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 12, 1)
}

struct Setup {
    engine: FulfillmentEngine,
    item_id: ItemId,
    staff: StaffId,
}

fn setup() -> Setup {
    let mut ledger = StockLedger::new();
    let item = InventoryItem::new(
        "Amoxicillin 500mg",
        "capsule",
        Money::new(dec!(1500)),
        ItemCategory::Drug,
    );
    let item_id = item.id;
    ledger.register_item(item).unwrap();

    Setup {
        engine: FulfillmentEngine::new(ledger),
        item_id,
        staff: StaffId::new(),
    }
}

fn receive(setup: &mut Setup, number: &str, quantity: i64, expiry: NaiveDate) -> core_kernel::BatchId {
    setup
        .engine
        .ledger_mut()
        .receive_batch(
            NewBatch {
                item_id: setup.item_id,
                batch_number: number.to_string(),
                expiry_date: expiry,
                quantity,
                purchase_price: Money::new(dec!(900)),
                supplier: None,
            },
            setup.staff,
            Utc::now(),
        )
        .unwrap()
}

fn demand(setup: &mut Setup, required: i64) -> core_kernel::DemandId {
    let record = DemandRecord::new(
        DemandKind::Prescription,
        core_kernel::EncounterId::new(),
        setup.item_id,
        required,
    );
    let id = record.id;
    setup.engine.register_demand(record).unwrap();
    id
}

// ============================================================================
// Allocation scenarios
// ============================================================================

mod allocation {
    use super::*;

    #[test]
    fn spans_batches_in_expiry_order() {
        let mut s = setup();
        let x = receive(&mut s, "X", 10, date(2025, 1, 1));
        let y = receive(&mut s, "Y", 20, date(2025, 6, 1));

        let batches = s.engine.ledger().allocatable_batches(&s.item_id, today());
        let plan = allocate(&batches, 15, today()).unwrap();

        assert!(plan.is_complete());
        assert_eq!(plan.allocations[0].batch_id, x);
        assert_eq!(plan.allocations[0].quantity, 10);
        assert_eq!(plan.allocations[1].batch_id, y);
        assert_eq!(plan.allocations[1].quantity, 5);
    }

    #[test]
    fn small_requirement_stays_in_one_batch() {
        let mut s = setup();
        let b = receive(&mut s, "B", 50, date(2025, 6, 1));

        let batches = s.engine.ledger().allocatable_batches(&s.item_id, today());
        let plan = allocate(&batches, 5, today()).unwrap();

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].batch_id, b);
        assert_eq!(plan.allocations[0].quantity, 5);
    }

    #[test]
    fn expired_batches_are_invisible() {
        let item_id = test_utils::IdFixtures::item_id();
        let expired = BatchBuilder::for_item(item_id)
            .with_batch_number("OLD")
            .expired()
            .with_stock(100)
            .build();
        let fresh = BatchBuilder::for_item(item_id)
            .with_batch_number("NEW")
            .with_stock(30)
            .with_received_seq(2)
            .build();
        let fresh_id = fresh.id;

        let plan = allocate(&[expired, fresh], 30, TemporalFixtures::today()).unwrap();

        assert_plan_complete(&plan);
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].batch_id, fresh_id);
    }

    proptest::proptest! {
        #[test]
        fn takings_follow_expiry_then_receipt_order(
            batches in test_utils::batch_set_strategy(),
            required in 1i64..2000,
        ) {
            let today = TemporalFixtures::today();
            let plan = allocate(&batches, required, today).unwrap();

            // Multi-batch plans walk strictly forward in FEFO order.
            if plan.allocations.len() > 1 {
                let keys: Vec<_> = plan
                    .allocations
                    .iter()
                    .map(|a| {
                        let b = batches.iter().find(|b| b.id == a.batch_id).unwrap();
                        (b.expiry_date, b.received_seq)
                    })
                    .collect();
                proptest::prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}

// ============================================================================
// Single fulfillment
// ============================================================================

mod fulfillment {
    use super::*;

    #[test]
    fn deducts_stock_and_marks_demand() {
        let mut s = setup();
        let batch = receive(&mut s, "B", 50, date(2025, 6, 1));
        let demand_id = demand(&mut s, 5);

        let record = s
            .engine
            .fulfill(demand_id, batch, 5, s.staff, Utc::now())
            .unwrap()
            .clone();

        assert!(record.fulfilled);
        let fulfillment = record.fulfillment.unwrap();
        assert_eq!(fulfillment.dispensed_quantity, 5);
        assert_eq!(fulfillment.batches.len(), 1);
        assert_eq!(fulfillment.batches[0].batch_id, batch);
        assert_eq!(s.engine.ledger().batch(&batch).unwrap().stock_quantity, 45);

        let movements = s.engine.ledger().movements_for(&batch);
        let out = movements.last().unwrap();
        assert_eq!(out.movement_type, MovementType::Out);
        assert_eq!(out.quantity, -5);
        assert_eq!(out.demand_id, Some(demand_id));
    }

    #[test]
    fn second_attempt_fails_without_touching_stock() {
        let mut s = setup();
        let batch = receive(&mut s, "B", 10, date(2025, 6, 1));
        let demand_id = demand(&mut s, 5);

        s.engine.fulfill(demand_id, batch, 5, s.staff, Utc::now()).unwrap();
        let movement_count = s.engine.ledger().movements().len();

        let err = s
            .engine
            .fulfill(demand_id, batch, 5, s.staff, Utc::now())
            .unwrap_err();

        assert!(matches!(err, InventoryError::AlreadyFulfilled(id) if id == demand_id));
        assert_eq!(s.engine.ledger().batch(&batch).unwrap().stock_quantity, 5);
        assert_eq!(s.engine.ledger().movements().len(), movement_count);
    }

    #[test]
    fn racing_requests_on_a_draining_batch_leave_stock_at_zero() {
        // Two requests against a demand of 5 and a batch holding exactly 5:
        // the first wins, the second hits the idempotency guard, stock is 0.
        let mut s = setup();
        let batch = receive(&mut s, "B", 5, date(2025, 6, 1));
        let demand_id = demand(&mut s, 5);

        let first = s.engine.fulfill(demand_id, batch, 5, s.staff, Utc::now());
        assert!(first.is_ok());

        let second = s.engine.fulfill(demand_id, batch, 5, s.staff, Utc::now());
        assert!(matches!(
            second.unwrap_err(),
            InventoryError::AlreadyFulfilled(_) | InventoryError::InsufficientStock { .. }
        ));
        assert_eq!(s.engine.ledger().batch(&batch).unwrap().stock_quantity, 0);
    }

    #[test]
    fn insufficient_stock_names_both_numbers() {
        let mut s = setup();
        let batch = receive(&mut s, "B", 3, date(2025, 6, 1));
        let demand_id = demand(&mut s, 5);

        let err = s
            .engine
            .fulfill(demand_id, batch, 5, s.staff, Utc::now())
            .unwrap_err();

        match err {
            InventoryError::InsufficientStock { available, requested, .. } => {
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!s.engine.demand(&demand_id).unwrap().fulfilled);
    }

    #[test]
    fn missing_demand_and_batch_are_not_found() {
        let mut s = setup();
        let batch = receive(&mut s, "B", 10, date(2025, 6, 1));
        let demand_id = demand(&mut s, 5);

        let err = s
            .engine
            .fulfill(core_kernel::DemandId::new(), batch, 5, s.staff, Utc::now())
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { entity: "Demand record", .. }));

        let err = s
            .engine
            .fulfill(demand_id, core_kernel::BatchId::new(), 5, s.staff, Utc::now())
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { entity: "Batch", .. }));
    }

    #[test]
    fn batch_of_wrong_item_is_rejected() {
        let mut s = setup();
        let other_item = InventoryItem::new("Gauze", "roll", Money::new(dec!(2000)), ItemCategory::Material);
        let other_id = other_item.id;
        s.engine.ledger_mut().register_item(other_item).unwrap();
        let foreign_batch = s
            .engine
            .ledger_mut()
            .receive_batch(
                NewBatch {
                    item_id: other_id,
                    batch_number: "G-1".into(),
                    expiry_date: date(2026, 1, 1),
                    quantity: 10,
                    purchase_price: Money::new(dec!(1500)),
                    supplier: None,
                },
                s.staff,
                Utc::now(),
            )
            .unwrap();
        let demand_id = demand(&mut s, 2);

        let err = s
            .engine
            .fulfill(demand_id, foreign_batch, 2, s.staff, Utc::now())
            .unwrap_err();
        assert!(matches!(err, InventoryError::BatchItemMismatch { .. }));
    }
}

// ============================================================================
// Bulk fulfillment
// ============================================================================

mod bulk {
    use super::*;

    #[test]
    fn commits_all_requests_together() {
        let mut s = setup();
        let batch = receive(&mut s, "B", 30, date(2025, 6, 1));
        let d1 = demand(&mut s, 10);
        let d2 = demand(&mut s, 15);

        let updated = s
            .engine
            .fulfill_bulk(
                &[
                    FulfillmentRequest { demand_id: d1, batch_id: batch, quantity: 10 },
                    FulfillmentRequest { demand_id: d2, batch_id: batch, quantity: 15 },
                ],
                s.staff,
                Utc::now(),
            )
            .unwrap();

        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|d| d.fulfilled));
        assert_eq!(s.engine.ledger().batch(&batch).unwrap().stock_quantity, 5);
    }

    #[test]
    fn one_bad_request_rolls_back_the_whole_batch() {
        let mut s = setup();
        let batch = receive(&mut s, "B", 12, date(2025, 6, 1));
        let d1 = demand(&mut s, 10);
        let d2 = demand(&mut s, 15);

        let err = s
            .engine
            .fulfill_bulk(
                &[
                    FulfillmentRequest { demand_id: d1, batch_id: batch, quantity: 10 },
                    // Combined draw of 25 exceeds the 12 on hand.
                    FulfillmentRequest { demand_id: d2, batch_id: batch, quantity: 15 },
                ],
                s.staff,
                Utc::now(),
            )
            .unwrap_err();

        assert!(matches!(err, InventoryError::InsufficientStock { available: 12, requested: 25, .. }));
        assert_eq!(s.engine.ledger().batch(&batch).unwrap().stock_quantity, 12);
        assert!(!s.engine.demand(&d1).unwrap().fulfilled);
        assert!(!s.engine.demand(&d2).unwrap().fulfilled);
        assert_eq!(
            s.engine
                .ledger()
                .movements()
                .iter()
                .filter(|m| m.movement_type == MovementType::Out)
                .count(),
            0
        );
    }

    #[test]
    fn duplicate_demand_in_one_batch_is_rejected() {
        let mut s = setup();
        let batch = receive(&mut s, "B", 30, date(2025, 6, 1));
        let d1 = demand(&mut s, 5);

        let err = s
            .engine
            .fulfill_bulk(
                &[
                    FulfillmentRequest { demand_id: d1, batch_id: batch, quantity: 5 },
                    FulfillmentRequest { demand_id: d1, batch_id: batch, quantity: 5 },
                ],
                s.staff,
                Utc::now(),
            )
            .unwrap_err();

        assert!(matches!(err, InventoryError::AlreadyFulfilled(_)));
        assert!(!s.engine.demand(&d1).unwrap().fulfilled);
    }
}

// ============================================================================
// Allocator-driven fulfillment
// ============================================================================

mod allocated {
    use super::*;

    #[test]
    fn dispenses_across_the_fefo_plan() {
        let mut s = setup();
        let x = receive(&mut s, "X", 10, date(2025, 1, 1));
        let y = receive(&mut s, "Y", 20, date(2025, 6, 1));
        let demand_id = demand(&mut s, 15);

        let record = s
            .engine
            .fulfill_allocated(demand_id, s.staff, false, today(), Utc::now())
            .unwrap()
            .clone();

        let fulfillment = record.fulfillment.unwrap();
        assert_eq!(fulfillment.dispensed_quantity, 15);
        assert_eq!(fulfillment.batches[0].batch_id, x);
        assert_eq!(fulfillment.batches[0].quantity, 10);
        assert_eq!(fulfillment.batches[1].batch_id, y);
        assert_eq!(fulfillment.batches[1].quantity, 5);
        assert_eq!(s.engine.ledger().batch(&x).unwrap().stock_quantity, 0);
        assert_eq!(s.engine.ledger().batch(&y).unwrap().stock_quantity, 15);
    }

    #[test]
    fn shortfall_fails_closed_by_default() {
        let mut s = setup();
        receive(&mut s, "B", 8, date(2025, 6, 1));
        let demand_id = demand(&mut s, 20);

        let err = s
            .engine
            .fulfill_allocated(demand_id, s.staff, false, today(), Utc::now())
            .unwrap_err();

        match err {
            InventoryError::NoAllocatableStock { required, available, .. } => {
                assert_eq!(required, 20);
                assert_eq!(available, 8);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!s.engine.demand(&demand_id).unwrap().fulfilled);
        assert_eq!(s.engine.ledger().stock_on_hand(&s.item_id), 8);
    }

    #[test]
    fn partial_dispensing_is_opt_in() {
        let mut s = setup();
        let batch = receive(&mut s, "B", 8, date(2025, 6, 1));
        let demand_id = demand(&mut s, 20);

        let record = s
            .engine
            .fulfill_allocated(demand_id, s.staff, true, today(), Utc::now())
            .unwrap()
            .clone();

        assert!(record.fulfilled);
        assert_eq!(record.fulfillment.unwrap().dispensed_quantity, 8);
        assert_eq!(s.engine.ledger().batch(&batch).unwrap().stock_quantity, 0);
    }

    #[test]
    fn expired_stock_never_dispenses() {
        let mut s = setup();
        receive(&mut s, "OLD", 50, date(2024, 1, 1));
        let demand_id = demand(&mut s, 5);

        let err = s
            .engine
            .fulfill_allocated(demand_id, s.staff, false, today(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, InventoryError::NoAllocatableStock { available: 0, .. }));
    }
}
