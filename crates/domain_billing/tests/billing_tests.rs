//! Integration tests for the billing domain

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

use core_kernel::{EncounterId, Money, StaffId};
use domain_billing::{
    can_discharge, compute_charges, Billing, BillingAdjustment, BillingError,
    BillingItemType, EncounterCharges, PaymentMethod, PaymentRequest, PaymentStatus, ServiceFee,
};
use test_utils::{assert_billing_consistent, EncounterChargesBuilder};

fn money(n: i64) -> Money {
    Money::new(n.into())
}

fn sample_charges() -> EncounterCharges {
    EncounterChargesBuilder::new()
        .with_service_fee("Administration", money(15000))
        .with_service_fee("Consultation", money(50000))
        .with_procedure("SUTURE")
        .with_procedure("UNPRICED")
        .with_catalog_service("SUTURE", "Wound suturing", money(120000))
        .with_prescription("Amoxicillin 500mg", 15, money(1500))
        .with_bed(
            "Melati 2",
            money(250000),
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
        )
        .with_material("Infusion set", 2, money(25000))
        .build()
}

// ============================================================================
// Charge aggregation
// ============================================================================

mod aggregation {
    use super::*;

    #[test]
    fn collects_every_source_once() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let sheet = compute_charges(EncounterId::new(), &sample_charges(), now);

        // 2 fees + 1 cataloged procedure + 1 prescription + 1 room + 1 material.
        assert_eq!(sheet.items.len(), 6);

        // June 1st 08:00 to June 3rd 10:00 is 2 days 2 hours -> 3 room days.
        let room = sheet
            .items
            .iter()
            .find(|i| i.item_type == BillingItemType::Room)
            .unwrap();
        assert_eq!(room.quantity, dec!(3));
        assert_eq!(room.total(), money(750000));

        // Drugs billed by prescribed quantity at catalog price.
        let drug = sheet
            .items
            .iter()
            .find(|i| i.item_type == BillingItemType::Drug)
            .unwrap();
        assert_eq!(drug.quantity, dec!(15));
        assert_eq!(drug.total(), money(22500));

        // 15000 + 50000 + 120000 + 22500 + 750000 + 50000
        assert_eq!(sheet.subtotal, money(1007500));
    }

    #[test]
    fn uncataloged_procedures_are_skipped_not_errored() {
        let now = Utc::now();
        let mut charges = sample_charges();
        charges.service_catalog.clear();

        let sheet = compute_charges(EncounterId::new(), &charges, now);
        assert!(sheet
            .items
            .iter()
            .all(|i| i.description != "Wound suturing"));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let charges = sample_charges();

        let first = compute_charges(EncounterId::new(), &charges, now);
        let second = compute_charges(EncounterId::new(), &charges, now);

        assert_eq!(first.subtotal, second.subtotal);
        assert_eq!(first.items.len(), second.items.len());
        for (a, b) in first.items.iter().zip(second.items.iter()) {
            assert_eq!(a.description, b.description);
            assert_eq!(a.quantity, b.quantity);
            assert_eq!(a.total(), b.total());
        }
    }

    #[test]
    fn discharge_timestamp_freezes_the_room_line() {
        let mut charges = sample_charges();
        charges.bed_assignment.as_mut().unwrap().discharged_at =
            Some(Utc.with_ymd_and_hms(2024, 6, 2, 7, 0, 0).unwrap());

        // "now" long after discharge must not grow the line.
        let later = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let sheet = compute_charges(EncounterId::new(), &charges, later);

        let room = sheet
            .items
            .iter()
            .find(|i| i.item_type == BillingItemType::Room)
            .unwrap();
        assert_eq!(room.quantity, dec!(1));
    }
}

// ============================================================================
// Billing aggregate and payments
// ============================================================================

mod payments {
    use super::*;

    /// Billing with subtotal 100,000 and no adjustments yet.
    fn simple_billing() -> Billing {
        let sheet = compute_charges(
            EncounterId::new(),
            &EncounterCharges {
                service_fees: vec![ServiceFee { name: "Surgery package".into(), amount: money(100000) }],
                ..Default::default()
            },
            Utc::now(),
        );
        Billing::new(EncounterId::new(), sheet.items)
    }

    #[test]
    fn ten_percent_discount_then_full_cash_payment() {
        // Scenario: subtotal 100,000, 10% discount, cash 100,000 tendered
        // against a 90,000 payable.
        let mut billing = simple_billing();
        let outcome = billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(90000), PaymentMethod::Cash)
                    .with_amount_received(money(100000))
                    .with_adjustment(BillingAdjustment {
                        discount_percentage: Some(dec!(10)),
                        ..Default::default()
                    }),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(billing.discount, money(10000));
        assert_eq!(billing.patient_payable, money(90000));
        assert_eq!(outcome.change, money(10000));
        assert_eq!(outcome.payment_status, PaymentStatus::Paid);
        assert_eq!(outcome.remaining_amount, Money::zero());
    }

    #[test]
    fn partial_payment_blocks_discharge_with_the_remaining_amount() {
        let mut billing = simple_billing();
        let outcome = billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(50000), PaymentMethod::BankTransfer).with_adjustment(
                    BillingAdjustment {
                        discount_percentage: Some(dec!(10)),
                        ..Default::default()
                    },
                ),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(outcome.payment_status, PaymentStatus::Partial);
        assert_eq!(outcome.remaining_amount, money(40000));

        let decision = can_discharge(Some(&billing));
        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("partial"));
        assert!(reason.contains("40000"));
    }

    #[test]
    fn overpayment_is_rejected_with_both_numbers() {
        let mut billing = simple_billing();
        billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(10000), PaymentMethod::Cash)
                    .with_amount_received(money(10000))
                    .with_adjustment(BillingAdjustment {
                        discount_percentage: Some(dec!(10)),
                        ..Default::default()
                    }),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap();

        // 80,000 remain; 95,000 is too much.
        let err = billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(95000), PaymentMethod::Cash)
                    .with_amount_received(money(95000)),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap_err();

        match err {
            BillingError::InvalidPaymentAmount { offered, remaining } => {
                assert_eq!(offered, money(95000));
                assert_eq!(remaining, money(80000));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut billing = simple_billing();
        let err = billing
            .apply_discount_and_pay(
                PaymentRequest::new(Money::zero(), PaymentMethod::Cash),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidPaymentAmount { .. }));
    }

    #[test]
    fn underfunded_cash_is_rejected_not_clamped() {
        let mut billing = simple_billing();
        let err = billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(50000), PaymentMethod::Cash)
                    .with_amount_received(money(40000)),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap_err();

        match err {
            BillingError::InsufficientAmountReceived { received, required } => {
                assert_eq!(received, money(40000));
                assert_eq!(required, money(50000));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing was recorded.
        assert!(billing.payments.is_empty());
        assert_eq!(billing.paid_amount, Money::zero());
    }

    #[test]
    fn failed_payment_rolls_back_the_staged_discount() {
        let mut billing = simple_billing();
        let err = billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(200000), PaymentMethod::Cash)
                    .with_amount_received(money(200000))
                    .with_adjustment(BillingAdjustment {
                        discount_percentage: Some(dec!(10)),
                        ..Default::default()
                    }),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidPaymentAmount { .. }));
        // The 10% discount must not have stuck.
        assert_eq!(billing.discount, Money::zero());
        assert_eq!(billing.discount_percentage, None);
        assert_eq!(billing.patient_payable, money(100000));
    }

    #[test]
    fn percentage_wins_when_both_discount_forms_are_given() {
        let mut billing = simple_billing();
        billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(10000), PaymentMethod::BankTransfer).with_adjustment(
                    BillingAdjustment {
                        discount: Some(money(99999)),
                        discount_percentage: Some(dec!(10)),
                        insurance_coverage: None,
                    },
                ),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(billing.discount, money(10000));
        assert_eq!(billing.discount_percentage, Some(dec!(10)));
    }

    #[test]
    fn paid_amount_is_monotonic_and_equals_the_payment_ledger() {
        let mut billing = simple_billing();
        let staff = StaffId::new();
        let mut last_paid = Money::zero();

        for amount in [30000i64, 20000, 50000] {
            let outcome = billing
                .apply_discount_and_pay(
                    PaymentRequest::new(money(amount), PaymentMethod::BankTransfer),
                    staff,
                    Utc::now(),
                )
                .unwrap();
            assert!(outcome.paid_amount >= last_paid);
            last_paid = outcome.paid_amount;

            // Derived-field consistency after every mutation.
            assert_billing_consistent(&billing);
        }

        assert_eq!(billing.payment_status, PaymentStatus::Paid);
        assert_eq!(billing.remaining_amount, Money::zero());
    }

    #[test]
    fn insurance_coverage_reduces_the_payable() {
        let mut billing = simple_billing();
        let outcome = billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(60000), PaymentMethod::BankTransfer).with_adjustment(
                    BillingAdjustment {
                        insurance_coverage: Some(money(40000)),
                        ..Default::default()
                    },
                ),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(billing.patient_payable, money(60000));
        assert_eq!(outcome.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn replace_items_recomputes_and_preserves_payments() {
        let mut billing = simple_billing();
        billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(30000), PaymentMethod::BankTransfer),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap();

        let bigger = compute_charges(
            billing.encounter_id,
            &EncounterCharges {
                service_fees: vec![ServiceFee { name: "Surgery package".into(), amount: money(150000) }],
                ..Default::default()
            },
            Utc::now(),
        );
        billing.replace_items(bigger.items);

        assert_billing_consistent(&billing);
        assert_eq!(billing.subtotal, money(150000));
        assert_eq!(billing.paid_amount, money(30000));
        assert_eq!(billing.remaining_amount, money(120000));
        assert_eq!(billing.payment_status, PaymentStatus::Partial);
    }
}

// ============================================================================
// Discharge gate
// ============================================================================

mod discharge {
    use super::*;

    #[test]
    fn missing_billing_blocks_discharge() {
        let decision = can_discharge(None);
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("billing not created yet"));
    }

    #[test]
    fn paid_billing_allows_discharge() {
        let sheet = compute_charges(
            EncounterId::new(),
            &EncounterCharges {
                service_fees: vec![ServiceFee { name: "Consultation".into(), amount: money(50000) }],
                ..Default::default()
            },
            Utc::now(),
        );
        let mut billing = Billing::new(EncounterId::new(), sheet.items);
        billing
            .apply_discount_and_pay(
                PaymentRequest::new(money(50000), PaymentMethod::Cash)
                    .with_amount_received(money(50000)),
                StaffId::new(),
                Utc::now(),
            )
            .unwrap();

        let decision = can_discharge(Some(&billing));
        assert!(decision.allowed);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn gate_is_read_only_and_repeatable() {
        let billing = Billing::new(EncounterId::new(), Vec::new());
        let before = billing.updated_at;

        let first = can_discharge(Some(&billing));
        let second = can_discharge(Some(&billing));

        assert_eq!(first, second);
        assert_eq!(billing.updated_at, before);
    }
}
