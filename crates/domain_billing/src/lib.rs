//! Billing Domain - Charge Aggregation, Payments, and the Discharge Gate
//!
//! This crate computes and settles a patient's bill for one encounter:
//!
//! - **Charge aggregation**: pure collection of chargeable items (service
//!   fees, cataloged procedures, prescriptions, room days, materials) into
//!   line items and a subtotal
//! - **Billing aggregate**: derived totals that always move together
//!   (`total = subtotal - discount + tax`, `payable = total - insurance`,
//!   `remaining = payable - paid`), with an append-only payment ledger and
//!   a monotonically non-decreasing paid amount
//! - **Payment processing**: staged discount/insurance adjustment plus
//!   validated payment recording, committed together or not at all
//! - **Discharge gate**: a pure predicate requiring a fully paid billing
//!
//! The crate takes read-only encounter inputs and mutates only its own
//! billing aggregate; inventory is a separate domain.

pub mod billing;
pub mod charges;
pub mod discharge;
pub mod error;
pub mod payment;

pub use billing::{payment_status_for, Billing, PaymentStatus};
pub use charges::{
    compute_charges, BedAssignment, BillingItem, BillingItemType, CatalogService, ChargeSheet,
    EncounterCharges, MaterialCharge, PrescriptionCharge, ProcedurePerformed, ServiceFee,
};
pub use discharge::{can_discharge, DischargeDecision};
pub use error::BillingError;
pub use payment::{
    BillingAdjustment, Payment, PaymentMethod, PaymentOutcome, PaymentRequest,
};
