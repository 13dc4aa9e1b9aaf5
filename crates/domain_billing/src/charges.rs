//! Charge aggregation
//!
//! Collects the chargeable items of an encounter from its distinct sources
//! and produces billing line items plus a subtotal. Aggregation is pure:
//! it mutates nothing, and two calls over the same inputs yield identical
//! output. Persistence is a separate step.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{BillingItemId, EncounterId, Money};

/// Type of a billing line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingItemType {
    Service,
    Drug,
    Material,
    Room,
}

/// A line item on a billing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingItem {
    /// Item ID
    pub id: BillingItemId,
    /// Description shown on the bill
    pub description: String,
    /// Item type
    pub item_type: BillingItemType,
    /// Quantity
    pub quantity: Decimal,
    /// Unit price
    pub unit_price: Money,
    /// Per-item discount
    pub discount: Money,
}

impl BillingItem {
    /// Creates a new line item with quantity 1 and no discount
    pub fn new(
        description: impl Into<String>,
        item_type: BillingItemType,
        unit_price: Money,
    ) -> Self {
        Self {
            id: BillingItemId::new_v7(),
            description: description.into(),
            item_type,
            quantity: Decimal::ONE,
            unit_price,
            discount: Money::zero(),
        }
    }

    /// Sets the quantity
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    /// Applies a per-item discount
    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    /// Line total: quantity x unit price - discount
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity) - self.discount
    }
}

/// A fixed service fee (administration, consultation); always quantity 1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceFee {
    pub name: String,
    pub amount: Money,
}

/// A priced entry in the service catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogService {
    pub code: String,
    pub name: String,
    pub price: Money,
}

/// A procedure performed during the encounter, to be matched against the
/// service catalog by code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedurePerformed {
    pub code: String,
}

/// A prescription line; billed by prescribed quantity at the catalog price
/// current at computation time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionCharge {
    pub drug_name: String,
    pub prescribed_quantity: i64,
    pub unit_price: Money,
}

/// An active or completed bed assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedAssignment {
    pub room_name: String,
    pub daily_rate: Money,
    pub started_at: DateTime<Utc>,
    /// Set on discharge; when present, day counting stops here
    pub discharged_at: Option<DateTime<Utc>>,
}

/// A consumed material; quantity and price are the snapshot taken at time
/// of use, not the live catalog price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialCharge {
    pub material_name: String,
    pub quantity: i64,
    pub unit_price_at_use: Money,
}

/// Read-only charge sources for one encounter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncounterCharges {
    pub service_fees: Vec<ServiceFee>,
    pub procedures: Vec<ProcedurePerformed>,
    pub service_catalog: Vec<CatalogService>,
    pub prescriptions: Vec<PrescriptionCharge>,
    pub bed_assignment: Option<BedAssignment>,
    pub materials: Vec<MaterialCharge>,
}

/// The computed output of charge aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSheet {
    pub items: Vec<BillingItem>,
    pub subtotal: Money,
}

/// Number of chargeable calendar days between assignment start and `until`,
/// ceiling-rounded with a minimum of 1
fn chargeable_days(started_at: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    let seconds = (until - started_at).num_seconds();
    if seconds <= 0 {
        return 1;
    }
    let days = (seconds + 86_399) / 86_400;
    days.max(1)
}

/// Computes the billing line items and subtotal for an encounter
///
/// Sources contribute in a fixed order: fixed fees, cataloged procedures,
/// prescriptions, room days, materials. Procedures without a matching
/// catalog entry are skipped, not errored. Room days are priced from the
/// assignment start to `now` (or to the discharge timestamp when set).
pub fn compute_charges(
    encounter_id: EncounterId,
    charges: &EncounterCharges,
    now: DateTime<Utc>,
) -> ChargeSheet {
    let mut items = Vec::new();

    for fee in &charges.service_fees {
        items.push(BillingItem::new(
            fee.name.clone(),
            BillingItemType::Service,
            fee.amount,
        ));
    }

    for procedure in &charges.procedures {
        match charges
            .service_catalog
            .iter()
            .find(|s| s.code == procedure.code)
        {
            Some(service) => items.push(BillingItem::new(
                service.name.clone(),
                BillingItemType::Service,
                service.price,
            )),
            None => {
                // Uncataloged procedures are a documented gap, not an error.
                debug!(%encounter_id, code = %procedure.code, "procedure has no catalog entry, skipping");
            }
        }
    }

    for prescription in &charges.prescriptions {
        items.push(
            BillingItem::new(
                prescription.drug_name.clone(),
                BillingItemType::Drug,
                prescription.unit_price,
            )
            .with_quantity(Decimal::from(prescription.prescribed_quantity)),
        );
    }

    if let Some(bed) = &charges.bed_assignment {
        let until = bed.discharged_at.unwrap_or(now);
        let days = chargeable_days(bed.started_at, until);
        items.push(
            BillingItem::new(
                format!("Room charge - {}", bed.room_name),
                BillingItemType::Room,
                bed.daily_rate,
            )
            .with_quantity(Decimal::from(days)),
        );
    }

    for material in &charges.materials {
        items.push(
            BillingItem::new(
                material.material_name.clone(),
                BillingItemType::Material,
                material.unit_price_at_use,
            )
            .with_quantity(Decimal::from(material.quantity)),
        );
    }

    let subtotal = items.iter().map(BillingItem::total).sum();

    ChargeSheet { items, subtotal }
}
