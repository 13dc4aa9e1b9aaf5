//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the fields they care about and take defaults for
//! everything else.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{BatchId, EncounterId, ItemId, Money};
use rust_decimal_macros::dec;

use domain_billing::{
    BedAssignment, CatalogService, EncounterCharges, MaterialCharge, PrescriptionCharge,
    ProcedurePerformed, ServiceFee,
};
use domain_inventory::{InventoryBatch, InventoryItem, ItemCategory};

use crate::fixtures::{MoneyFixtures, TemporalFixtures};

/// Builder for inventory batches
pub struct BatchBuilder {
    item_id: ItemId,
    batch_number: String,
    expiry_date: NaiveDate,
    stock_quantity: i64,
    purchase_price: Money,
    supplier: Option<String>,
    received_seq: u64,
    received_at: DateTime<Utc>,
}

impl BatchBuilder {
    /// Creates a builder for a batch of the given item
    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            item_id,
            batch_number: "BN-0001".to_string(),
            expiry_date: TemporalFixtures::future_expiry(),
            stock_quantity: 100,
            purchase_price: MoneyFixtures::purchase_price(),
            supplier: None,
            received_seq: 1,
            received_at: TemporalFixtures::admission(),
        }
    }

    pub fn with_batch_number(mut self, number: impl Into<String>) -> Self {
        self.batch_number = number.into();
        self
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry_date = expiry;
        self
    }

    /// Marks the batch as already expired relative to the fixture "today"
    pub fn expired(mut self) -> Self {
        self.expiry_date = TemporalFixtures::past_expiry();
        self
    }

    pub fn with_stock(mut self, quantity: i64) -> Self {
        self.stock_quantity = quantity;
        self
    }

    pub fn with_received_seq(mut self, seq: u64) -> Self {
        self.received_seq = seq;
        self
    }

    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    pub fn build(self) -> InventoryBatch {
        InventoryBatch {
            id: BatchId::new(),
            item_id: self.item_id,
            batch_number: self.batch_number,
            expiry_date: self.expiry_date,
            stock_quantity: self.stock_quantity,
            purchase_price: self.purchase_price,
            supplier: self.supplier,
            received_seq: self.received_seq,
            received_at: self.received_at,
        }
    }
}

/// Builder for inventory items
pub struct ItemBuilder {
    name: String,
    unit: String,
    unit_price: Money,
    category: ItemCategory,
    minimum_stock: i64,
}

impl ItemBuilder {
    pub fn drug(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: "tablet".to_string(),
            unit_price: MoneyFixtures::drug_unit_price(),
            category: ItemCategory::Drug,
            minimum_stock: 0,
        }
    }

    pub fn material(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: "piece".to_string(),
            unit_price: Money::new(dec!(12000)),
            category: ItemCategory::Material,
            minimum_stock: 0,
        }
    }

    pub fn with_unit_price(mut self, price: Money) -> Self {
        self.unit_price = price;
        self
    }

    pub fn with_minimum_stock(mut self, minimum: i64) -> Self {
        self.minimum_stock = minimum;
        self
    }

    pub fn build(self) -> InventoryItem {
        InventoryItem::new(self.name, self.unit, self.unit_price, self.category)
            .with_minimum_stock(self.minimum_stock)
    }
}

/// Builder for the charge inputs of one encounter
pub struct EncounterChargesBuilder {
    charges: EncounterCharges,
}

impl Default for EncounterChargesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncounterChargesBuilder {
    pub fn new() -> Self {
        Self {
            charges: EncounterCharges::default(),
        }
    }

    pub fn with_service_fee(mut self, name: impl Into<String>, amount: Money) -> Self {
        self.charges.service_fees.push(ServiceFee {
            name: name.into(),
            amount,
        });
        self
    }

    pub fn with_catalog_service(
        mut self,
        code: impl Into<String>,
        name: impl Into<String>,
        price: Money,
    ) -> Self {
        self.charges.service_catalog.push(CatalogService {
            code: code.into(),
            name: name.into(),
            price,
        });
        self
    }

    pub fn with_procedure(mut self, code: impl Into<String>) -> Self {
        self.charges.procedures.push(ProcedurePerformed { code: code.into() });
        self
    }

    pub fn with_prescription(
        mut self,
        drug_name: impl Into<String>,
        quantity: i64,
        unit_price: Money,
    ) -> Self {
        self.charges.prescriptions.push(PrescriptionCharge {
            drug_name: drug_name.into(),
            prescribed_quantity: quantity,
            unit_price,
        });
        self
    }

    pub fn with_bed(
        mut self,
        room_name: impl Into<String>,
        daily_rate: Money,
        started_at: DateTime<Utc>,
    ) -> Self {
        self.charges.bed_assignment = Some(BedAssignment {
            room_name: room_name.into(),
            daily_rate,
            started_at,
            discharged_at: None,
        });
        self
    }

    pub fn discharged_at(mut self, discharged_at: DateTime<Utc>) -> Self {
        if let Some(bed) = self.charges.bed_assignment.as_mut() {
            bed.discharged_at = Some(discharged_at);
        }
        self
    }

    pub fn with_material(
        mut self,
        material_name: impl Into<String>,
        quantity: i64,
        unit_price_at_use: Money,
    ) -> Self {
        self.charges.materials.push(MaterialCharge {
            material_name: material_name.into(),
            quantity,
            unit_price_at_use,
        });
        self
    }

    pub fn build(self) -> EncounterCharges {
        self.charges
    }
}

/// Convenience for a fresh encounter id alongside its charges
pub fn encounter_with_charges(builder: EncounterChargesBuilder) -> (EncounterId, EncounterCharges) {
    (EncounterId::new(), builder.build())
}
