//! Inventory catalog items
//!
//! Items are created by catalog management and only referenced here; the
//! engine never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ItemId, Money};

/// Category of an inventory item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    /// Pharmaceutical stock dispensed against prescriptions
    Drug,
    /// Consumable material used during care
    Material,
}

/// A catalog entry for stockable inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Unique identifier
    pub id: ItemId,
    /// Display name
    pub name: String,
    /// Unit of measure (e.g., "tablet", "ml", "piece")
    pub unit: String,
    /// Current catalog selling price per unit
    pub unit_price: Money,
    /// Reorder threshold; stock at or below this level is flagged low
    pub minimum_stock: i64,
    /// Item category
    pub category: ItemCategory,
    /// Whether the item may still be allocated
    pub is_active: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Creates a new catalog item
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        unit_price: Money,
        category: ItemCategory,
    ) -> Self {
        Self {
            id: ItemId::new_v7(),
            name: name.into(),
            unit: unit.into(),
            unit_price,
            minimum_stock: 0,
            category,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Sets the minimum-stock threshold
    pub fn with_minimum_stock(mut self, minimum: i64) -> Self {
        self.minimum_stock = minimum;
        self
    }

    /// Deactivates the item
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}
