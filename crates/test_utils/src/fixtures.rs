//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for common entities across the engine. Fixtures
//! are consistent and predictable so tests can assert exact figures.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{EncounterId, ItemId, Money, StaffId};
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical consultation fee
    pub fn consultation_fee() -> Money {
        Money::new(dec!(150000))
    }

    /// A typical per-unit drug price
    pub fn drug_unit_price() -> Money {
        Money::new(dec!(5000))
    }

    /// A typical daily room rate
    pub fn daily_room_rate() -> Money {
        Money::new(dec!(250000))
    }

    /// A typical per-unit purchase price for received stock
    pub fn purchase_price() -> Money {
        Money::new(dec!(3500))
    }

    /// Zero
    pub fn zero() -> Money {
        Money::zero()
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The "today" most tests allocate against (June 1, 2025)
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    /// An expiry date comfortably in the future of [`Self::today`]
    pub fn future_expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    /// An expiry date already past on [`Self::today`]
    pub fn past_expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    /// A fixed admission timestamp (June 1, 2025 08:00 UTC)
    pub fn admission() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    /// A fixed "now" for payment and fulfillment timestamps
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 3, 14, 30, 0).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    pub fn item_id() -> ItemId {
        ItemId::new()
    }

    pub fn encounter_id() -> EncounterId {
        EncounterId::new()
    }

    pub fn staff_id() -> StaffId {
        StaffId::new()
    }
}
