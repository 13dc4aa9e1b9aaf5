//! Billing repository
//!
//! Persistent counterpart of the billing aggregate. The billing row is the
//! single source of truth per encounter (enforced by a unique constraint),
//! line items are replaced as a full set inside the same transaction that
//! updates the cached totals, and payments are insert-only. Discount and
//! payment validation is the domain's job: the repository loads the
//! aggregate, runs the domain method under a row lock, and persists whatever
//! it produced.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use core_kernel::{BillingId, BillingItemId, EncounterId, Money, PaymentId, StaffId};
use domain_billing::{
    can_discharge, payment_status_for, Billing, BillingError, BillingItem, BillingItemType,
    DischargeDecision, Payment, PaymentMethod, PaymentOutcome, PaymentRequest, PaymentStatus,
};

use crate::error::{DatabaseError, EngineError};

/// Repository for billings, their line items, and payments
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct BillingRow {
    billing_id: Uuid,
    encounter_id: Uuid,
    subtotal: Decimal,
    discount: Decimal,
    discount_percentage: Option<Decimal>,
    tax: Decimal,
    insurance_coverage: Decimal,
    total_amount: Decimal,
    patient_payable: Decimal,
    paid_amount: Decimal,
    remaining_amount: Decimal,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct BillingItemRow {
    billing_item_id: Uuid,
    description: String,
    item_type: String,
    quantity: Decimal,
    unit_price: Decimal,
    discount: Decimal,
}

impl BillingItemRow {
    fn into_domain(self) -> Result<BillingItem, DatabaseError> {
        Ok(BillingItem {
            id: BillingItemId::from_uuid(self.billing_item_id),
            description: self.description,
            item_type: parse_item_type(&self.item_type)?,
            quantity: self.quantity,
            unit_price: Money::new(self.unit_price),
            discount: Money::new(self.discount),
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    billing_id: Uuid,
    amount: Decimal,
    method: String,
    reference: Option<String>,
    amount_received: Option<Decimal>,
    change_given: Decimal,
    received_by: Uuid,
    received_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> Result<Payment, DatabaseError> {
        Ok(Payment {
            id: PaymentId::from_uuid(self.payment_id),
            billing_id: BillingId::from_uuid(self.billing_id),
            amount: Money::new(self.amount),
            method: parse_method(&self.method)?,
            reference: self.reference,
            amount_received: self.amount_received.map(Money::new),
            change_given: Money::new(self.change_given),
            received_by: StaffId::from_uuid(self.received_by),
            received_at: self.received_at,
        })
    }
}

fn item_type_str(item_type: BillingItemType) -> &'static str {
    match item_type {
        BillingItemType::Service => "service",
        BillingItemType::Drug => "drug",
        BillingItemType::Material => "material",
        BillingItemType::Room => "room",
    }
}

fn parse_item_type(s: &str) -> Result<BillingItemType, DatabaseError> {
    match s {
        "service" => Ok(BillingItemType::Service),
        "drug" => Ok(BillingItemType::Drug),
        "material" => Ok(BillingItemType::Material),
        "room" => Ok(BillingItemType::Room),
        other => Err(DatabaseError::RowMapping(format!(
            "unknown billing item type '{other}'"
        ))),
    }
}

fn method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "cash",
        PaymentMethod::BankTransfer => "bank_transfer",
        PaymentMethod::DebitCard => "debit_card",
        PaymentMethod::CreditCard => "credit_card",
        PaymentMethod::Insurance => "insurance",
    }
}

fn parse_method(s: &str) -> Result<PaymentMethod, DatabaseError> {
    match s {
        "cash" => Ok(PaymentMethod::Cash),
        "bank_transfer" => Ok(PaymentMethod::BankTransfer),
        "debit_card" => Ok(PaymentMethod::DebitCard),
        "credit_card" => Ok(PaymentMethod::CreditCard),
        "insurance" => Ok(PaymentMethod::Insurance),
        other => Err(DatabaseError::RowMapping(format!(
            "unknown payment method '{other}'"
        ))),
    }
}

fn status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Partial => "partial",
        PaymentStatus::Paid => "paid",
    }
}

const SELECT_BILLING: &str = "SELECT billing_id, encounter_id, subtotal, discount, \
     discount_percentage, tax, insurance_coverage, total_amount, patient_payable, \
     paid_amount, remaining_amount, payment_status, created_at, updated_at FROM billings";

impl BillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the billing for an encounter
    ///
    /// # Errors
    ///
    /// Returns `BillingAlreadyExists` when the encounter already has one;
    /// the unique constraint on `encounter_id` is the guard, so two
    /// concurrent creates cannot both succeed.
    #[instrument(skip(self, billing), fields(encounter_id = %billing.encounter_id))]
    pub async fn create_billing(&self, billing: &Billing) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;

        let result = insert_billing_row(&mut tx, billing).await;
        if let Err(e) = result {
            return match e {
                EngineError::Database(DatabaseError::DuplicateEntry(_)) => Err(
                    BillingError::BillingAlreadyExists(billing.encounter_id).into(),
                ),
                other => Err(other),
            };
        }

        insert_items(&mut tx, billing.id, &billing.items).await?;
        for payment in &billing.payments {
            insert_payment(&mut tx, payment).await?;
        }

        tx.commit().await?;
        info!(billing_id = %billing.id, subtotal = %billing.subtotal, "billing created");
        Ok(())
    }

    /// Creates the billing for an encounter, or replaces its item set if one
    /// already exists
    ///
    /// Replacement is delete-all/insert-all plus a totals update in the same
    /// transaction, so the stored items and the cached figures always agree.
    /// Payments already recorded are untouched; the derived figures are
    /// recomputed against the new subtotal.
    #[instrument(skip(self, items), fields(%encounter_id))]
    pub async fn create_or_update_billing(
        &self,
        encounter_id: EncounterId,
        items: Vec<BillingItem>,
        tax: Money,
    ) -> Result<Billing, EngineError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, BillingRow>(&format!(
            "{SELECT_BILLING} WHERE encounter_id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(encounter_id))
        .fetch_optional(&mut *tx)
        .await?;

        let billing = match existing {
            None => {
                let billing = Billing::new(encounter_id, items).with_tax(tax);
                insert_billing_row(&mut tx, &billing).await?;
                insert_items(&mut tx, billing.id, &billing.items).await?;
                billing
            }
            Some(row) => {
                let mut billing = self.load_aggregate(&mut tx, row).await?;
                billing.tax = tax;
                billing.replace_items(items);

                sqlx::query("DELETE FROM billing_items WHERE billing_id = $1")
                    .bind(Uuid::from(billing.id))
                    .execute(&mut *tx)
                    .await?;
                insert_items(&mut tx, billing.id, &billing.items).await?;
                update_billing_row(&mut tx, &billing).await?;
                billing
            }
        };

        tx.commit().await?;
        info!(billing_id = %billing.id, subtotal = %billing.subtotal, "billing items replaced");
        Ok(billing)
    }

    /// Applies an optional discount/insurance adjustment and records a
    /// payment, atomically
    ///
    /// The billing row is locked, the aggregate is loaded and the domain
    /// method runs the staged-adjustment validation; only on success are the
    /// updated totals and the new payment row written. A rejected payment
    /// rolls the transaction back, adjustment included.
    #[instrument(skip(self, request), fields(%encounter_id, amount = %request.amount))]
    pub async fn apply_discount_and_pay(
        &self,
        encounter_id: EncounterId,
        request: PaymentRequest,
        received_by: StaffId,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome, EngineError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, BillingRow>(&format!(
            "{SELECT_BILLING} WHERE encounter_id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(encounter_id))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| BillingError::NotFound(format!("no billing for encounter {encounter_id}")))?;

        let mut billing = self.load_aggregate(&mut tx, row).await?;
        let outcome = billing.apply_discount_and_pay(request, received_by, now)?;

        let payment = billing
            .payments
            .last()
            .ok_or_else(|| DatabaseError::RowMapping("payment missing after apply".into()))?;
        insert_payment(&mut tx, payment).await?;
        update_billing_row(&mut tx, &billing).await?;

        tx.commit().await?;
        info!(
            billing_id = %billing.id,
            paid = %outcome.paid_amount,
            remaining = %outcome.remaining_amount,
            "payment persisted"
        );
        Ok(outcome)
    }

    /// Loads the full billing aggregate for an encounter, if one exists
    pub async fn find_by_encounter(
        &self,
        encounter_id: EncounterId,
    ) -> Result<Option<Billing>, EngineError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, BillingRow>(&format!(
            "{SELECT_BILLING} WHERE encounter_id = $1"
        ))
        .bind(Uuid::from(encounter_id))
        .fetch_optional(&mut *tx)
        .await?;

        let billing = match row {
            Some(row) => Some(self.load_aggregate(&mut tx, row).await?),
            None => None,
        };
        tx.commit().await?;
        Ok(billing)
    }

    /// Evaluates the discharge gate for an encounter
    ///
    /// A missing billing blocks discharge the same way an unpaid one does.
    pub async fn can_discharge(
        &self,
        encounter_id: EncounterId,
    ) -> Result<DischargeDecision, EngineError> {
        let billing = self.find_by_encounter(encounter_id).await?;
        Ok(can_discharge(billing.as_ref()))
    }

    async fn load_aggregate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        row: BillingRow,
    ) -> Result<Billing, EngineError> {
        let billing_id = row.billing_id;

        let item_rows = sqlx::query_as::<_, BillingItemRow>(
            "SELECT billing_item_id, description, item_type, quantity, unit_price, discount \
             FROM billing_items WHERE billing_id = $1 ORDER BY billing_item_id",
        )
        .bind(billing_id)
        .fetch_all(&mut **tx)
        .await?;

        let payment_rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT payment_id, billing_id, amount, method, reference, amount_received, \
                 change_given, received_by, received_at \
             FROM payments WHERE billing_id = $1 ORDER BY received_at, payment_id",
        )
        .bind(billing_id)
        .fetch_all(&mut **tx)
        .await?;

        let items = item_rows
            .into_iter()
            .map(BillingItemRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        let payments = payment_rows
            .into_iter()
            .map(PaymentRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;

        let paid_amount = Money::new(row.paid_amount);
        let patient_payable = Money::new(row.patient_payable);

        Ok(Billing {
            id: BillingId::from_uuid(row.billing_id),
            encounter_id: EncounterId::from_uuid(row.encounter_id),
            items,
            subtotal: Money::new(row.subtotal),
            discount: Money::new(row.discount),
            discount_percentage: row.discount_percentage,
            tax: Money::new(row.tax),
            insurance_coverage: Money::new(row.insurance_coverage),
            total_amount: Money::new(row.total_amount),
            patient_payable,
            paid_amount,
            remaining_amount: Money::new(row.remaining_amount),
            // The status is re-derived on load rather than trusted as stored.
            payment_status: payment_status_for(paid_amount, patient_payable),
            payments,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn insert_billing_row(
    tx: &mut Transaction<'_, Postgres>,
    billing: &Billing,
) -> Result<(), EngineError> {
    sqlx::query(
        "INSERT INTO billings \
            (billing_id, encounter_id, subtotal, discount, discount_percentage, tax, \
             insurance_coverage, total_amount, patient_payable, paid_amount, \
             remaining_amount, payment_status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(Uuid::from(billing.id))
    .bind(Uuid::from(billing.encounter_id))
    .bind(billing.subtotal.amount())
    .bind(billing.discount.amount())
    .bind(billing.discount_percentage)
    .bind(billing.tax.amount())
    .bind(billing.insurance_coverage.amount())
    .bind(billing.total_amount.amount())
    .bind(billing.patient_payable.amount())
    .bind(billing.paid_amount.amount())
    .bind(billing.remaining_amount.amount())
    .bind(status_str(billing.payment_status))
    .bind(billing.created_at)
    .bind(billing.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn update_billing_row(
    tx: &mut Transaction<'_, Postgres>,
    billing: &Billing,
) -> Result<(), EngineError> {
    sqlx::query(
        "UPDATE billings SET \
            subtotal = $2, discount = $3, discount_percentage = $4, tax = $5, \
            insurance_coverage = $6, total_amount = $7, patient_payable = $8, \
            paid_amount = $9, remaining_amount = $10, payment_status = $11, updated_at = $12 \
         WHERE billing_id = $1",
    )
    .bind(Uuid::from(billing.id))
    .bind(billing.subtotal.amount())
    .bind(billing.discount.amount())
    .bind(billing.discount_percentage)
    .bind(billing.tax.amount())
    .bind(billing.insurance_coverage.amount())
    .bind(billing.total_amount.amount())
    .bind(billing.patient_payable.amount())
    .bind(billing.paid_amount.amount())
    .bind(billing.remaining_amount.amount())
    .bind(status_str(billing.payment_status))
    .bind(billing.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    billing_id: BillingId,
    items: &[BillingItem],
) -> Result<(), EngineError> {
    for item in items {
        sqlx::query(
            "INSERT INTO billing_items \
                (billing_item_id, billing_id, description, item_type, quantity, \
                 unit_price, discount) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::from(item.id))
        .bind(Uuid::from(billing_id))
        .bind(&item.description)
        .bind(item_type_str(item.item_type))
        .bind(item.quantity)
        .bind(item.unit_price.amount())
        .bind(item.discount.amount())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment: &Payment,
) -> Result<(), EngineError> {
    sqlx::query(
        "INSERT INTO payments \
            (payment_id, billing_id, amount, method, reference, amount_received, \
             change_given, received_by, received_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(Uuid::from(payment.id))
    .bind(Uuid::from(payment.billing_id))
    .bind(payment.amount.amount())
    .bind(method_str(payment.method))
    .bind(&payment.reference)
    .bind(payment.amount_received.map(|m| m.amount()))
    .bind(payment.change_given.amount())
    .bind(Uuid::from(payment.received_by))
    .bind(payment.received_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
