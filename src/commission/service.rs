//! Commission engine - accrual and batch settlement

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::actor::{ActorContext, WorkflowAction};
use crate::application::{ApplicationStatus, LoanApplication};
use crate::audit::{self, AuditEntry};
use crate::commission::model::{
    commission_amount, CommissionRecord, PayBatchRequest, PaymentResult,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::notify::{self, Notifier};

/// Commission service for accrual and settlement
#[derive(Clone)]
pub struct CommissionService {
    db_pool: PgPool,
    notifier: Arc<dyn Notifier>,
    default_percent: Decimal,
}

impl CommissionService {
    pub fn new(db_pool: PgPool, notifier: Arc<dyn Notifier>, default_percent: Decimal) -> Self {
        Self {
            db_pool,
            notifier,
            default_percent,
        }
    }

    /// Accrue the connector's commission inside the caller's transaction.
    ///
    /// Conditional insert keyed by (application, connector): a repeat call
    /// returns the existing record untouched instead of creating a duplicate.
    pub async fn accrue_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        actor: &ActorContext,
        application: &LoanApplication,
        category_percent: Option<Decimal>,
    ) -> WorkflowResult<CommissionRecord> {
        let approved_amount = application.approved_amount.ok_or_else(|| {
            WorkflowError::Conflict("application has no approved amount".to_string())
        })?;

        let percent = category_percent.unwrap_or(self.default_percent);
        let amount = commission_amount(approved_amount, percent);

        let inserted = sqlx::query_as::<_, CommissionRecord>(
            r#"
            INSERT INTO commission_records (id, application_id, connector_id, commission_percent, amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (application_id, connector_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(application.id)
        .bind(application.connector_id)
        .bind(percent)
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await?;

        match inserted {
            Some(record) => {
                audit::record(
                    &mut **tx,
                    AuditEntry::new(
                        actor,
                        "commission.accrued",
                        "commission_record",
                        record.id,
                        serde_json::json!({
                            "application_id": record.application_id,
                            "connector_id": record.connector_id,
                            "commission_percent": record.commission_percent,
                            "amount": record.amount,
                        }),
                    ),
                )
                .await?;

                Ok(record)
            }
            // Already accrued; keep the original record.
            None => {
                let existing = sqlx::query_as::<_, CommissionRecord>(
                    r#"
                    SELECT * FROM commission_records
                    WHERE application_id = $1 AND connector_id = $2
                    "#,
                )
                .bind(application.id)
                .bind(application.connector_id)
                .fetch_one(&mut **tx)
                .await?;

                Ok(existing)
            }
        }
    }

    /// Accrue a commission for an approved or disbursed application.
    pub async fn accrue(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
    ) -> WorkflowResult<CommissionRecord> {
        actor.require(WorkflowAction::AccrueCommission)?;

        let mut tx = self.db_pool.begin().await?;

        let application = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("application not found".to_string()))?;

        if !matches!(
            application.status,
            ApplicationStatus::Approved | ApplicationStatus::Disbursed
        ) {
            return Err(WorkflowError::Conflict(format!(
                "commission accrues only on approved or disbursed applications, not {:?}",
                application.status
            )));
        }

        let category_percent = sqlx::query_as::<_, (Option<Decimal>,)>(
            "SELECT commission_percent FROM loan_categories WHERE id = $1",
        )
        .bind(application.loan_category_id)
        .fetch_one(&mut *tx)
        .await?
        .0;

        let record = self
            .accrue_in_tx(&mut tx, actor, &application, category_percent)
            .await?;

        tx.commit().await?;

        Ok(record)
    }

    /// Settle a batch of earned commissions under one payment reference.
    ///
    /// Ids that are not currently `earned` are skipped; if none are eligible
    /// the call mutates nothing and reports `NoEligibleRecords`.
    pub async fn pay_batch(
        &self,
        actor: &ActorContext,
        request: PayBatchRequest,
    ) -> WorkflowResult<PaymentResult> {
        actor.require(WorkflowAction::PayCommissions)?;
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;

        let paid = sqlx::query_as::<_, CommissionRecord>(
            r#"
            UPDATE commission_records
            SET status = 'paid', payment_reference = $1, paid_at = $2
            WHERE id = ANY($3) AND status = 'earned'
            RETURNING *
            "#,
        )
        .bind(&request.payment_reference)
        .bind(Utc::now())
        .bind(&request.commission_ids)
        .fetch_all(&mut *tx)
        .await?;

        if paid.is_empty() {
            return Err(WorkflowError::NoEligibleRecords);
        }

        let total_amount: Decimal = paid.iter().map(|record| record.amount).sum();
        let skipped: Vec<Uuid> = request
            .commission_ids
            .iter()
            .copied()
            .filter(|id| !paid.iter().any(|record| record.id == *id))
            .collect();

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                "commission.batch_paid",
                "commission_batch",
                &request.payment_reference,
                serde_json::json!({
                    "paid_ids": paid.iter().map(|r| r.id).collect::<Vec<_>>(),
                    "skipped_ids": skipped,
                    "total_amount": total_amount,
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            reference = %request.payment_reference,
            count = paid.len(),
            %total_amount,
            "commission batch settled"
        );

        // One notification per connector, with their share of the batch.
        let mut per_connector: BTreeMap<Uuid, Decimal> = BTreeMap::new();
        for record in &paid {
            *per_connector.entry(record.connector_id).or_default() += record.amount;
        }
        for (connector_id, amount) in per_connector {
            notify::send_best_effort(
                self.notifier.as_ref(),
                "commission_paid",
                &connector_id.to_string(),
                serde_json::json!({
                    "amount": amount,
                    "payment_reference": request.payment_reference,
                }),
            )
            .await;
        }

        Ok(PaymentResult {
            paid,
            total_amount,
            payment_reference: request.payment_reference,
            skipped,
        })
    }

    /// Commissions accrued to one connector, newest first.
    pub async fn list_for_connector(
        &self,
        connector_id: Uuid,
    ) -> WorkflowResult<Vec<CommissionRecord>> {
        let records = sqlx::query_as::<_, CommissionRecord>(
            r#"
            SELECT * FROM commission_records
            WHERE connector_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(connector_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(records)
    }

    /// All unsettled commissions, oldest first (the payment queue).
    pub async fn list_earned(&self) -> WorkflowResult<Vec<CommissionRecord>> {
        let records = sqlx::query_as::<_, CommissionRecord>(
            "SELECT * FROM commission_records WHERE status = 'earned' ORDER BY created_at",
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(records)
    }
}
