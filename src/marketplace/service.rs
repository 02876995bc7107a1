//! Distribution & offer marketplace - business logic
//!
//! Owns the many-to-many relation between applications and banks and the
//! competing-offer set. Selecting an offer is atomic and mutually exclusive
//! across offers; every decision-informing read is re-validated under
//! `FOR UPDATE` inside the transaction that writes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::actor::{ActorContext, WorkflowAction};
use crate::application::{ApplicationStatus, LoanApplication, MarketplaceStatus};
use crate::audit::{self, AuditEntry};
use crate::commission::CommissionService;
use crate::directory::DirectoryService;
use crate::error::{WorkflowError, WorkflowResult};
use crate::marketplace::model::{
    ApplicationDistribution, ApprovalResult, AssignedApplication, DistributeRequest,
    DistributionBatchResult, LoanOffer, OfferRequest, OfferStatus,
};
use crate::notify::{self, Notifier};

/// Marketplace service for distributions and competing offers
#[derive(Clone)]
pub struct MarketplaceService {
    db_pool: PgPool,
    directory: DirectoryService,
    commissions: CommissionService,
    notifier: Arc<dyn Notifier>,
    default_due_hours: i64,
}

impl MarketplaceService {
    pub fn new(
        db_pool: PgPool,
        directory: DirectoryService,
        commissions: CommissionService,
        notifier: Arc<dyn Notifier>,
        default_due_hours: i64,
    ) -> Self {
        Self {
            db_pool,
            directory,
            commissions,
            notifier,
            default_due_hours,
        }
    }

    /// Distribute an application to a set of banks.
    ///
    /// Creates one distribution row per bank with a shared response deadline.
    /// Banks already holding a row are skipped, never duplicated; the batch
    /// appends one summarizing audit entry.
    pub async fn distribute(
        &self,
        actor: &ActorContext,
        request: DistributeRequest,
    ) -> WorkflowResult<DistributionBatchResult> {
        actor.require(WorkflowAction::Distribute)?;
        request.validate()?;

        let missing = self.directory.missing_banks(&request.bank_ids).await?;
        if !missing.is_empty() {
            return Err(WorkflowError::NotFound(format!(
                "unknown bank ids: {:?}",
                missing
            )));
        }

        let due_hours = request.due_hours.unwrap_or(self.default_due_hours);
        if due_hours <= 0 {
            return Err(WorkflowError::Validation(
                "response window must be a positive number of hours".to_string(),
            ));
        }
        let response_due_date = Utc::now() + Duration::hours(due_hours);

        let mut tx = self.db_pool.begin().await?;

        let application = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(request.application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("application not found".to_string()))?;

        if application.status != ApplicationStatus::Verified {
            return Err(WorkflowError::Conflict(format!(
                "only verified applications can be distributed, application is {:?}",
                application.status
            )));
        }
        if !application.marketplace_status.accepts_distribution() {
            return Err(WorkflowError::Conflict(
                "an offer has already been selected for this application".to_string(),
            ));
        }

        let mut distributed = Vec::new();
        let mut skipped_existing = Vec::new();

        for bank_id in &request.bank_ids {
            let inserted = sqlx::query_as::<_, ApplicationDistribution>(
                r#"
                INSERT INTO application_distributions (id, application_id, bank_id, response_due_date)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (application_id, bank_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(request.application_id)
            .bind(bank_id)
            .bind(response_due_date)
            .fetch_optional(&mut *tx)
            .await?;

            match inserted {
                Some(row) => distributed.push(row),
                None => skipped_existing.push(*bank_id),
            }
        }

        if application.marketplace_status == MarketplaceStatus::Pending {
            sqlx::query(
                "UPDATE loan_applications SET marketplace_status = 'distributed', updated_at = $1 WHERE id = $2",
            )
            .bind(Utc::now())
            .bind(application.id)
            .execute(&mut *tx)
            .await?;
        }

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                "application.distributed",
                "loan_application",
                application.id,
                serde_json::json!({
                    "bank_ids": distributed.iter().map(|d| d.bank_id).collect::<Vec<_>>(),
                    "skipped_bank_ids": skipped_existing,
                    "response_due_date": response_due_date,
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            application = %application.application_number,
            sent = distributed.len(),
            skipped = skipped_existing.len(),
            "application distributed"
        );

        for row in &distributed {
            notify::send_best_effort(
                self.notifier.as_ref(),
                "application_distributed",
                &row.bank_id.to_string(),
                serde_json::json!({
                    "application_number": application.application_number,
                    "response_due_date": response_due_date,
                }),
            )
            .await;
        }

        Ok(DistributionBatchResult {
            application_id: application.id,
            distributed,
            skipped_existing,
            response_due_date,
        })
    }

    /// Mark the caller's distribution as viewed on first read. Idempotent:
    /// later reads and already-responded rows are left untouched.
    pub async fn record_offer_view(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
    ) -> WorkflowResult<()> {
        actor.require(WorkflowAction::RecordOfferView)?;
        let bank_id = self.directory.bank_for_member(actor.actor_id).await?;

        let mut tx = self.db_pool.begin().await?;

        let viewed = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE application_distributions
            SET status = 'viewed', viewed_at = $1
            WHERE application_id = $2 AND bank_id = $3 AND status = 'sent'
            RETURNING id
            "#,
        )
        .bind(Utc::now())
        .bind(application_id)
        .bind(bank_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((distribution_id,)) = viewed {
            audit::record(
                &mut *tx,
                AuditEntry::new(
                    actor,
                    "distribution.viewed",
                    "application_distribution",
                    distribution_id,
                    serde_json::json!({ "application_id": application_id, "bank_id": bank_id }),
                ),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Submit a competing offer for a distributed application.
    ///
    /// Requires a distribution row for the banker's bank. One offer per
    /// (application, bank); concurrent offers from different banks are
    /// independent.
    pub async fn submit_offer(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
        request: OfferRequest,
    ) -> WorkflowResult<LoanOffer> {
        actor.require(WorkflowAction::SubmitOffer)?;
        request.validate()?;

        if request.offered_amount <= Decimal::ZERO {
            return Err(WorkflowError::Validation(
                "offered amount must be positive".to_string(),
            ));
        }
        if request.interest_rate <= Decimal::ZERO {
            return Err(WorkflowError::Validation(
                "interest rate must be positive".to_string(),
            ));
        }

        let bank_id = self.directory.bank_for_member(actor.actor_id).await?;

        let mut tx = self.db_pool.begin().await?;

        let distribution = sqlx::query_as::<_, ApplicationDistribution>(
            r#"
            SELECT * FROM application_distributions
            WHERE application_id = $1 AND bank_id = $2
            FOR UPDATE
            "#,
        )
        .bind(application_id)
        .bind(bank_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            WorkflowError::NotFound("application is not assigned to your bank".to_string())
        })?;

        let application = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        if !application.status.is_pre_approval() {
            return Err(WorkflowError::Conflict(format!(
                "offers are closed on a {:?} application",
                application.status
            )));
        }
        if !application.marketplace_status.accepts_offers() {
            return Err(WorkflowError::Conflict(
                "the application is not open for offers".to_string(),
            ));
        }

        let already_offered = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM loan_offers WHERE application_id = $1 AND bank_id = $2",
        )
        .bind(application_id)
        .bind(bank_id)
        .fetch_one(&mut *tx)
        .await?
        .0;

        if already_offered > 0 {
            return Err(WorkflowError::Conflict(
                "your bank has already responded to this application".to_string(),
            ));
        }

        let offer = sqlx::query_as::<_, LoanOffer>(
            r#"
            INSERT INTO loan_offers (
                id, application_id, bank_id, banker_id,
                offered_amount, interest_rate, tenure_months
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(application_id)
        .bind(bank_id)
        .bind(actor.actor_id)
        .bind(request.offered_amount)
        .bind(request.interest_rate)
        .bind(request.tenure_months)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE application_distributions SET status = 'responded' WHERE id = $1")
            .bind(distribution.id)
            .execute(&mut *tx)
            .await?;

        if application.marketplace_status == MarketplaceStatus::Distributed {
            sqlx::query(
                "UPDATE loan_applications SET marketplace_status = 'offers_open', updated_at = $1 WHERE id = $2",
            )
            .bind(Utc::now())
            .bind(application_id)
            .execute(&mut *tx)
            .await?;
        }

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                "offer.submitted",
                "loan_offer",
                offer.id,
                serde_json::json!({
                    "application_id": application_id,
                    "bank_id": bank_id,
                    "offered_amount": offer.offered_amount,
                    "interest_rate": offer.interest_rate,
                    "tenure_months": offer.tenure_months,
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            application = %application.application_number,
            bank = %bank_id,
            "offer submitted"
        );

        Ok(offer)
    }

    /// Active offers from competing banks, newest first.
    pub async fn list_competing_offers(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
    ) -> WorkflowResult<Vec<LoanOffer>> {
        let bank_id = self.directory.bank_for_member(actor.actor_id).await?;

        let offers = sqlx::query_as::<_, LoanOffer>(
            r#"
            SELECT * FROM loan_offers
            WHERE application_id = $1 AND status = 'active' AND bank_id <> $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(application_id)
        .bind(bank_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(offers)
    }

    /// Every offer on an application, newest first.
    pub async fn list_offers(&self, application_id: Uuid) -> WorkflowResult<Vec<LoanOffer>> {
        let offers = sqlx::query_as::<_, LoanOffer>(
            "SELECT * FROM loan_offers WHERE application_id = $1 ORDER BY created_at DESC",
        )
        .bind(application_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(offers)
    }

    /// Select the winning offer and approve the application.
    ///
    /// One transaction: the offer's terms are copied into the application's
    /// approved fields, the chosen offer flips to selected, every sibling
    /// flips to rejected, and the connector's commission accrues. The offer
    /// and application are re-validated under `FOR UPDATE` so two operators
    /// racing on the same application cannot both win.
    pub async fn select_offer(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
        offer_id: Uuid,
    ) -> WorkflowResult<ApprovalResult> {
        actor.require(WorkflowAction::SelectOffer)?;

        let mut tx = self.db_pool.begin().await?;

        let offer = sqlx::query_as::<_, LoanOffer>(
            "SELECT * FROM loan_offers WHERE id = $1 FOR UPDATE",
        )
        .bind(offer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("offer not found".to_string()))?;

        if offer.application_id != application_id {
            return Err(WorkflowError::Validation(
                "offer does not belong to the target application".to_string(),
            ));
        }
        if offer.status != OfferStatus::Active {
            return Err(WorkflowError::Conflict(format!(
                "offer is no longer active ({:?})",
                offer.status
            )));
        }

        let application = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        application
            .status
            .ensure_transition_to(ApplicationStatus::Approved)?;
        if application.marketplace_status == MarketplaceStatus::OfferSelected {
            return Err(WorkflowError::Conflict(
                "an offer has already been selected for this application".to_string(),
            ));
        }

        let now = Utc::now();

        let approved = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET approved_amount = $1,
                approved_interest_rate = $2,
                approved_tenure_months = $3,
                status = 'approved',
                marketplace_status = 'offer_selected',
                selected_offer_id = $4,
                approved_at = $5,
                updated_at = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(offer.offered_amount)
        .bind(offer.interest_rate)
        .bind(offer.tenure_months)
        .bind(offer.id)
        .bind(now)
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        let selected_offer = sqlx::query_as::<_, LoanOffer>(
            "UPDATE loan_offers SET status = 'selected', updated_at = $1 WHERE id = $2 RETURNING *",
        )
        .bind(now)
        .bind(offer.id)
        .fetch_one(&mut *tx)
        .await?;

        let rejected = sqlx::query_as::<_, (Uuid,)>(
            r#"
            UPDATE loan_offers
            SET status = 'rejected', updated_at = $1
            WHERE application_id = $2 AND id <> $3 AND status = 'active'
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(application_id)
        .bind(offer.id)
        .fetch_all(&mut *tx)
        .await?;
        let rejected_offer_ids: Vec<Uuid> = rejected.into_iter().map(|(id,)| id).collect();

        let category_percent = sqlx::query_as::<_, (Option<Decimal>,)>(
            "SELECT commission_percent FROM loan_categories WHERE id = $1",
        )
        .bind(approved.loan_category_id)
        .fetch_one(&mut *tx)
        .await?
        .0;

        let commission = self
            .commissions
            .accrue_in_tx(&mut tx, actor, &approved, category_percent)
            .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                "offer.selected",
                "loan_application",
                application_id,
                serde_json::json!({
                    "before": { "status": application.status, "selected_offer_id": null },
                    "after": {
                        "status": approved.status,
                        "selected_offer_id": approved.selected_offer_id,
                        "approved_amount": approved.approved_amount,
                        "approved_interest_rate": approved.approved_interest_rate,
                        "approved_tenure_months": approved.approved_tenure_months,
                    },
                    "rejected_offer_ids": rejected_offer_ids,
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            application = %approved.application_number,
            offer = %selected_offer.id,
            rejected = rejected_offer_ids.len(),
            "offer selected, application approved"
        );

        notify::send_best_effort(
            self.notifier.as_ref(),
            "offer_selected",
            &approved.connector_id.to_string(),
            serde_json::json!({
                "application_number": approved.application_number,
                "approved_amount": approved.approved_amount,
                "approved_interest_rate": approved.approved_interest_rate,
            }),
        )
        .await;

        Ok(ApprovalResult {
            application: approved,
            selected_offer,
            rejected_offer_ids,
            commission,
        })
    }

    /// Distributions for the caller's bank, newest first (banker inbox).
    pub async fn list_assigned(
        &self,
        actor: &ActorContext,
    ) -> WorkflowResult<Vec<AssignedApplication>> {
        let bank_id = self.directory.bank_for_member(actor.actor_id).await?;

        let rows = sqlx::query_as::<_, AssignedApplication>(
            r#"
            SELECT
                d.id AS distribution_id,
                a.id AS application_id,
                a.application_number,
                a.requested_amount,
                a.status AS application_status,
                d.status AS distribution_status,
                d.response_due_date,
                d.viewed_at
            FROM application_distributions d
            JOIN loan_applications a ON a.id = d.application_id
            WHERE d.bank_id = $1
            ORDER BY d.created_at DESC
            "#,
        )
        .bind(bank_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows)
    }
}
