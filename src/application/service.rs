//! Application workflow state machine - business logic for the loan lifecycle

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::actor::{ActorContext, Role, WorkflowAction};
use crate::application::model::{
    generate_application_number, ApplicationListQuery, ApplicationStatus, DisburseRequest,
    LoanApplication, SubmitApplicationRequest,
};
use crate::audit::{self, AuditEntry};
use crate::commission::CommissionService;
use crate::directory::DirectoryService;
use crate::document::DocumentService;
use crate::error::{WorkflowError, WorkflowResult};
use crate::marketplace::LoanOffer;
use crate::notify::{self, Notifier};

/// Workflow service owning every application status transition
#[derive(Clone)]
pub struct ApplicationService {
    db_pool: PgPool,
    directory: DirectoryService,
    documents: DocumentService,
    commissions: CommissionService,
    notifier: Arc<dyn Notifier>,
}

impl ApplicationService {
    pub fn new(
        db_pool: PgPool,
        directory: DirectoryService,
        documents: DocumentService,
        commissions: CommissionService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db_pool,
            directory,
            documents,
            commissions,
            notifier,
        }
    }

    /// Submit a new loan application on behalf of a customer.
    pub async fn submit(
        &self,
        actor: &ActorContext,
        request: SubmitApplicationRequest,
    ) -> WorkflowResult<LoanApplication> {
        actor.require(WorkflowAction::SubmitApplication)?;
        request.validate()?;

        let customer = self
            .directory
            .customer_owned_by(request.customer_id, actor.actor_id)
            .await?;
        let category = self.directory.loan_category(request.loan_category_id).await?;

        if request.requested_amount < category.min_amount
            || request.requested_amount > category.max_amount
        {
            return Err(WorkflowError::Validation(format!(
                "requested amount must be between {} and {} for category '{}'",
                category.min_amount, category.max_amount, category.name
            )));
        }

        let application_number = generate_application_number();

        let mut tx = self.db_pool.begin().await?;

        let application = sqlx::query_as::<_, LoanApplication>(
            r#"
            INSERT INTO loan_applications (
                id, application_number, customer_id, connector_id,
                loan_category_id, requested_amount, remarks
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&application_number)
        .bind(customer.id)
        .bind(actor.actor_id)
        .bind(category.id)
        .bind(request.requested_amount)
        .bind(&request.purpose)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                "application.submitted",
                "loan_application",
                application.id,
                serde_json::json!({
                    "application_number": application.application_number,
                    "customer_id": customer.id,
                    "loan_category_id": category.id,
                    "requested_amount": application.requested_amount,
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            application = %application.application_number,
            connector = %actor.actor_id,
            "application submitted"
        );

        notify::send_best_effort(
            self.notifier.as_ref(),
            "application_submitted",
            &actor.actor_id.to_string(),
            serde_json::json!({ "application_number": application.application_number }),
        )
        .await;

        Ok(application)
    }

    /// Take a submitted application up for document review.
    pub async fn begin_verification(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
    ) -> WorkflowResult<LoanApplication> {
        actor.require(WorkflowAction::BeginVerification)?;

        self.transition(
            actor,
            application_id,
            ApplicationStatus::UnderVerification,
            "application.verification_started",
            None,
        )
        .await
    }

    /// Mark an application verified once its document set is complete.
    pub async fn mark_verified(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
    ) -> WorkflowResult<LoanApplication> {
        actor.require(WorkflowAction::MarkVerified)?;

        let summary = self.documents.summary(application_id).await?;
        if !summary.ready_for_distribution() {
            return Err(WorkflowError::Validation(format!(
                "documents are not ready: {} pending, {} rejected of {}",
                summary.pending, summary.rejected, summary.total
            )));
        }

        self.transition(
            actor,
            application_id,
            ApplicationStatus::Verified,
            "application.verified",
            None,
        )
        .await
    }

    /// Ask the connector for further documents.
    ///
    /// Operators may request on any verified application; bankers only on
    /// applications distributed to their bank.
    pub async fn request_documents(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
        documents: Vec<String>,
    ) -> WorkflowResult<LoanApplication> {
        actor.require(WorkflowAction::RequestDocuments)?;

        if documents.iter().all(|d| d.trim().is_empty()) {
            return Err(WorkflowError::Validation(
                "at least one document must be requested".to_string(),
            ));
        }

        if actor.role == Role::Banker {
            let bank_id = self.directory.bank_for_member(actor.actor_id).await?;
            let assigned = sqlx::query_as::<_, (Uuid,)>(
                "SELECT id FROM application_distributions WHERE application_id = $1 AND bank_id = $2",
            )
            .bind(application_id)
            .bind(bank_id)
            .fetch_optional(&self.db_pool)
            .await?;

            if assigned.is_none() {
                return Err(WorkflowError::NotFound(
                    "application is not assigned to your bank".to_string(),
                ));
            }
        }

        let remarks = format!("Documents requested: {}", documents.join(", "));
        let application = self
            .transition(
                actor,
                application_id,
                ApplicationStatus::DocumentRequested,
                "application.documents_requested",
                Some(remarks),
            )
            .await?;

        notify::send_best_effort(
            self.notifier.as_ref(),
            "documents_requested",
            &application.connector_id.to_string(),
            serde_json::json!({
                "application_number": application.application_number,
                "documents": documents,
            }),
        )
        .await;

        Ok(application)
    }

    /// Reject an application before approval. Terminal.
    pub async fn reject(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
        remarks: Option<String>,
    ) -> WorkflowResult<LoanApplication> {
        actor.require(WorkflowAction::RejectApplication)?;

        let application = self
            .transition(
                actor,
                application_id,
                ApplicationStatus::Rejected,
                "application.rejected",
                remarks,
            )
            .await?;

        notify::send_best_effort(
            self.notifier.as_ref(),
            "application_rejected",
            &application.connector_id.to_string(),
            serde_json::json!({
                "application_number": application.application_number,
                "remarks": application.remarks,
            }),
        )
        .await;

        Ok(application)
    }

    /// Record the disbursal of an approved loan.
    ///
    /// Bankers may disburse only through the bank holding the selected
    /// offer. Accrues the connector's commission if a crash lost the
    /// approval-time accrual.
    pub async fn disburse(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
        request: DisburseRequest,
    ) -> WorkflowResult<LoanApplication> {
        actor.require(WorkflowAction::Disburse)?;

        if request.amount <= Decimal::ZERO {
            return Err(WorkflowError::Validation(
                "disbursed amount must be positive".to_string(),
            ));
        }

        let mut tx = self.db_pool.begin().await?;

        let application = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("application not found".to_string()))?;

        application
            .status
            .ensure_transition_to(ApplicationStatus::Disbursed)?;

        let approved_amount = application.approved_amount.ok_or_else(|| {
            WorkflowError::Conflict("application has no approved amount".to_string())
        })?;
        if request.amount > approved_amount {
            return Err(WorkflowError::Validation(format!(
                "disbursed amount {} exceeds approved amount {}",
                request.amount, approved_amount
            )));
        }

        if actor.role == Role::Banker {
            let bank_id = self.directory.bank_for_member(actor.actor_id).await?;
            let selected_offer_id = application.selected_offer_id.ok_or_else(|| {
                WorkflowError::Conflict("application has no selected offer".to_string())
            })?;

            let offer = sqlx::query_as::<_, LoanOffer>(
                "SELECT * FROM loan_offers WHERE id = $1",
            )
            .bind(selected_offer_id)
            .fetch_one(&mut *tx)
            .await?;

            if offer.bank_id != bank_id {
                return Err(WorkflowError::AccessDenied(
                    "only the bank holding the selected offer may disburse".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let disbursed = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET disbursed_amount = $1, status = 'disbursed', disbursed_at = $2, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(request.amount)
        .bind(now)
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        let category_percent = sqlx::query_as::<_, (Option<Decimal>,)>(
            "SELECT commission_percent FROM loan_categories WHERE id = $1",
        )
        .bind(disbursed.loan_category_id)
        .fetch_one(&mut *tx)
        .await?
        .0;

        // No-op when the approval already accrued it.
        self.commissions
            .accrue_in_tx(&mut tx, actor, &disbursed, category_percent)
            .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                "application.disbursed",
                "loan_application",
                application_id,
                serde_json::json!({
                    "before": { "status": application.status },
                    "after": {
                        "status": disbursed.status,
                        "disbursed_amount": disbursed.disbursed_amount,
                    },
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            application = %disbursed.application_number,
            amount = %request.amount,
            "loan disbursed"
        );

        notify::send_best_effort(
            self.notifier.as_ref(),
            "loan_disbursed",
            &disbursed.connector_id.to_string(),
            serde_json::json!({
                "application_number": disbursed.application_number,
                "disbursed_amount": disbursed.disbursed_amount,
            }),
        )
        .await;

        Ok(disbursed)
    }

    /// Get application by id
    pub async fn get_application(&self, id: Uuid) -> WorkflowResult<LoanApplication> {
        let application = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("application not found".to_string()))?;

        Ok(application)
    }

    /// List applications with filtering and pagination
    pub async fn list_applications(
        &self,
        query: ApplicationListQuery,
    ) -> WorkflowResult<Vec<LoanApplication>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM loan_applications WHERE 1=1");

        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }
        if let Some(connector_id) = query.connector_id {
            query_builder.push(" AND connector_id = ");
            query_builder.push_bind(connector_id);
        }

        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(limit as i64);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset as i64);

        let applications = query_builder
            .build_query_as::<LoanApplication>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(applications)
    }

    /// Shared single-status transition: lock, check legality, update, audit.
    async fn transition(
        &self,
        actor: &ActorContext,
        application_id: Uuid,
        next: ApplicationStatus,
        action: &'static str,
        remarks: Option<String>,
    ) -> WorkflowResult<LoanApplication> {
        let mut tx = self.db_pool.begin().await?;

        let application = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("application not found".to_string()))?;

        application.status.ensure_transition_to(next)?;

        let updated = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET status = $1, remarks = COALESCE($2, remarks), updated_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(next)
        .bind(&remarks)
        .bind(Utc::now())
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                action,
                "loan_application",
                application_id,
                serde_json::json!({
                    "before": { "status": application.status },
                    "after": { "status": updated.status, "remarks": updated.remarks },
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        Ok(updated)
    }
}
