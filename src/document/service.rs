//! Document verification gate - business logic for document lifecycle

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::actor::{ActorContext, Role, WorkflowAction};
use crate::application::LoanApplication;
use crate::audit::{self, AuditEntry};
use crate::directory::DirectoryService;
use crate::document::model::{
    AttachDocumentRequest, CustomerDocument, DocumentSummary, VerificationStatus,
};
use crate::error::{WorkflowError, WorkflowResult};

/// Document service for upload references and verification
#[derive(Clone)]
pub struct DocumentService {
    db_pool: PgPool,
    directory: DirectoryService,
}

impl DocumentService {
    pub fn new(db_pool: PgPool, directory: DirectoryService) -> Self {
        Self { db_pool, directory }
    }

    /// Record a document uploaded through the file-storage collaborator.
    ///
    /// The `stored_path` is the stable reference the collaborator returned;
    /// the workflow never handles raw bytes.
    pub async fn attach(
        &self,
        actor: &ActorContext,
        request: AttachDocumentRequest,
    ) -> WorkflowResult<CustomerDocument> {
        actor.require(WorkflowAction::AttachDocument)?;
        request.validate()?;

        self.directory.document_type(request.document_type_id).await?;

        let mut tx = self.db_pool.begin().await?;

        let application = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(request.application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("application not found".to_string()))?;

        if actor.role == Role::Connector && application.connector_id != actor.actor_id {
            return Err(WorkflowError::AccessDenied(
                "application belongs to another connector".to_string(),
            ));
        }
        if !application.status.is_pre_approval() {
            return Err(WorkflowError::Conflict(format!(
                "documents cannot be added to a {:?} application",
                application.status
            )));
        }

        let document = sqlx::query_as::<_, CustomerDocument>(
            r#"
            INSERT INTO customer_documents (id, application_id, document_type_id, stored_path)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.application_id)
        .bind(request.document_type_id)
        .bind(&request.stored_path)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                "document.attached",
                "customer_document",
                document.id,
                serde_json::json!({
                    "application_id": document.application_id,
                    "document_type_id": document.document_type_id,
                    "stored_path": document.stored_path,
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        Ok(document)
    }

    /// Verify or reject a pending document.
    ///
    /// Stamps the verifier and timestamp. Does not touch the parent
    /// application; the workflow aggregates document states separately.
    pub async fn verify(
        &self,
        actor: &ActorContext,
        document_id: Uuid,
        status: VerificationStatus,
        rejection_reason: Option<String>,
    ) -> WorkflowResult<CustomerDocument> {
        actor.require(WorkflowAction::VerifyDocument)?;

        match status {
            VerificationStatus::Pending => {
                return Err(WorkflowError::Validation(
                    "verification status must be verified or rejected".to_string(),
                ));
            }
            VerificationStatus::Rejected => {
                if rejection_reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
                    return Err(WorkflowError::Validation(
                        "a rejection reason is required when rejecting a document".to_string(),
                    ));
                }
            }
            VerificationStatus::Verified => {
                if rejection_reason.is_some() {
                    return Err(WorkflowError::Validation(
                        "a rejection reason is only allowed when rejecting".to_string(),
                    ));
                }
            }
        }

        let mut tx = self.db_pool.begin().await?;

        let document = sqlx::query_as::<_, CustomerDocument>(
            "SELECT * FROM customer_documents WHERE id = $1 FOR UPDATE",
        )
        .bind(document_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| WorkflowError::NotFound("document not found".to_string()))?;

        // Verified and rejected rows are immutable; a fresh upload creates a
        // new version of the document instead.
        if document.verification_status != VerificationStatus::Pending {
            return Err(WorkflowError::Conflict(format!(
                "document has already been {:?}",
                document.verification_status
            )));
        }

        let updated = sqlx::query_as::<_, CustomerDocument>(
            r#"
            UPDATE customer_documents
            SET verification_status = $1, verified_by = $2, verified_at = $3, rejection_reason = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(actor.actor_id)
        .bind(Utc::now())
        .bind(&rejection_reason)
        .bind(document_id)
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            AuditEntry::new(
                actor,
                "document.verified",
                "customer_document",
                document_id,
                serde_json::json!({
                    "before": { "verification_status": document.verification_status },
                    "after": {
                        "verification_status": updated.verification_status,
                        "rejection_reason": updated.rejection_reason,
                    },
                }),
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            document_id = %document_id,
            status = ?updated.verification_status,
            "document verification recorded"
        );

        Ok(updated)
    }

    /// Aggregate the latest version of each document type on an application.
    pub async fn summary(&self, application_id: Uuid) -> WorkflowResult<DocumentSummary> {
        let summary = sqlx::query_as::<_, DocumentSummary>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE verification_status = 'verified') AS verified,
                COUNT(*) FILTER (WHERE verification_status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE verification_status = 'rejected') AS rejected
            FROM (
                SELECT DISTINCT ON (document_type_id) verification_status
                FROM customer_documents
                WHERE application_id = $1
                ORDER BY document_type_id, created_at DESC
            ) latest
            "#,
        )
        .bind(application_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(summary)
    }

    /// List every document version on an application, newest first.
    pub async fn list_for_application(
        &self,
        application_id: Uuid,
    ) -> WorkflowResult<Vec<CustomerDocument>> {
        let documents = sqlx::query_as::<_, CustomerDocument>(
            r#"
            SELECT * FROM customer_documents
            WHERE application_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(documents)
    }
}
