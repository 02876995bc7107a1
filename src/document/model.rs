//! Customer document entities

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Per-document verification state
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "verification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

/// Uploaded document reference. Verified and rejected rows are immutable;
/// a re-submission inserts a new row for the same document type.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct CustomerDocument {
    pub id: Uuid,
    pub application_id: Uuid,
    pub document_type_id: Uuid,
    /// Reference returned by the file-storage collaborator; never raw bytes
    pub stored_path: String,
    pub verification_status: VerificationStatus,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to record an uploaded document
#[derive(Debug, Deserialize, Validate)]
pub struct AttachDocumentRequest {
    pub application_id: Uuid,
    pub document_type_id: Uuid,
    #[validate(length(min = 1, max = 512))]
    pub stored_path: String,
}

/// Aggregate over the latest version of each document type on an application
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSummary {
    pub total: i64,
    pub verified: i64,
    pub pending: i64,
    pub rejected: i64,
}

impl DocumentSummary {
    /// Readiness for distribution: at least one document, none outstanding.
    pub fn ready_for_distribution(&self) -> bool {
        self.total > 0 && self.pending == 0 && self.rejected == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_requires_documents() {
        let empty = DocumentSummary {
            total: 0,
            verified: 0,
            pending: 0,
            rejected: 0,
        };
        assert!(!empty.ready_for_distribution());
    }

    #[test]
    fn test_readiness_rejects_outstanding_documents() {
        let pending = DocumentSummary {
            total: 3,
            verified: 2,
            pending: 1,
            rejected: 0,
        };
        assert!(!pending.ready_for_distribution());

        let rejected = DocumentSummary {
            total: 3,
            verified: 2,
            pending: 0,
            rejected: 1,
        };
        assert!(!rejected.ready_for_distribution());

        let ready = DocumentSummary {
            total: 3,
            verified: 3,
            pending: 0,
            rejected: 0,
        };
        assert!(ready.ready_for_distribution());
    }
}
