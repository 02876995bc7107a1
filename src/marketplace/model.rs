//! Distribution and offer entities

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::application::{ApplicationStatus, LoanApplication};
use crate::commission::CommissionRecord;

/// Per-bank distribution state
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "distribution_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Sent,
    Viewed,
    Responded,
}

/// Record that an application was sent to a specific bank for bidding.
/// Unique per (application, bank); never deleted.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ApplicationDistribution {
    pub id: Uuid,
    pub application_id: Uuid,
    pub bank_id: Uuid,
    pub status: DistributionStatus,
    /// Advisory deadline surfaced to UIs; nothing expires it
    pub response_due_date: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Offer lifecycle
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "offer_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Selected,
    Rejected,
}

/// A bank's proposed loan terms. Immutable once selected or rejected.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LoanOffer {
    pub id: Uuid,
    pub application_id: Uuid,
    pub bank_id: Uuid,
    pub banker_id: Uuid,
    pub offered_amount: Decimal,
    pub interest_rate: Decimal,
    pub tenure_months: i32,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to distribute an application to a set of banks
#[derive(Debug, Deserialize, Validate)]
pub struct DistributeRequest {
    pub application_id: Uuid,
    #[validate(length(min = 1, message = "bank list must not be empty"))]
    pub bank_ids: Vec<Uuid>,
    /// Overrides the configured response window
    pub due_hours: Option<i64>,
}

/// Outcome of a distribution batch
#[derive(Debug, Serialize)]
pub struct DistributionBatchResult {
    pub application_id: Uuid,
    pub distributed: Vec<ApplicationDistribution>,
    /// Banks that already held a distribution row; no duplicates created
    pub skipped_existing: Vec<Uuid>,
    pub response_due_date: DateTime<Utc>,
}

/// A banker's proposed terms for an application
#[derive(Debug, Deserialize, Validate)]
pub struct OfferRequest {
    pub offered_amount: Decimal,
    pub interest_rate: Decimal,
    #[validate(range(min = 1, max = 600))]
    pub tenure_months: i32,
}

/// Outcome of selecting the winning offer
#[derive(Debug, Serialize)]
pub struct ApprovalResult {
    pub application: LoanApplication,
    pub selected_offer: LoanOffer,
    /// Sibling offers flipped to rejected in the same transaction
    pub rejected_offer_ids: Vec<Uuid>,
    pub commission: CommissionRecord,
}

/// Banker inbox row: a distribution joined with its application
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssignedApplication {
    pub distribution_id: Uuid,
    pub application_id: Uuid,
    pub application_number: String,
    pub requested_amount: Decimal,
    pub application_status: ApplicationStatus,
    pub distribution_status: DistributionStatus,
    pub response_due_date: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
}
