//! Directory entities referenced by the workflow
//!
//! These rows are seeded by the onboarding layer; the workflow only reads
//! them for ownership checks and policy bounds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Bank participating in the marketplace
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Bank {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Customer originated by a connector
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Customer {
    pub id: Uuid,
    pub connector_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Loan product category with policy bounds
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LoanCategory {
    pub id: Uuid,
    pub name: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    /// Falls back to the configured default when absent
    pub commission_percent: Option<Decimal>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Required document kind (PAN card, bank statement, ...)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct DocumentType {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
