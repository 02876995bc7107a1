//! Audit log entities

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Append-only audit entry; the sole durable record of who did what, when.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemLog {
    pub id: i64,
    pub actor_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub source_addr: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry to be appended; id and timestamp are assigned by the store.
#[derive(Debug)]
pub struct AuditEntry {
    pub actor_id: Uuid,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub source_addr: Option<String>,
}
