//! Append-only audit log
//!
//! Every state-changing transition appends exactly one entry; batch
//! transitions append one summarizing entry. The insert runs on the caller's
//! transaction so the entry commits atomically with the transition it
//! describes.

mod model;

pub use model::{AuditEntry, SystemLog};

use sqlx::PgPool;

use crate::actor::ActorContext;
use crate::error::WorkflowResult;

/// Append an audit entry through the given executor (usually an open
/// transaction).
pub async fn record<'e, E>(executor: E, entry: AuditEntry) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO system_logs (actor_id, action, entity_type, entity_id, payload, source_addr)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.actor_id)
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.payload)
    .bind(&entry.source_addr)
    .execute(executor)
    .await?;

    Ok(())
}

impl AuditEntry {
    /// Build an entry attributed to the acting caller.
    pub fn new(
        actor: &ActorContext,
        action: &'static str,
        entity_type: &'static str,
        entity_id: impl ToString,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            actor_id: actor.actor_id,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            payload,
            source_addr: actor.source_addr.clone(),
        }
    }
}

/// Recent audit entries for one entity, newest first.
pub async fn recent_for_entity(
    pool: &PgPool,
    entity_type: &str,
    entity_id: &str,
    limit: i64,
) -> WorkflowResult<Vec<SystemLog>> {
    let logs = sqlx::query_as::<_, SystemLog>(
        r#"
        SELECT * FROM system_logs
        WHERE entity_type = $1 AND entity_id = $2
        ORDER BY id DESC
        LIMIT $3
        "#,
    )
    .bind(entity_type)
    .bind(entity_id)
    .bind(limit.clamp(1, 200))
    .fetch_all(pool)
    .await?;

    Ok(logs)
}
