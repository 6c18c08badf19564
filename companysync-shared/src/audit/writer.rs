/// Audit log writer
///
/// [`record`] is the raw append and propagates errors. Request handlers use
/// [`record_or_warn`], which isolates the insert in a savepoint so a failed
/// audit write cannot abort the transaction carrying the mutation.

use serde_json::Value;
use sqlx::{Connection, PgConnection, PgExecutor};
use tracing::{debug, warn};

use super::AuditAction;

/// Appends one entry to the audit log
///
/// `actor_id` is `None` for system actions. Metadata is stored as the exact
/// JSON text it serializes to.
///
/// # Returns
///
/// The id of the new entry
pub async fn record(
    executor: impl PgExecutor<'_>,
    actor_id: Option<i64>,
    action: AuditAction,
    metadata: &Value,
) -> Result<i64, sqlx::Error> {
    let metadata_text = metadata.to_string();

    sqlx::query_scalar(
        r#"
        INSERT INTO logs (actor_id, action, metadata)
        VALUES ($1, $2, $3::json)
        RETURNING id
        "#,
    )
    .bind(actor_id)
    .bind(action.as_str())
    .bind(metadata_text)
    .fetch_one(executor)
    .await
}

/// Appends an entry on `conn` without ever failing the caller
///
/// Runs the insert inside a savepoint. On failure the savepoint is rolled
/// back, the error is logged at `warn`, and the enclosing transaction stays
/// usable.
pub async fn record_or_warn(
    conn: &mut PgConnection,
    actor_id: Option<i64>,
    action: AuditAction,
    metadata: Value,
) {
    let mut savepoint = match conn.begin().await {
        Ok(savepoint) => savepoint,
        Err(e) => {
            warn!(action = action.as_str(), actor_id, error = %e, "Audit log write failed");
            return;
        }
    };

    match record(&mut *savepoint, actor_id, action, &metadata).await {
        Ok(id) => {
            if let Err(e) = savepoint.commit().await {
                warn!(action = action.as_str(), actor_id, error = %e, "Audit log write failed");
            } else {
                debug!(log_id = id, action = action.as_str(), actor_id, "Audit entry recorded");
            }
        }
        Err(e) => {
            warn!(action = action.as_str(), actor_id, error = %e, "Audit log write failed");
            if let Err(e) = savepoint.rollback().await {
                warn!(error = %e, "Failed to roll back audit savepoint");
            }
        }
    }
}
