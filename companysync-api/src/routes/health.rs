/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// { "status": "healthy", "version": "0.1.0", "database": "connected" }
/// ```
///
/// Always answers 200; a failed database ping reports `degraded`.

use crate::app::AppState;
use axum::{extract::State, Json};
use companysync_shared::db::pool::health_check as ping_database;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

impl HealthResponse {
    fn new(database_ok: bool) -> Self {
        let (status, database) = if database_ok {
            ("healthy", "connected")
        } else {
            ("degraded", "disconnected")
        };

        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_ok = match ping_database(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            false
        }
    };

    Json(HealthResponse::new(database_ok))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_states() {
        let ok = HealthResponse::new(true);
        assert_eq!(ok.status, "healthy");
        assert_eq!(ok.database, "connected");

        let degraded = HealthResponse::new(false);
        assert_eq!(degraded.status, "degraded");
        assert_eq!(degraded.database, "disconnected");
    }
}
