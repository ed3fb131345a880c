// handlers/health.rs - GET /health handler

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use super::AppState;
use crate::database::manager::DatabaseManager;

/**
 * GET /health - Liveness plus a database ping
 *
 * @returns 200 when the pool answers `SELECT 1`, 503 otherwise
 */
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let now = state.clock.now();

    match DatabaseManager::health_check(state.store.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
