use axum::{extract::State, Json};
use serde::Serialize;
use tracing::debug;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// GET /health. The service stays up when the cache is down, so this reports degraded.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache_up = match state.cache_backend.ping().await {
        Ok(()) => true,
        Err(e) => {
            debug!("Cache ping failed: {}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if cache_up { "ok" } else { "degraded" },
        cache: if cache_up { "up" } else { "down" },
        timestamp: chrono::Utc::now(),
    })
}
