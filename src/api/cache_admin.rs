use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Deserialize;
use shared::AppError;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::cache::InvalidationSummary;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub routes: Vec<String>,
    #[serde(default)]
    pub identities: Option<Vec<String>>,
}

/// POST /cache/invalidate: drop cached reports for routes and the caller's identities.
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<InvalidateRequest>,
) -> Result<Json<InvalidationSummary>, AppError> {
    let routes: Vec<String> = request
        .routes
        .iter()
        .map(|route| route.trim())
        .filter(|route| !route.is_empty())
        .map(|route| {
            if route.starts_with('/') {
                route.to_string()
            } else {
                format!("/{}", route)
            }
        })
        .collect();

    if routes.is_empty() {
        return Err(AppError::validation("At least one route is required"));
    }

    let allowed = state.identity_resolver.resolve(&user, None).await?;
    let identities: Vec<String> = match request.identities {
        Some(requested) => {
            let requested: HashSet<String> = requested.into_iter().collect();
            allowed.into_iter().filter(|id| requested.contains(id)).collect()
        }
        None => allowed,
    };

    let summary = state
        .invalidator
        .invalidate(&routes, &identities)
        .await
        .map_err(|e| {
            warn!(user_id = user.user_id, "Cache invalidation aborted: {}", e);
            AppError::service_unavailable("cache")
        })?;

    info!(
        user_id = user.user_id,
        routes = routes.len(),
        identities = identities.len(),
        deleted = summary.deleted,
        "Cache invalidation requested"
    );

    Ok(Json(summary))
}
