use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::{predicate::SizeAbove, CompressionLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cache;
pub mod cache_key;
pub mod identity;
pub mod middleware;
pub mod observability;
pub mod state;

use api::{health_check, invalidate_cache, report_router};
use middleware::{require_auth, response_cache_middleware, ResponseCache};
use observability::{metrics_handler, metrics_middleware};
use state::AppState;

/// Wrap every route currently in `router` with the response cache.
/// Routes added afterwards are not cached.
pub fn with_response_cache<S>(router: Router<S>, cache: Arc<ResponseCache>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(axum_middleware::from_fn_with_state(cache, response_cache_middleware))
}

pub fn create_app_router(app_state: AppState) -> Router {
    // Reportes cacheados; auth corre antes que el cache
    let protected = with_response_cache(report_router(), app_state.response_cache.clone())
        .route("/cache/invalidate", post(invalidate_cache))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.jwt_keys.clone(),
            require_auth,
        ));

    Router::new()
        // Endpoints de monitoreo (sin autenticación)
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(protected)
        .with_state(app_state)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(
            CompressionLayer::new()
                .gzip(true)
                .deflate(true)
                .compress_when(SizeAbove::new(1024)),
        )
        .layer(TraceLayer::new_for_http())
}
