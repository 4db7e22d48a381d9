// ============================================================================
// RESPONSE CACHE MIDDLEWARE
// ============================================================================
// Wraps report routes: serves identical requests from the shared store and
// writes successful responses back. Every cache-layer failure falls through
// to the wrapped handler.

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::headers::{read_request_state, write_response_state};
use crate::cache::{CacheErrorReason, CacheStatus, CacheStore, PutOutcome};
use crate::cache_key::CacheKeyContext;
use crate::identity::IdentityResolver;
use crate::middleware::{CurrentUser, RequestTransaction};
use crate::observability::{record_cache_error, record_cache_lookup, record_cache_write, LookupResult};

/// Largest response body buffered for write-back.
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub struct ResponseCache {
    store: CacheStore,
    resolver: Arc<dyn IdentityResolver>,
    ttl: Duration,
    enabled: bool,
    max_body_bytes: usize,
}

impl ResponseCache {
    pub fn new(store: CacheStore, resolver: Arc<dyn IdentityResolver>, ttl: Duration) -> Self {
        Self {
            store,
            resolver,
            ttl,
            enabled: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// A disabled cache passes every request straight to the handler.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Bodies that may exceed `limit` bytes are passed through unbuffered.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

pub async fn response_cache_middleware(
    State(cache): State<Arc<ResponseCache>>,
    req: Request,
    next: Next,
) -> Response {
    if !cache.enabled {
        return next.run(req).await;
    }

    let route = req.uri().path().to_string();

    let has_transaction = req.extensions().get::<RequestTransaction>().is_some();
    let user = match req.extensions().get::<CurrentUser>().cloned() {
        Some(user) if has_transaction => user,
        _ => {
            warn!(route = %route, "Cache bypassed: authenticated user or transaction missing");
            record_cache_error("preflight");
            return bypass(&route, next.run(req).await, CacheErrorReason::UnableGetBasicsInfos);
        }
    };

    let raw_query = req.uri().query().map(str::to_string);
    let identities = match cache.resolver.resolve(&user, raw_query.as_deref()).await {
        Ok(identities) => identities,
        Err(e) => {
            warn!(route = %route, user_id = user.user_id, "Cache bypassed: identity resolution failed: {}", e);
            record_cache_error("identities");
            return bypass(&route, next.run(req).await, CacheErrorReason::UnableResolveIdentities);
        }
    };
    let ctx = CacheKeyContext::new(&route, raw_query.as_deref().unwrap_or(""), &identities);

    match read_request_state(req.headers()) {
        Some(CacheStatus::Delete) => {
            let removed = cache.store.delete(&ctx.key).await;
            info!(route = %route, key = %ctx.key, removed, "Client requested cache invalidation");
        }
        Some(other) => {
            debug!(route = %route, state = ?other, "Ignoring inbound Cache-Status");
        }
        None => {}
    }

    if cache.store.exists(&ctx.key).await {
        match cache.store.get(&ctx.key).await {
            Some(value) => {
                debug!(route = %route, key = %ctx.key, "Response cache hit");
                record_cache_lookup(&route, LookupResult::Hit);
                return cached_response(&value);
            }
            None => {
                warn!(route = %route, key = %ctx.key, "Cache entry vanished between exists and get");
                cache.store.delete(&ctx.key).await;
            }
        }
    }

    record_cache_lookup(&route, LookupResult::Miss);
    let response = next.run(req).await;

    if response.status() != StatusCode::OK {
        debug!(route = %route, status = %response.status(), "Not caching non-200 response");
        return response;
    }

    // Unknown or oversized bodies stream straight through.
    let within_limit = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= cache.max_body_bytes as u64);
    if !within_limit {
        debug!(route = %route, limit = cache.max_body_bytes, "Response body too large or unsized, not caching");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, cache.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(route = %route, "Failed to buffer response body: {}", e);
            record_cache_error("body");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let value = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(route = %route, "Response body is not JSON, skipping cache: {}", e);
            record_cache_error("serialize");
            let mut response = Response::from_parts(parts, Body::from(bytes));
            write_response_state(
                response.headers_mut(),
                CacheStatus::Error,
                Some(CacheErrorReason::UnableSerializeBody),
            );
            return response;
        }
    };

    let outcome = cache.store.put(&ctx.key, &value, cache.ttl).await;
    let mut response = Response::from_parts(parts, Body::from(bytes));
    match outcome {
        PutOutcome::Created => {
            record_cache_write("created");
            write_response_state(response.headers_mut(), CacheStatus::Created, None);
        }
        PutOutcome::AlreadyExists => {
            record_cache_write("exists");
            write_response_state(response.headers_mut(), CacheStatus::Created, None);
        }
        PutOutcome::Failed => record_cache_write("failed"),
    }
    response
}

fn bypass(route: &str, mut response: Response, reason: CacheErrorReason) -> Response {
    record_cache_lookup(route, LookupResult::Bypass);
    write_response_state(response.headers_mut(), CacheStatus::Error, Some(reason));
    response
}

fn cached_response(value: &Value) -> Response {
    let body = serde_json::to_vec(value).unwrap_or_default();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    write_response_state(response.headers_mut(), CacheStatus::Used, None);
    response
}
