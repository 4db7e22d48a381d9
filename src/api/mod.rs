pub mod cache_admin;
pub mod health;
pub mod reports;

use axum::{routing::get, Router};

use crate::state::AppState;

pub use cache_admin::{invalidate_cache, InvalidateRequest};
pub use health::health_check;
pub use reports::get_report;

/// Usage report endpoints served through the response cache.
pub const REPORT_ROUTES: &[&str] = &["/ebs", "/ec2", "/elasticache", "/es", "/lambda", "/rds", "/s3"];

/// One GET route per report type, all backed by [`get_report`].
pub fn report_router() -> Router<AppState> {
    REPORT_ROUTES
        .iter()
        .fold(Router::new(), |router, path| router.route(path, get(get_report)))
}
