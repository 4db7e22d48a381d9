use axum::{
    extract::{Extension, State},
    http::Uri,
    Json,
};
use serde_json::{Map, Value};
use shared::AppError;
use tracing::{debug, warn};

use crate::middleware::CurrentUser;
use crate::state::AppState;

const LATEST_REPORTS_SQL: &str = r#"
    SELECT DISTINCT ON (aws_identity) aws_identity, document::text
      FROM usage_report
     WHERE report_type = $1
       AND aws_identity = ANY($2)
     ORDER BY aws_identity, generated_at DESC
"#;

/// GET /<report>: newest stored document per identity, keyed by identity.
pub async fn get_report(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    uri: Uri,
) -> Result<Json<Value>, AppError> {
    let report_type = uri.path().trim_start_matches('/');
    let identities = state.identity_resolver.resolve(&user, uri.query()).await?;

    if identities.is_empty() {
        debug!(user_id = user.user_id, report_type, "No identities in scope");
        return Err(AppError::not_found(format!("{} report", report_type)));
    }

    let rows: Vec<(String, String)> = sqlx::query_as(LATEST_REPORTS_SQL)
        .bind(report_type)
        .bind(&identities)
        .fetch_all(&state.db_pool)
        .await?;

    if rows.is_empty() {
        return Err(AppError::not_found(format!("{} report", report_type)));
    }

    let mut reports = Map::with_capacity(rows.len());
    for (identity, document) in rows {
        let document: Value = serde_json::from_str(&document).map_err(|e| {
            warn!(identity = %identity, report_type, "Stored report is not valid JSON: {}", e);
            AppError::internal("Stored report could not be decoded")
        })?;
        reports.insert(identity, document);
    }

    Ok(Json(Value::Object(reports)))
}
