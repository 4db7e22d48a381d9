//! AWS identities in scope for a request.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::warn;

use crate::middleware::CurrentUser;

/// Query parameter carrying an explicit, comma-separated identity subset.
pub const ACCOUNTS_PARAM: &str = "accounts";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<IdentityError> for shared::AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Database(e) => shared::AppError::Database(e),
        }
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Identities for `user`. An explicit subset in `raw_query` narrows the
    /// result but never adds identities the user cannot see.
    async fn resolve(&self, user: &CurrentUser, raw_query: Option<&str>) -> Result<Vec<String>, IdentityError>;
}

/// Parse the explicit `accounts` subset, if the query carries one.
pub fn requested_identities(raw_query: Option<&str>) -> Option<Vec<String>> {
    let query = raw_query?;
    let mut requested: Option<Vec<String>> = None;

    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if name != ACCOUNTS_PARAM {
            continue;
        }
        let list = requested.get_or_insert_with(Vec::new);
        list.extend(
            value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        );
    }

    requested.filter(|ids| !ids.is_empty())
}

/// Narrow `allowed` to the explicit subset in `raw_query`, if any.
/// Requested identities outside `allowed` are dropped.
pub fn scope_identities(allowed: Vec<String>, raw_query: Option<&str>) -> Vec<String> {
    let Some(requested) = requested_identities(raw_query) else {
        return allowed;
    };
    let allowed: BTreeSet<String> = allowed.into_iter().collect();
    let mut scoped: Vec<String> = Vec::with_capacity(requested.len());
    for id in requested {
        if !allowed.contains(&id) {
            warn!(identity = %id, "Requested identity is not accessible, dropping it");
            continue;
        }
        if !scoped.contains(&id) {
            scoped.push(id);
        }
    }
    scoped
}

const USER_IDENTITIES_SQL: &str = r#"
    SELECT a.aws_identity
      FROM aws_account a
     WHERE a.user_id = $1
    UNION
    SELECT a.aws_identity
      FROM aws_account a
      JOIN shared_account s ON s.account_id = a.id
     WHERE s.user_id = $1
       AND s.account_status
"#;

/// Owned and shared-with accounts looked up in Postgres.
#[derive(Clone)]
pub struct PgIdentityResolver {
    pool: PgPool,
}

impl PgIdentityResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityResolver for PgIdentityResolver {
    async fn resolve(&self, user: &CurrentUser, raw_query: Option<&str>) -> Result<Vec<String>, IdentityError> {
        let rows: Vec<String> = sqlx::query_scalar(USER_IDENTITIES_SQL)
            .bind(user.user_id)
            .fetch_all(&self.pool)
            .await?;

        let allowed: Vec<String> = rows.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        Ok(scope_identities(allowed, raw_query))
    }
}

/// Fixed identity list per resolver. Used by tests and local runs.
#[derive(Clone, Default)]
pub struct StaticIdentityResolver {
    identities: Vec<String>,
}

impl StaticIdentityResolver {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identities: identities.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, _user: &CurrentUser, raw_query: Option<&str>) -> Result<Vec<String>, IdentityError> {
        Ok(scope_identities(self.identities.clone(), raw_query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_subset_is_parsed() {
        assert_eq!(
            requested_identities(Some("begin=2024-01&accounts=123,456")),
            Some(vec!["123".to_string(), "456".to_string()])
        );
        assert_eq!(
            requested_identities(Some("accounts=123%2C789&accounts=456")),
            Some(vec!["123".to_string(), "789".to_string(), "456".to_string()])
        );
    }

    #[test]
    fn missing_or_empty_subset_is_none() {
        assert_eq!(requested_identities(None), None);
        assert_eq!(requested_identities(Some("begin=2024-01")), None);
        assert_eq!(requested_identities(Some("accounts=")), None);
        assert_eq!(requested_identities(Some("accounts=,,")), None);
    }

    #[tokio::test]
    async fn static_resolver_prefers_explicit_subset() {
        let resolver = StaticIdentityResolver::new(["111", "222"]);
        let user = CurrentUser {
            user_id: 1,
            email: "ops@example.com".into(),
        };
        assert_eq!(
            resolver.resolve(&user, None).await.unwrap(),
            vec!["111".to_string(), "222".to_string()]
        );
        assert_eq!(
            resolver.resolve(&user, Some("accounts=222")).await.unwrap(),
            vec!["222".to_string()]
        );
    }

    #[test]
    fn foreign_identities_are_dropped_from_subset() {
        let allowed = vec!["111".to_string(), "222".to_string()];
        assert_eq!(
            scope_identities(allowed.clone(), Some("accounts=999,222,222")),
            vec!["222".to_string()]
        );
        assert!(scope_identities(allowed.clone(), Some("accounts=999")).is_empty());
        assert_eq!(scope_identities(allowed.clone(), None), allowed);
    }

    #[tokio::test]
    async fn static_resolver_rejects_foreign_subset() {
        let resolver = StaticIdentityResolver::new(["111", "222"]);
        let user = CurrentUser {
            user_id: 1,
            email: "ops@example.com".into(),
        };
        assert!(resolver
            .resolve(&user, Some("accounts=999999999999"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn pg_resolver_checks_ownership_before_honoring_subset() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:9/none")
            .unwrap();
        let resolver = PgIdentityResolver::new(pool);
        let user = CurrentUser {
            user_id: 42,
            email: "ops@example.com".into(),
        };
        // The subset cannot be answered without looking up the user's accounts.
        assert!(resolver
            .resolve(&user, Some("accounts=999999999999"))
            .await
            .is_err());
    }
}
