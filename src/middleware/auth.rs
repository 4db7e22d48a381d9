use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::AppError;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// JWT Claims structure matching the token payload
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String, // user_id as string
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
    pub email: String,
}

/// Request-scoped transaction marker, inserted next to [`CurrentUser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTransaction {
    pub id: Uuid,
}

impl RequestTransaction {
    pub fn begin() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

pub const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Clone)]
pub struct JwtKeys {
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub fn verify_jwt_token(token: &str, keys: &JwtKeys) -> Result<JwtClaims, AppError> {
    let validation = Validation::new(JWT_ALGORITHM);
    let data = decode::<JwtClaims>(token, &keys.decoding, &validation)?;
    Ok(data.claims)
}

/// Validate the Bearer token and attach [`CurrentUser`] and [`RequestTransaction`].
pub async fn require_auth(
    State(keys): State<Arc<JwtKeys>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            warn!("Missing or malformed Authorization header");
            AppError::authentication("Authentication required. Please provide a valid Bearer token.")
        })?;

    let claims = verify_jwt_token(token, &keys)?;
    let user_id = claims.sub.parse::<i64>().map_err(|_| {
        warn!("Invalid user_id in JWT sub field: {}", claims.sub);
        AppError::authentication("Invalid user ID format")
    })?;

    let transaction = RequestTransaction::begin();
    debug!(user_id, transaction = %transaction.id, "Request authenticated");

    request.extensions_mut().insert(CurrentUser {
        user_id,
        email: claims.email,
    });
    request.extensions_mut().insert(transaction);

    Ok(next.run(request).await)
}
