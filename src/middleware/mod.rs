pub mod auth;
pub mod response_cache;

pub use auth::{require_auth, verify_jwt_token, CurrentUser, JwtClaims, JwtKeys, RequestTransaction};
pub use response_cache::{response_cache_middleware, ResponseCache};
