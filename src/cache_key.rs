//! Cache key generation utilities
//!
//! Keys have the shape `<route-hash>-<args-hash>-<identity>-<identity>-...-`.
//! The bulk invalidator relies on that exact separator layout, so both sides
//! go through this module.

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a key segment.
const DIGEST_BYTES: usize = 16;

/// Per-request key material. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyContext {
    pub route: String,
    pub args: String,
    pub identities: Vec<String>,
    pub key: String,
}

impl CacheKeyContext {
    pub fn new(route: &str, raw_query: &str, identities: &[String]) -> Self {
        let args = normalize_args(raw_query);
        let mut identities = identities.to_vec();
        identities.sort();
        let key = compose_key(route, &args, &identities);

        Self {
            route: route.to_string(),
            args,
            identities,
            key,
        }
    }
}

/// Build the canonical key for a route, raw query string and identity set.
pub fn build_key(route: &str, raw_query: &str, identities: &[String]) -> String {
    CacheKeyContext::new(route, raw_query, identities).key
}

/// Hex digest used for the route and argument segments.
pub fn segment_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..DIGEST_BYTES])
}

/// Sort `name=value` tokens so argument order does not change the key.
pub fn normalize_args(raw_query: &str) -> String {
    let mut tokens: Vec<&str> = raw_query.split('&').collect();
    tokens.sort_unstable();
    tokens.join("&")
}

/// SCAN pattern matching every key of `route` that includes `identity`.
///
/// Identities are joined with `-`, so an identity that itself contains `-`
/// (`x-123`) also matches the pattern for each of its parts (`123`). The
/// result is over-invalidation only: an extra entry is dropped and rebuilt,
/// never a stale entry kept. AWS account ids are plain digits.
pub fn invalidation_pattern(route: &str, identity: &str) -> String {
    format!("{}-*-{}-*", segment_hash(route), escape_glob(identity))
}

fn compose_key(route: &str, args: &str, sorted_identities: &[String]) -> String {
    let mut key = format!("{}-{}-", segment_hash(route), segment_hash(args));
    for identity in sorted_identities {
        key.push_str(identity);
        key.push('-');
    }
    key
}

fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
