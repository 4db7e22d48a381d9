//! `Cache-Status` / `Cache-Error` header protocol.
//!
//! Pure encode/decode: what a state means for the cache is decided by the
//! response cache middleware.

use axum::http::{HeaderMap, HeaderValue};

pub const CACHE_STATUS_HEADER: &str = "Cache-Status";
pub const CACHE_ERROR_HEADER: &str = "Cache-Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Created,
    Used,
    Delete,
    Error,
    /// Inbound keyword we do not recognise. Never written to a response.
    Invalid,
}

const STATUS_KEYWORDS: [(CacheStatus, &str); 4] = [
    (CacheStatus::Created, "CREATED"),
    (CacheStatus::Used, "USED"),
    (CacheStatus::Delete, "DELETE"),
    (CacheStatus::Error, "ERROR"),
];

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        STATUS_KEYWORDS
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, keyword)| *keyword)
            .unwrap_or("INVALID")
    }

    pub fn from_keyword(keyword: &str) -> Self {
        let keyword = keyword.trim();
        STATUS_KEYWORDS
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(keyword))
            .map(|(status, _)| *status)
            .unwrap_or(CacheStatus::Invalid)
    }
}

/// Short reason codes sent on `Cache-Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheErrorReason {
    /// Authenticated user or request transaction missing from the request.
    UnableGetBasicsInfos,
    UnableResolveIdentities,
    UnableSerializeBody,
}

impl CacheErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheErrorReason::UnableGetBasicsInfos => "UNABLE-GET-BASICS-INFOS",
            CacheErrorReason::UnableResolveIdentities => "UNABLE-RESOLVE-IDENTITIES",
            CacheErrorReason::UnableSerializeBody => "UNABLE-SERIALIZE-BODY",
        }
    }
}

/// Inbound state. `None` means the header is absent; anything unparseable
/// decodes to `Some(CacheStatus::Invalid)`.
pub fn read_request_state(headers: &HeaderMap) -> Option<CacheStatus> {
    let value = headers.get(CACHE_STATUS_HEADER)?;
    Some(
        value
            .to_str()
            .map(CacheStatus::from_keyword)
            .unwrap_or(CacheStatus::Invalid),
    )
}

/// Overwrite the response state. `Cache-Error` is only kept alongside `ERROR`.
pub fn write_response_state(
    headers: &mut HeaderMap,
    state: CacheStatus,
    reason: Option<CacheErrorReason>,
) {
    if state == CacheStatus::Invalid {
        return;
    }
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(state.as_str()));

    match (state, reason) {
        (CacheStatus::Error, Some(reason)) => {
            headers.insert(CACHE_ERROR_HEADER, HeaderValue::from_static(reason.as_str()));
        }
        _ => {
            headers.remove(CACHE_ERROR_HEADER);
        }
    }
}
