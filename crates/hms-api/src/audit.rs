//! Audit trail for mutating requests.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use hms_core::AuditEntry;
use serde_json::json;

use crate::auth::AuthUser;
use crate::state::AppState;

/// Request facts recorded alongside an audit entry.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub ip: Option<String>,
}

impl RequestMeta {
    /// Capture request facts. `X-Forwarded-For` is read only when
    /// `trust_proxy` is set; otherwise the socket peer is recorded.
    pub fn from_parts(parts: &Parts, trust_proxy: bool) -> Self {
        let forwarded = trust_proxy
            .then(|| parts.headers.get("x-forwarded-for"))
            .flatten()
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        RequestMeta {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            ip: forwarded.or(peer),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestMeta::from_parts(parts, state.config.trust_proxy))
    }
}

/// Record a completed action. A failed write is logged and otherwise ignored.
pub fn record(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    action: &str,
    resource: &str,
    resource_id: Option<&str>,
) {
    let mut entry = AuditEntry::new(user.user_id.clone(), action, resource);
    entry.resource_id = resource_id.map(str::to_string);
    entry.details = Some(json!({
        "method": meta.method,
        "path": meta.path,
        "role": user.role.as_str(),
    }));
    entry.ip_address = meta.ip.clone();

    if let Err(e) = state.with_db(|db| db.record_audit(&entry)) {
        tracing::warn!(error = %e, action, resource, "audit write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_from_proxy() -> Parts {
        let (mut parts, _) = Request::builder()
            .method("POST")
            .uri("/api/billing?x=1")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(())
            .unwrap()
            .into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 5], 4000))));
        parts
    }

    #[test]
    fn test_peer_address_by_default() {
        let meta = RequestMeta::from_parts(&parts_from_proxy(), false);
        assert_eq!(meta.ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(meta.method, "POST");
        assert_eq!(meta.path, "/api/billing");
    }

    #[test]
    fn test_forwarded_address_when_proxy_trusted() {
        let meta = RequestMeta::from_parts(&parts_from_proxy(), true);
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_no_address_without_peer_or_header() {
        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        assert_eq!(RequestMeta::from_parts(&parts, true).ip, None);
    }
}
