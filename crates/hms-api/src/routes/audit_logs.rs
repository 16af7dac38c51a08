//! Audit trail queries for administrators.

use axum::{
    extract::{Query, State},
    Json,
};
use hms_core::db::DEFAULT_AUDIT_LIMIT;
use hms_core::AuditEntry;
use serde::Deserialize;

use crate::auth::{AuthUser, Role};
use crate::error::ApiResult;
use crate::state::AppState;

const MAX_AUDIT_LIMIT: usize = 1_000;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    resource: Option<String>,
    user: Option<String>,
    limit: Option<usize>,
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    user.require(&[Role::Admin])?;
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).min(MAX_AUDIT_LIMIT);
    let entries = state.with_db(|db| {
        db.list_audit(query.resource.as_deref(), query.user.as_deref(), limit)
    })?;
    Ok(Json(entries))
}
