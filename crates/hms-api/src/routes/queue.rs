//! Daily department queues.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use hms_core::{QueueToken, TokenPriority, TokenRequest, TokenStatus};
use serde::Deserialize;

use crate::audit::{self, RequestMeta};
use crate::auth::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::events::QUEUE_UPDATE;
use crate::extract::ApiJson;
use crate::state::AppState;

use super::today;

const CALLERS: &[Role] = &[Role::Admin, Role::Doctor, Role::Lab, Role::Nurse];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(issue))
        .route("/call-next", post(call_next))
        .route("/:id/status", post(set_status))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    department: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueToken {
    #[serde(default)]
    department: String,
    patient_id: Option<String>,
    #[serde(default)]
    priority: TokenPriority,
}

#[derive(Debug, Deserialize)]
struct CallNext {
    #[serde(default)]
    department: String,
    counter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    #[serde(default)]
    status: String,
}

fn require_department(department: &str) -> ApiResult<()> {
    if department.trim().is_empty() {
        return Err(ApiError::field("department", "Department required"));
    }
    Ok(())
}

async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<QueueToken>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| TokenStatus::parse(s).ok_or_else(|| ApiError::field("status", "Invalid status")))
        .transpose()?;
    let date = today();
    let tokens = state.with_db(|db| db.list_tokens(&date, query.department.as_deref(), status))?;
    Ok(Json(tokens))
}

async fn issue(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    body: Result<ApiJson<IssueToken>, ApiError>,
) -> ApiResult<(StatusCode, Json<QueueToken>)> {
    user.require(&[Role::Admin, Role::Receptionist])?;
    let ApiJson(body) = body?;
    require_department(&body.department)?;

    let request = TokenRequest {
        department: body.department,
        patient_id: body.patient_id,
        priority: body.priority,
        created_by: Some(user.user_id.clone()),
    };
    let date = today();
    let token = state.with_db(|db| db.issue_token(&request, &date))?;

    audit::record(&state, &user, &meta, "create", "queue", Some(&token.token_id));
    state.events.to_all(QUEUE_UPDATE, &token);
    Ok((StatusCode::CREATED, Json(token)))
}

async fn call_next(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    body: Result<ApiJson<CallNext>, ApiError>,
) -> ApiResult<Json<QueueToken>> {
    user.require(CALLERS)?;
    let ApiJson(body) = body?;
    require_department(&body.department)?;

    let date = today();
    let token = state
        .with_db(|db| db.call_next_token(&body.department, &date, body.counter.as_deref()))?;

    audit::record(&state, &user, &meta, "call-next", "queue", Some(&token.token_id));
    state.events.to_all(QUEUE_UPDATE, &token);
    Ok(Json(token))
}

async fn set_status(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    body: Result<ApiJson<StatusUpdate>, ApiError>,
) -> ApiResult<Json<QueueToken>> {
    user.require(CALLERS)?;
    let ApiJson(body) = body?;
    let status =
        TokenStatus::parse(&body.status).ok_or_else(|| ApiError::field("status", "Invalid status"))?;

    let token = state.with_db(|db| db.set_token_status(&id, status))?;

    audit::record(&state, &user, &meta, "status", "queue", Some(&id));
    state.events.to_all(QUEUE_UPDATE, &token);
    Ok(Json(token))
}
