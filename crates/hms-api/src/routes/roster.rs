//! Staff shift roster.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use hms_core::db::RosterQuery;
use hms_core::{RosterEntry, ShiftAssignment, StaffRole};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::audit::{self, RequestMeta};
use crate::auth::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::events::ROSTER_UPDATE;
use crate::extract::ApiJson;
use crate::state::AppState;

const PLANNERS: &[Role] = &[Role::Admin, Role::Nurse];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    start: Option<String>,
    end: Option<String>,
    role: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<RosterEntry>>> {
    let role = query
        .role
        .as_deref()
        .map(|r| StaffRole::parse(r).ok_or_else(|| ApiError::field("role", format!("Unknown role {r:?}"))))
        .transpose()?;
    let filter = RosterQuery {
        start: query.start,
        end: query.end,
        role,
    };
    Ok(Json(state.with_db(|db| db.list_shifts(&filter))?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    body: Result<ApiJson<ShiftAssignment>, ApiError>,
) -> ApiResult<(StatusCode, Json<RosterEntry>)> {
    user.require(PLANNERS)?;
    let ApiJson(body) = body?;
    let entry = state.with_db(|db| db.create_shift(body))?;

    audit::record(&state, &user, &meta, "create", "roster", Some(&entry.roster_id));
    state.events.to_roles(ROSTER_UPDATE, PLANNERS, &entry);
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    body: Result<ApiJson<ShiftAssignment>, ApiError>,
) -> ApiResult<Json<RosterEntry>> {
    user.require(PLANNERS)?;
    let ApiJson(body) = body?;
    let entry = state.with_db(|db| db.update_shift(&id, body))?;

    audit::record(&state, &user, &meta, "update", "roster", Some(&id));
    state.events.to_roles(ROSTER_UPDATE, PLANNERS, &entry);
    Ok(Json(entry))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    user.require(PLANNERS)?;
    if !state.with_db(|db| db.delete_shift(&id))? {
        return Err(ApiError::NotFound("Not found".into()));
    }

    audit::record(&state, &user, &meta, "delete", "roster", Some(&id));
    state
        .events
        .to_roles(ROSTER_UPDATE, PLANNERS, &json!({ "deleted": id }));
    Ok(Json(json!({ "message": "Deleted" })))
}
