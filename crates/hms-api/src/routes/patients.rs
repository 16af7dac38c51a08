//! Patient registration and admission status.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use hms_core::{AdmissionStatus, Patient};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::audit::{self, RequestMeta};
use crate::auth::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

const REGISTRARS: &[Role] = &[Role::Admin, Role::Receptionist, Role::Doctor, Role::Nurse];

const DEFAULT_SEARCH_LIMIT: usize = 50;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).delete(remove))
        .route("/:id/admit", post(admit))
        .route("/:id/discharge", post(discharge))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    q: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CreatePatient {
    name: String,
    phone: Option<String>,
    date_of_birth: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Patient>>> {
    let patients = state.with_db(|db| match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => {
            db.search_patients(q, query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
        }
        _ => db.list_patients(),
    })?;
    Ok(Json(patients))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    body: Result<ApiJson<CreatePatient>, ApiError>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    user.require(REGISTRARS)?;
    let ApiJson(body) = body?;
    if body.name.trim().is_empty() {
        return Err(ApiError::field("name", "Name is required"));
    }

    let mut patient = Patient::new(body.name);
    patient.phone = body.phone;
    patient.date_of_birth = body.date_of_birth;
    state.with_db(|db| db.insert_patient(&patient))?;

    audit::record(&state, &user, &meta, "create", "patients", Some(&patient.patient_id));
    Ok((StatusCode::CREATED, Json(patient)))
}

async fn show(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Patient>> {
    state
        .with_db(|db| db.get_patient(&id))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    user.require(&[Role::Admin])?;
    if !state.with_db(|db| db.delete_patient(&id))? {
        return Err(ApiError::NotFound("Patient not found".into()));
    }
    audit::record(&state, &user, &meta, "delete", "patients", Some(&id));
    Ok(Json(json!({ "message": "Deleted" })))
}

async fn admit(
    state: State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    id: Path<String>,
) -> ApiResult<Json<Patient>> {
    set_status(state, user, meta, id, AdmissionStatus::Admitted, "admit").await
}

async fn discharge(
    state: State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    id: Path<String>,
) -> ApiResult<Json<Patient>> {
    set_status(state, user, meta, id, AdmissionStatus::Discharged, "discharge").await
}

async fn set_status(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    status: AdmissionStatus,
    action: &str,
) -> ApiResult<Json<Patient>> {
    user.require(REGISTRARS)?;
    let patient = state.with_db(|db| db.set_patient_status(&id, status))?;
    audit::record(&state, &user, &meta, action, "patients", Some(&id));
    Ok(Json(patient))
}
