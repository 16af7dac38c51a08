//! Discharge summaries: draft, doctor approval, finalization.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use hms_core::models::DischargeDetails;
use hms_core::Discharge;
use serde::Deserialize;
use serde_json::json;

use crate::audit::{self, RequestMeta};
use crate::auth::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::events::{BILL_UPDATE, DISCHARGE_UPDATE};
use crate::extract::ApiJson;
use crate::state::AppState;

const AUTHORS: &[Role] = &[Role::Admin, Role::Doctor, Role::Nurse, Role::Receptionist];
const WATCHERS: &[Role] = &[Role::Admin, Role::Doctor, Role::Nurse];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show))
        .route("/:id/approve-doctor", post(approve))
        .route("/:id/finalize", post(finalize))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    patient: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateDischarge {
    #[serde(default)]
    patient_id: String,
    #[serde(flatten)]
    details: DischargeDetails,
}

#[derive(Debug, Default, Deserialize)]
struct Finalize {
    package_price: Option<f64>,
    discharge_date: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Discharge>>> {
    Ok(Json(
        state.with_db(|db| db.list_discharges(query.patient.as_deref()))?,
    ))
}

async fn show(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Discharge>> {
    state
        .with_db(|db| db.get_discharge(&id))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Discharge not found".into()))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    body: Result<ApiJson<CreateDischarge>, ApiError>,
) -> ApiResult<(StatusCode, Json<Discharge>)> {
    user.require(AUTHORS)?;
    let ApiJson(body) = body?;
    if body.patient_id.trim().is_empty() {
        return Err(ApiError::field("patient_id", "Patient is required"));
    }

    let discharge =
        state.with_db(|db| db.create_discharge(&body.patient_id, &user.user_id, body.details))?;

    audit::record(&state, &user, &meta, "create", "discharge", Some(&discharge.discharge_id));
    state.events.to_roles(DISCHARGE_UPDATE, WATCHERS, &discharge);
    Ok((StatusCode::CREATED, Json(discharge)))
}

async fn approve(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<Json<Discharge>> {
    user.require(&[Role::Doctor, Role::Admin])?;
    let discharge = state.with_db(|db| db.approve_discharge(&id, &user.user_id))?;

    audit::record(&state, &user, &meta, "approve-doctor", "discharge", Some(&id));
    state.events.to_roles(DISCHARGE_UPDATE, WATCHERS, &discharge);
    Ok(Json(discharge))
}

async fn finalize(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Discharge>> {
    user.require(&[Role::Admin, Role::Nurse])?;
    let body = ApiJson::<Finalize>::or_default(&body)?;
    if let Some(price) = body.package_price {
        if !price.is_finite() || price < 0.0 {
            return Err(ApiError::field(
                "package_price",
                "Package price must be a non-negative amount",
            ));
        }
    }

    let discharge = state.with_db(|db| {
        db.finalize_discharge(
            &id,
            &user.user_id,
            body.package_price,
            body.discharge_date.as_deref(),
        )
    })?;
    tracing::info!(discharge = %id, invoice = ?discharge.invoice_id, "discharge finalized");

    audit::record(&state, &user, &meta, "finalize", "discharge", Some(&id));
    state.events.to_roles(DISCHARGE_UPDATE, WATCHERS, &discharge);
    if let Some(invoice_id) = &discharge.invoice_id {
        state.events.to_roles(
            BILL_UPDATE,
            &[Role::Admin, Role::Receptionist],
            &json!({ "invoice_id": invoice_id, "discharge_id": id }),
        );
    }
    Ok(Json(discharge))
}
