//! Invoices, payments and statements.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hms_core::db::{BillingSummary, InvoiceFilter};
use hms_core::export::InvoiceExporter;
use hms_core::{Invoice, InvoiceStatus, LineItemInput, NewInvoice, PaymentInput};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::audit::{self, RequestMeta};
use crate::auth::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::events::BILL_UPDATE;
use crate::extract::ApiJson;
use crate::state::AppState;

use super::today;

const CASHIERS: &[Role] = &[Role::Admin, Role::Receptionist];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/summary", get(summary))
        .route("/mark-overdue", post(mark_overdue))
        .route("/:id", get(show).put(update).delete(remove))
        .route("/:id/payment", post(add_payment))
        .route("/:id/cancel", post(cancel))
        .route("/:id/statement", get(statement))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ListQuery {
    patient: Option<String>,
    doctor: Option<String>,
    status: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> ApiResult<InvoiceFilter> {
        Ok(InvoiceFilter {
            patient_id: self.patient,
            doctor_id: self.doctor,
            status: parse_status(self.status.as_deref())?,
        })
    }
}

pub(super) fn parse_status(raw: Option<&str>) -> ApiResult<Option<InvoiceStatus>> {
    raw.map(|s| {
        InvoiceStatus::parse(s).ok_or_else(|| ApiError::field("status", format!("Unknown invoice status {s:?}")))
    })
    .transpose()
}

#[derive(Debug, Deserialize)]
struct UpdateItems {
    items: Vec<LineItemInput>,
    tax: Option<f64>,
    discount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FormatQuery {
    pub(super) format: Option<String>,
}

/// Output format of statements and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Format {
    Json,
    Csv,
}

impl Format {
    pub(super) fn parse(raw: Option<&str>) -> ApiResult<Self> {
        match raw.unwrap_or("json") {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            other => Err(ApiError::field("format", format!("Unsupported format {other:?}"))),
        }
    }
}

/// A downloadable CSV body.
pub(super) fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

fn notify(state: &AppState, invoice: &Invoice) {
    state
        .events
        .to_roles(BILL_UPDATE, &[Role::Admin, Role::Receptionist], invoice);
}

async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.with_db(|db| db.list_invoices(&filter))?))
}

async fn summary(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<BillingSummary>> {
    let filter = query.into_filter()?;
    Ok(Json(state.with_db(|db| db.billing_summary(&filter))?))
}

async fn show(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    state
        .with_db(|db| db.get_invoice(&id))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Invoice not found".into()))
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    body: Result<ApiJson<NewInvoice>, ApiError>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    user.require(CASHIERS)?;
    let ApiJson(body) = body?;
    if body.patient_id.trim().is_empty() {
        return Err(ApiError::field("patient_id", "Patient is required"));
    }

    let invoice = state.with_db(|db| db.create_invoice(body))?;
    tracing::info!(invoice = %invoice.invoice_number, user = %user.user_id, "invoice created");

    audit::record(&state, &user, &meta, "create", "billing", Some(&invoice.invoice_id));
    notify(&state, &invoice);
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    body: Result<ApiJson<UpdateItems>, ApiError>,
) -> ApiResult<Json<Invoice>> {
    user.require(CASHIERS)?;
    let ApiJson(body) = body?;
    let invoice =
        state.with_db(|db| db.update_invoice_items(&id, &body.items, body.tax, body.discount))?;

    audit::record(&state, &user, &meta, "update", "billing", Some(&id));
    notify(&state, &invoice);
    Ok(Json(invoice))
}

async fn add_payment(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    body: Result<ApiJson<PaymentInput>, ApiError>,
) -> ApiResult<Json<Invoice>> {
    user.require(CASHIERS)?;
    let ApiJson(body) = body?;
    let invoice = state.with_db(|db| db.add_payment(&id, body))?;

    audit::record(&state, &user, &meta, "payment", "billing", Some(&id));
    notify(&state, &invoice);
    Ok(Json(invoice))
}

async fn cancel(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    user.require(CASHIERS)?;
    let invoice = state.with_db(|db| db.cancel_invoice(&id))?;

    audit::record(&state, &user, &meta, "cancel", "billing", Some(&id));
    notify(&state, &invoice);
    Ok(Json(invoice))
}

async fn mark_overdue(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
) -> ApiResult<Json<Value>> {
    user.require(&[Role::Admin])?;
    let date = today();
    let updated = state.with_db(|db| db.mark_overdue(&date))?;
    tracing::info!(updated, date = %date, "overdue sweep");

    audit::record(&state, &user, &meta, "mark-overdue", "billing", None);
    if updated > 0 {
        state.events.to_roles(
            BILL_UPDATE,
            &[Role::Admin, Role::Receptionist],
            &json!({ "overdue": updated }),
        );
    }
    Ok(Json(json!({ "updated": updated })))
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    user.require(&[Role::Admin])?;
    if !state.with_db(|db| db.delete_invoice(&id))? {
        return Err(ApiError::NotFound("Invoice not found".into()));
    }
    audit::record(&state, &user, &meta, "delete", "billing", Some(&id));
    Ok(Json(json!({ "message": "Deleted" })))
}

async fn statement(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<FormatQuery>,
) -> ApiResult<Response> {
    let format = Format::parse(query.format.as_deref())?;
    let statement = state.with_db(|db| InvoiceExporter::new(db).statement(&id))?;

    Ok(match format {
        Format::Json => Json(statement).into_response(),
        Format::Csv => csv_attachment(
            &format!("statement-{}.csv", statement.invoice_number),
            statement.to_csv(),
        ),
    })
}
