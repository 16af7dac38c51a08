//! Bulk invoice export.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hms_core::export::InvoiceExporter;
use serde::Deserialize;

use crate::auth::{AuthUser, Role};
use crate::error::ApiResult;
use crate::state::AppState;

use super::billing::{csv_attachment, parse_status, Format};
use super::today;

pub fn routes() -> Router<AppState> {
    Router::new().route("/billing", get(billing))
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    format: Option<String>,
    status: Option<String>,
}

async fn billing(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    user.require(&[Role::Admin, Role::Receptionist])?;
    let format = Format::parse(query.format.as_deref())?;
    let status = parse_status(query.status.as_deref())?;

    let batch = state.with_db(|db| InvoiceExporter::new(db).export_all(status))?;
    tracing::info!(invoices = batch.invoices.len(), user = %user.user_id, "billing exported");

    Ok(match format {
        Format::Json => Json(batch).into_response(),
        Format::Csv => csv_attachment(&format!("billing-{}.csv", today()), batch.to_csv()),
    })
}
