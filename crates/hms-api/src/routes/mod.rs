//! HTTP routes under `/api`.

mod audit_logs;
mod billing;
mod discharge;
mod events;
mod export;
mod health;
mod patients;
mod queue;
mod roster;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .nest("/patients", patients::routes())
        .nest("/billing", billing::routes())
        .nest("/export", export::routes())
        .nest("/queue", queue::routes())
        .nest("/roster", roster::routes())
        .nest("/discharge", discharge::routes())
        .route("/audit-logs", get(audit_logs::list))
        .route("/events", get(events::stream))
}

/// Current UTC calendar date, `YYYY-MM-DD`.
pub(crate) fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}
