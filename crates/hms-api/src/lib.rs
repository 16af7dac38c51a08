//! REST surface for the hospital core.
//!
//! Every route lives under `/api` and authenticates with a bearer JWT.
//! Mutating requests are written to the audit trail and announced on the
//! realtime event stream at `/api/events`.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router around `state`.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .nest("/api", routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if config.cors_origins.is_empty() {
        return layer;
    }
    layer
        .allow_origin(AllowOrigin::list(config.cors_origins.iter().cloned()))
        .allow_credentials(true)
}
