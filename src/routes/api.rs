use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, calls};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP API router.
///
/// - `GET /` - health check
/// - `POST /make_call` - place an outbound call
/// - `POST /twiml` - stream markup webhook
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/make_call", post(calls::make_call))
        .route("/twiml", post(calls::twiml))
        .layer(TraceLayer::new_for_http())
}
