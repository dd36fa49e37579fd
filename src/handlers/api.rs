//! Health check endpoint.

use axum::response::IntoResponse;

/// `GET /` - liveness probe.
pub async fn health_check() -> impl IntoResponse {
    "Callbridge is running."
}
