//! Media-stream WebSocket route configuration.
//!
//! # Endpoint
//!
//! `GET /stream` - WebSocket upgrade for the telephony media stream.
//!
//! # Protocol
//!
//! After the upgrade the telephony platform sends:
//! 1. `connected`, then `start{streamSid}` (the handshake)
//! 2. `media{payload}` frames of base64 u-law caller audio
//! 3. `stop{}` when the call ends
//!
//! The bridge answers with `media` frames of base64 u-law assistant audio.
//! A connection that never sends a valid `start` within the configured
//! bound is dropped.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::stream::stream_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the media-stream WebSocket router.
pub fn create_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stream", get(stream_handler))
        .layer(TraceLayer::new_for_http())
}
