//! HTTP and WebSocket request handlers
//!
//! - `api` - health check endpoint
//! - `calls` - outbound call placement and the stream-markup webhook
//! - `stream` - telephony media-stream WebSocket (the bridge itself)

pub mod api;
pub mod calls;
pub mod stream;

// Re-export commonly used handlers for convenient access
pub use stream::stream_handler;
