//! Error types for the bridge server.

pub mod bridge_error;

pub use bridge_error::{BridgeError, BridgeResult};
