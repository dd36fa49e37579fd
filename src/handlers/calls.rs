//! Outbound call placement.
//!
//! `POST /make_call` asks the telephony platform to dial a destination and
//! connect the answered call's media to this server's stream endpoint. The
//! markup handed to the platform is the only coupling between call control
//! and the bridge core: it points the media stream at `/stream`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::state::AppState;
use crate::utils::validate_phone_number;

/// Request body for `POST /make_call`.
#[derive(Debug, Deserialize)]
pub struct MakeCallRequest {
    /// Destination number in E.164 form
    pub to: String,
}

/// `POST /make_call` - place an outbound call.
///
/// Success returns the platform's opaque call sid. The call is considered
/// placed even if the speech session later fails to open; that failure
/// surfaces as the session tearing down, not here.
pub async fn make_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MakeCallRequest>,
) -> Response {
    let to = request.to.trim();
    if !validate_phone_number(to) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing or malformed 'to' number"})),
        )
            .into_response();
    }

    let url = format!(
        "{}/2010-04-01/Accounts/{}/Calls.json",
        state.config.telephony_api_base, state.config.telephony_account_sid
    );
    let twiml = stream_twiml(&state.config.stream_url());

    let result = state
        .http
        .post(&url)
        .basic_auth(
            &state.config.telephony_account_sid,
            Some(&state.config.telephony_auth_token),
        )
        .form(&[
            ("To", to),
            ("From", state.config.telephony_from_number.as_str()),
            ("Twiml", twiml.as_str()),
        ])
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            let body: serde_json::Value = response.json().await.unwrap_or_else(|_| json!({}));
            let sid = body["sid"].as_str().unwrap_or("unknown").to_string();
            info!(%to, %sid, "outbound call placed");
            Json(json!({"sid": sid})).into_response()
        }
        Ok(response) => {
            let status = response.status();
            let body: serde_json::Value = response.json().await.unwrap_or_else(|_| json!({}));
            error!(%status, ?body, "telephony API rejected the call");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "destination could not be reached",
                    "details": body,
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!("telephony API request failed: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// `POST /twiml` - markup for platforms configured with a webhook URL
/// instead of inline markup.
pub async fn twiml(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/xml")],
        stream_twiml(&state.config.stream_url()),
    )
        .into_response()
}

/// Markup instructing the platform to open a duplex media stream to us.
fn stream_twiml(stream_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect>
    <Stream url="{stream_url}" />
  </Connect>
</Response>"#
    )
}
