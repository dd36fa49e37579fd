//! Call-control endpoint tests against a mocked telephony REST API.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use callbridge::{AppState, BridgeConfig, routes};

fn test_app(telephony_api_base: String) -> Router {
    let mut config = BridgeConfig::default();
    config.public_url = "https://bridge.example.com".to_string();
    config.telephony_account_sid = "AC123".to_string();
    config.telephony_auth_token = "secret-token".to_string();
    config.telephony_from_number = "+15550001111".to_string();
    config.telephony_api_base = telephony_api_base;
    config.speech_api_key = "sk-test".to_string();

    routes::api::create_api_router().with_state(Arc::new(AppState::new(config)))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn test_make_call_places_call_and_returns_sid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Calls.json"))
        .and(body_string_contains("To=%2B15559998888"))
        .and(body_string_contains("From=%2B15550001111"))
        .and(body_string_contains("Twiml="))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"sid": "CA42"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = test_app(server.uri())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/make_call")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"to": "+15559998888"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["sid"], "CA42");
}

#[tokio::test]
async fn test_make_call_rejects_malformed_destination() {
    let server = MockServer::start().await;
    // No mock mounted: a malformed destination must never reach the API

    let response = test_app(server.uri())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/make_call")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"to": "not a number"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("malformed"));
}

#[tokio::test]
async fn test_make_call_surfaces_telephony_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Calls.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "code": 20003,
            "message": "Authenticate",
        })))
        .mount(&server)
        .await;

    let response = test_app(server.uri())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/make_call")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"to": "+15559998888"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"], "destination could not be reached");
}

#[tokio::test]
async fn test_twiml_points_platform_at_stream_endpoint() {
    let response = test_app("https://api.twilio.example".to_string())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/twiml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/xml"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let markup = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(markup.contains(r#"<Stream url="wss://bridge.example.com/stream" />"#));
}

#[tokio::test]
async fn test_health_check() {
    let response = test_app("https://api.twilio.example".to_string())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
