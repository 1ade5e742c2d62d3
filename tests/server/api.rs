#[path = "../common/mod.rs"]
mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{
    completion_body, evaluation_json, mount_completion, mount_status, openai_config, test_agent,
    TEST_MODEL,
};
use prcopilot::agent::Agent;
use prcopilot::gateway::OpenAiGateway;
use prcopilot::server::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(server: &MockServer) -> Router {
    let state = Arc::new(AppState::new(test_agent(server), 16));
    router(state, 64 * 1024)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn evaluate_returns_normalized_result_and_raw_echo() {
    let server = MockServer::start().await;
    mount_completion(&server, &evaluation_json("GO")).await;

    let (status, body) = send(
        app(&server),
        post_json("/api/evaluate", r#"{"announcement": "Acme raised $3M"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"], "GO");
    assert_eq!(body["risk_score"], 42);
    assert_eq!(body["risk_breakdown"]["external_validation"], 12);
    assert_eq!(body["primary_failure_modes"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        body["recommendation"]["next_actions"][0],
        "Secure a quotable customer"
    );
    assert_eq!(body["raw"], evaluation_json("GO"));
}

#[tokio::test]
async fn evaluate_minimal_brief_stays_in_range() {
    let server = MockServer::start().await;
    mount_completion(
        &server,
        &json!({
            "verdict": "maybe",
            "risk_score": 140,
            "risk_breakdown": { "external_validation": 55 }
        })
        .to_string(),
    )
    .await;

    let (status, body) = send(
        app(&server),
        post_json("/api/evaluate", r#"{"announcement": "Acme raised $3M"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let verdict = body["verdict"].as_str().expect("verdict");
    assert!(["GO", "CONDITIONAL", "NO-GO"].contains(&verdict));
    assert_eq!(verdict, "NO-GO");
    let score = body["risk_score"].as_i64().expect("score");
    assert!((0..=100).contains(&score));
    let external = body["risk_breakdown"]["external_validation"]
        .as_i64()
        .expect("sub-score");
    assert!((0..=30).contains(&external));
}

#[tokio::test]
async fn evaluate_sends_placeholders_for_omitted_fields() {
    let server = MockServer::start().await;
    mount_completion(&server, &evaluation_json("NO-GO")).await;

    let (status, _) = send(
        app(&server),
        post_json(
            "/api/evaluate",
            r#"{"announcement": "Acme raised $3M", "market": "Payments", "geo": 7}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let received = server.received_requests().await.expect("recording enabled");
    let request: Value = received[0].body_json().expect("JSON body");
    let user = request["messages"][1]["content"].as_str().expect("user");
    assert!(user.contains("- Market/category: Payments"));
    assert!(user.contains("- Geography: [TBD]"));
    assert!(user.contains("- Company stage: [TBD]"));
    assert_eq!(request["temperature"], json!(0.3));
    assert_eq!(request["response_format"]["type"], "json_object");
}

#[tokio::test]
async fn evaluate_rejects_missing_announcement() {
    let server = MockServer::start().await;

    for body in [
        "{}",
        r#"{"announcement": 12}"#,
        r#"{"announcement": ""}"#,
        r#"{"announcement": "   "}"#,
        "not json",
        "",
    ] {
        let (status, value) = send(app(&server), post_json("/api/evaluate", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(value["error"], "Missing announcement");
    }

    let received = server.received_requests().await.expect("recording enabled");
    assert!(received.is_empty());
}

#[tokio::test]
async fn evaluate_reports_invalid_upstream_payload() {
    let server = MockServer::start().await;
    mount_completion(&server, "not json").await;

    let (status, body) = send(
        app(&server),
        post_json("/api/evaluate", r#"{"announcement": "Acme raised $3M"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Invalid upstream payload");
    assert_eq!(body["raw"], "not json");
}

#[tokio::test]
async fn evaluate_hides_gateway_failure_details() {
    let server = MockServer::start().await;
    mount_status(&server, 401, "invalid api key sk-123").await;

    let (status, body) = send(
        app(&server),
        post_json("/api/evaluate", r#"{"announcement": "Acme raised $3M"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Something went wrong on the server." }));
}

#[tokio::test]
async fn generate_returns_draft() {
    let server = MockServer::start().await;
    mount_completion(&server, "HEADLINE\nSUBHEAD").await;

    let (status, body) = send(
        app(&server),
        post_json(
            "/api/generate",
            r#"{"prompt": "Acme raised $3M", "email": "founder@example.com"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "response": "HEADLINE\nSUBHEAD" }));

    let received = server.received_requests().await.expect("recording enabled");
    let request: Value = received[0].body_json().expect("JSON body");
    assert_eq!(request["temperature"], json!(0.6));
    assert!(request.get("response_format").is_none());
}

#[tokio::test]
async fn generate_rejects_missing_prompt() {
    let server = MockServer::start().await;

    for body in [r#"{"brief": "x"}"#, r#"{"prompt": " \n "}"#] {
        let (status, value) = send(app(&server), post_json("/api/generate", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(value["error"], "Missing prompt");
    }
}

#[tokio::test]
async fn generate_failure_is_server_error() {
    let server = MockServer::start().await;
    mount_status(&server, 500, "boom").await;

    let (status, body) = send(
        app(&server),
        post_json("/api/generate", r#"{"prompt": "Acme raised $3M"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Something went wrong on the server.");
}

#[tokio::test]
async fn api_routes_only_accept_post() {
    let server = MockServer::start().await;

    for uri in ["/api/evaluate", "/api/generate"] {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(app(&server), request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method not allowed");
    }
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    let state = Arc::new(AppState::new(test_agent(&server), 16));
    let app = router(state, 128);

    let announcement = "x".repeat(1024);
    let body = json!({ "announcement": announcement }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/api/evaluate")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .expect("request");
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({ "error": "Request body too large" }));

    let received = server.received_requests().await.expect("recording enabled");
    assert!(received.is_empty());
}

#[tokio::test]
async fn evaluate_times_out_as_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body(&evaluation_json("GO")))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = openai_config(&server);
    config.timeout_secs = Some(1);
    let gateway = OpenAiGateway::new(&config).expect("Failed to build gateway");
    let state = Arc::new(AppState::new(Agent::new(gateway, TEST_MODEL), 16));

    let (status, body) = send(
        router(state, 64 * 1024),
        post_json("/api/evaluate", r#"{"announcement": "Acme raised $3M"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Something went wrong on the server." }));
}

#[tokio::test]
async fn health_check_responds() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .expect("request");

    let response = app(&server).oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
}
