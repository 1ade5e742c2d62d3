#[path = "../common/mod.rs"]
mod common;

use common::{evaluation_json, mount_completion, mount_status, test_agent, TEST_MODEL};
use prcopilot::agent::context::AnnouncementContext;
use prcopilot::agent::{Agent, EvaluateError, EVALUATION_TEMPERATURE, GENERATION_TEMPERATURE};
use prcopilot::evaluation::{PayloadError, Verdict};
use prcopilot::gateway::{CompletionGateway, CompletionRequest, GatewayError};
use std::sync::Mutex;
use wiremock::MockServer;

/// Replays a fixed reply and records what it was asked.
struct ScriptedGateway {
    reply: Result<String, ()>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGateway {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(request);
        self.reply
            .clone()
            .map_err(|_| GatewayError::Other(anyhow::anyhow!("scripted failure")))
    }
}

fn context() -> AnnouncementContext {
    AnnouncementContext::new("Acme raised $3M").expect("valid context")
}

#[tokio::test]
async fn evaluate_sends_json_request_with_fixed_parameters() {
    let agent = Agent::new(ScriptedGateway::replying(&evaluation_json("GO")), "fixed-model");

    let evaluation = agent.evaluate(&context()).await.expect("evaluation");

    assert_eq!(evaluation.result.verdict, Verdict::Go);
    assert_eq!(evaluation.raw, evaluation_json("GO"));

    let gateway = agent_gateway_requests(&agent);
    assert_eq!(gateway.len(), 1);
    assert_eq!(gateway[0].model, "fixed-model");
    assert_eq!(gateway[0].temperature, EVALUATION_TEMPERATURE);
    assert!(gateway[0].json_output);
    assert!(gateway[0].user.contains("Acme raised $3M"));
}

#[tokio::test]
async fn draft_uses_generation_temperature_without_json_mode() {
    let agent = Agent::new(ScriptedGateway::replying("HEADLINE"), "fixed-model");

    let draft = agent
        .draft_press_release("Acme raised $3M")
        .await
        .expect("draft");

    assert_eq!(draft, "HEADLINE");
    let requests = agent_gateway_requests(&agent);
    assert_eq!(requests[0].temperature, GENERATION_TEMPERATURE);
    assert!(!requests[0].json_output);
    assert!(requests[0].user.contains("Brief:\nAcme raised $3M"));
}

#[tokio::test]
async fn evaluate_reports_payload_error_with_raw_text() {
    let agent = Agent::new(ScriptedGateway::replying("not json"), "fixed-model");

    match agent.evaluate(&context()).await {
        Err(EvaluateError::Payload { source, raw }) => {
            assert!(matches!(source, PayloadError::InvalidJson(_)));
            assert_eq!(raw, "not json");
        }
        other => panic!("Unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn evaluate_rejects_json_that_is_not_an_object() {
    let agent = Agent::new(ScriptedGateway::replying(r#"["GO"]"#), "fixed-model");

    match agent.evaluate(&context()).await {
        Err(EvaluateError::Payload { source, .. }) => {
            assert!(matches!(source, PayloadError::NotAnObject));
        }
        other => panic!("Unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn evaluate_surfaces_gateway_failure() {
    let agent = Agent::new(ScriptedGateway::failing(), "fixed-model");

    let err = agent.evaluate(&context()).await.expect_err("should fail");
    assert!(matches!(err, EvaluateError::Gateway(_)));
}

#[tokio::test]
async fn evaluate_against_completion_api() {
    let server = MockServer::start().await;
    mount_completion(&server, &evaluation_json("CONDITIONAL")).await;

    let agent = test_agent(&server);
    assert_eq!(agent.model(), TEST_MODEL);

    let evaluation = agent.evaluate(&context()).await.expect("evaluation");
    assert_eq!(evaluation.result.verdict, Verdict::Conditional);
    assert_eq!(evaluation.result.risk_score, 42);
}

#[tokio::test]
async fn draft_surfaces_api_status() {
    let server = MockServer::start().await;
    mount_status(&server, 429, "slow down").await;

    let agent = test_agent(&server);
    match agent.draft_press_release("Acme raised $3M").await {
        Err(GatewayError::ApiStatus { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "slow down");
        }
        other => panic!("Unexpected result: {other:?}"),
    }
}

fn agent_gateway_requests(agent: &Agent<ScriptedGateway>) -> Vec<CompletionRequest> {
    agent.gateway().requests.lock().unwrap().clone()
}
