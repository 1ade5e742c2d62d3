use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use super::AppState;
use crate::agent::context::{brief_from_json, AnnouncementContext, ValidationError};
use crate::agent::EvaluateError;
use crate::evaluation::{EvaluationResult, PayloadError};
use crate::gateway::{CompletionGateway, GatewayError};

pub const GENERIC_FAILURE: &str = "Something went wrong on the server.";
pub const INVALID_PAYLOAD: &str = "Invalid upstream payload";
pub const BODY_TOO_LARGE: &str = "Request body too large";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Body(#[from] BytesRejection),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{source}")]
    Payload { source: PayloadError, raw: String },
}

impl From<EvaluateError> for ApiError {
    fn from(err: EvaluateError) -> Self {
        match err {
            EvaluateError::Gateway(err) => ApiError::Gateway(err),
            EvaluateError::Payload { source, raw } => ApiError::Payload { source, raw },
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Body(rejection) => rejection.status(),
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Payload { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Body(rejection) => json!({ "error": rejection_message(&rejection) }),
            ApiError::Validation(err) => json!({ "error": err.to_string() }),
            ApiError::Gateway(err) => {
                log::error!("completion request failed: {}", err);
                json!({ "error": GENERIC_FAILURE })
            }
            ApiError::Payload { source, raw } => {
                log::error!("rejecting upstream payload: {}", source);
                json!({ "error": INVALID_PAYLOAD, "raw": raw })
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Axum reports body rejections in plain text; only the oversized case gets a
/// fixed message.
fn rejection_message(rejection: &BytesRejection) -> String {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        BODY_TOO_LARGE.to_string()
    } else {
        rejection.body_text()
    }
}

#[derive(Serialize, Debug)]
pub struct EvaluationResponse {
    #[serde(flatten)]
    pub result: EvaluationResult,
    /// The unprocessed model output, echoed for debugging.
    pub raw: String,
}

#[derive(Serialize, Debug)]
pub struct GenerationResponse {
    pub response: String,
}

/// An unreadable body is treated like an empty one so that it fails field
/// validation rather than JSON extraction.
fn parse_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

pub async fn evaluate<G: CompletionGateway>(
    State(state): State<Arc<AppState<G>>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let body = parse_body(&body?);
    let ctx = AnnouncementContext::from_json(&body)?;
    let evaluation = state.agent.evaluate(&ctx).await?;
    Ok(Json(EvaluationResponse {
        result: evaluation.result,
        raw: evaluation.raw,
    }))
}

pub async fn generate<G: CompletionGateway>(
    State(state): State<Arc<AppState<G>>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let body = parse_body(&body?);
    let brief = brief_from_json(&body)?;
    if let Some(email) = body.get("email").and_then(Value::as_str) {
        log::debug!("generation requested by {}", email);
    }
    let response = state.agent.draft_press_release(&brief).await?;
    Ok(Json(GenerationResponse { response }))
}

pub async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}
