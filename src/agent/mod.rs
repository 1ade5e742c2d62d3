pub mod context;
pub mod prompt;

use context::AnnouncementContext;
use prompt::{build_evaluation_prompt, build_generation_prompt, PromptPair};

use crate::evaluation::{parse_evaluation, Evaluation, PayloadError};
use crate::gateway::{CompletionGateway, CompletionRequest, GatewayError};

pub const EVALUATION_TEMPERATURE: f32 = 0.3;
pub const GENERATION_TEMPERATURE: f32 = 0.6;

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{source}")]
    Payload {
        #[source]
        source: PayloadError,
        raw: String,
    },
}

/// Runs the two model round-trips: the readiness check and the draft.
pub struct Agent<G> {
    gateway: G,
    model: String,
}

impl<G: CompletionGateway> Agent<G> {
    pub fn new(gateway: G, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn evaluate(&self, ctx: &AnnouncementContext) -> Result<Evaluation, EvaluateError> {
        let prompt = build_evaluation_prompt(ctx);
        log::info!("requesting readiness evaluation from {}", self.model);
        let raw = self
            .gateway
            .complete(self.request(prompt, EVALUATION_TEMPERATURE, true))
            .await?;

        match parse_evaluation(&raw) {
            Ok(result) => {
                log::info!(
                    "evaluation verdict {} (risk score {})",
                    result.verdict,
                    result.risk_score
                );
                Ok(Evaluation { result, raw })
            }
            Err(source) => {
                log::warn!("discarding evaluation payload: {}", source);
                Err(EvaluateError::Payload { source, raw })
            }
        }
    }

    pub async fn draft_press_release(&self, brief: &str) -> Result<String, GatewayError> {
        let prompt = build_generation_prompt(brief);
        log::info!("requesting press release draft from {}", self.model);
        self.gateway
            .complete(self.request(prompt, GENERATION_TEMPERATURE, false))
            .await
    }

    fn request(&self, prompt: PromptPair, temperature: f32, json_output: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            system: prompt.system,
            user: prompt.user,
            temperature,
            json_output,
        }
    }
}
