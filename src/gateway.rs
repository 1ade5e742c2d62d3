use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Completion API error (status {status}): {body}")]
    ApiStatus { status: u16, body: String },
    #[error("Completion API returned no choices")]
    NoChoices,
    #[error("Invalid completion API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn deserialize_option_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.filter(|v| !v.trim().is_empty()) {
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct OpenAiConfig {
    #[serde(rename = "openai_api_key")]
    pub api_key: String,
    #[serde(rename = "openai_model", default = "default_model")]
    pub model: String,
    #[serde(rename = "openai_base_url", default = "default_base_url")]
    pub base_url: String,
    #[serde(
        rename = "openai_timeout_secs",
        default,
        deserialize_with = "deserialize_option_u64"
    )]
    pub timeout_secs: Option<u64>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// A single system/user exchange with fixed sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Ask the service to constrain its output to a JSON object.
    pub json_output: bool,
}

/// Anything that can turn a [`CompletionRequest`] into completion text.
///
/// Implementations make exactly one attempt per call.
pub trait CompletionGateway: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;
}

#[derive(Debug, Clone)]
pub struct OpenAiGateway {
    endpoint: Url,
    client: Client,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGateway {
    pub fn new(config: &OpenAiConfig) -> Result<Self, GatewayError> {
        let endpoint = Self::endpoint(&config.base_url)?;

        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key);
        let auth_value = HeaderValue::from_str(&auth_value)
            .context("Invalid PRCOPILOT_OPENAI_API_KEY for Authorization header")?;
        headers.insert(AUTHORIZATION, auth_value);

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("prcopilot/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .context("Failed to build completion HTTP client")?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint_url(&self) -> &Url {
        &self.endpoint
    }

    fn endpoint(base_url: &str) -> Result<Url, GatewayError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base = Url::parse(&format!("{}/", trimmed))
            .map_err(|_| GatewayError::InvalidBaseUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidBaseUrl(base_url.to_string()));
        }
        base.join("chat/completions")
            .map_err(|_| GatewayError::InvalidBaseUrl(base_url.to_string()))
    }
}

impl CompletionGateway for OpenAiGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let body = ChatRequest {
            model: &request.model,
            temperature: request.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        log::debug!(
            "requesting completion from {} (model: {}, temperature: {})",
            self.endpoint,
            request.model,
            request.temperature
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .context("Completion request failed")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            log::warn!("completion API responded with status {}", status);
            return Err(GatewayError::ApiStatus { status, body });
        }

        let body = response.text().await.context("Completion response body")?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).context("Completion response JSON")?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(GatewayError::NoChoices)?;

        Ok(choice.message.content.unwrap_or_default())
    }
}
