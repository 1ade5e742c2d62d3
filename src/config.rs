use crate::gateway::OpenAiConfig;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    #[serde(flatten)]
    pub openai: OpenAiConfig,
    #[serde(flatten)]
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(envy::prefixed("PRCOPILOT_").from_env::<AppConfig>()?)
    }
}

fn deserialize_usize_or<'de, D>(deserializer: D, fallback: usize) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.filter(|v| !v.trim().is_empty()) {
        Some(s) => s.trim().parse::<usize>().map_err(serde::de::Error::custom),
        None => Ok(fallback),
    }
}

fn deserialize_max_body_bytes<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_usize_or(deserializer, default_max_body_bytes())
}

fn deserialize_max_sessions<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_usize_or(deserializer, default_max_sessions())
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(
        default = "default_max_body_bytes",
        deserialize_with = "deserialize_max_body_bytes"
    )]
    pub max_body_bytes: usize,
    #[serde(
        default = "default_max_sessions",
        deserialize_with = "deserialize_max_sessions"
    )]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_max_sessions() -> usize {
    1024
}
