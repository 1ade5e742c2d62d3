use anyhow::Context;
use env_logger::Env;
use prcopilot::agent::Agent;
use prcopilot::config::AppConfig;
use prcopilot::gateway::OpenAiGateway;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse the specified (or default) .env file
    let dotenv_path = env::var("PRCOPILOT_DOTENV_PATH").unwrap_or_else(|_| ".env".to_string());
    let dotenv_result = dotenvy::from_path(&dotenv_path);

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match dotenv_result {
        Ok(()) => log::info!("loaded env from {}", dotenv_path),
        Err(err) => log::debug!("no .env loaded from {}: {}", dotenv_path, err),
    }

    let config = AppConfig::from_env().context("Reading configuration")?;
    let gateway = OpenAiGateway::new(&config.openai).context("Building completion client")?;
    log::info!(
        "using model {} at {}",
        config.openai.model,
        gateway.endpoint_url()
    );

    let agent = Agent::new(gateway, config.openai.model.clone());
    prcopilot::server::serve(&config.server, agent).await
}
