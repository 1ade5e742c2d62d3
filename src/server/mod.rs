pub mod api;
pub mod ui;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::agent::Agent;
use crate::config::ServerConfig;
use crate::gateway::CompletionGateway;
use crate::session::SessionStore;

pub struct AppState<G> {
    pub agent: Agent<G>,
    pub sessions: SessionStore,
}

impl<G: CompletionGateway> AppState<G> {
    pub fn new(agent: Agent<G>, max_sessions: usize) -> Self {
        Self {
            agent,
            sessions: SessionStore::new(max_sessions),
        }
    }
}

pub fn router<G>(state: Arc<AppState<G>>, max_body_bytes: usize) -> Router
where
    G: CompletionGateway + 'static,
{
    Router::new()
        .route(
            "/api/evaluate",
            post(api::evaluate::<G>).fallback(api::method_not_allowed),
        )
        .route(
            "/api/generate",
            post(api::generate::<G>).fallback(api::method_not_allowed),
        )
        .route("/", get(ui::index::<G>))
        .route("/ui/evaluate", post(ui::evaluate::<G>))
        .route("/ui/generate", post(ui::generate::<G>))
        .route("/healthz", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

pub async fn serve<G>(config: &ServerConfig, agent: Agent<G>) -> anyhow::Result<()>
where
    G: CompletionGateway + 'static,
{
    let state = Arc::new(AppState::new(agent, config.max_sessions));
    let app = router(state, config.max_body_bytes);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Binding {}", config.bind_addr))?;
    log::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Serving HTTP")?;

    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("shutdown requested"),
        Err(err) => log::warn!("failed to listen for shutdown signal: {}", err),
    }
}
