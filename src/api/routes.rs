//! HTTP route definitions and server startup.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::types::HealthResponse;
use super::{agent, auth, message};
use crate::agent::{Agent, AgentRunner};
use crate::config::Config;
use crate::llm::{BedrockClient, LlmClient};
use crate::message::MessageGenerator;
use crate::openapi::OpenApiSpec;
use crate::tools::OpenApiToolkit;

/// Process-wide shared state, built once at startup.
pub struct AppState {
    pub config: Config,
    pub generator: MessageGenerator,
    pub agent: Arc<dyn AgentRunner>,
}

impl AppState {
    pub fn new(config: Config, llm: Arc<dyn LlmClient>, agent: Arc<dyn AgentRunner>) -> Self {
        Self {
            config,
            generator: MessageGenerator::new(llm),
            agent,
        }
    }

    /// Build the production state: Bedrock client, OpenAPI toolset and agent.
    ///
    /// # Errors
    ///
    /// Fails if the OpenAPI document is missing or malformed, or if a client
    /// cannot be constructed. Both are fatal to startup.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let spec = OpenApiSpec::from_file(&config.messaging.spec_path)?
            .with_base_url(config.messaging.base_url.clone());
        let toolkit = OpenApiToolkit::from_spec(&spec, config.messaging.token.clone())?;
        let tools = toolkit.get_tools();
        info!(
            spec = %config.messaging.spec_path.display(),
            title = spec.title.as_deref().unwrap_or("untitled"),
            operations = tools.len(),
            "Loaded messaging API toolset"
        );

        let llm: Arc<dyn LlmClient> = Arc::new(BedrockClient::new(config.llm.clone())?);
        info!(
            model = %config.llm.model_id,
            region = %config.llm.region,
            "Configured Bedrock client"
        );

        let agent = Arc::new(Agent::new(
            llm.clone(),
            tools,
            &config.messaging.base_url,
            config.max_iterations,
        ));

        Ok(Self::new(config, llm, agent))
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/generate-message/", post(message::generate_message))
        .route("/generate-message", post(message::generate_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let public = Router::new()
        .route("/run-agent/", post(agent::run_agent))
        .route("/run-agent", post(agent::run_agent))
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login));

    public
        .merge(protected)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::from_config(config)?);

    if !state.config.auth.auth_required(state.config.dev_mode) {
        tracing::warn!("Authentication is disabled (dev mode or missing secrets)");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// GET /api/health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
