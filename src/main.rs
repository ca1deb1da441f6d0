//! WotNot Agent - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the message generator and agent.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wotnot_agent::{api, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wotnot_agent=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, region={}, spec={}",
        config.llm.model_id,
        config.llm.region,
        config.messaging.spec_path.display()
    );

    api::serve(config).await?;

    Ok(())
}
