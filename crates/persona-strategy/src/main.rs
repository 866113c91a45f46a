mod compose;
mod config;
mod error;
mod matcher;
mod model;
mod parser;
mod prompt;
mod ranker;
mod server;
mod session;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use persona_common::embedding::Embedder;
use persona_common::gemini::{GeminiClient, GeminiClientConfig};
use persona_common::generation::Generator;
use server::PersonaStrategyServer;
use session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting persona-strategy MCP server");

    let config = Config::from_env()?;
    let gemini_config = GeminiClientConfig::from_env();
    info!(
        base_url = %gemini_config.base_url,
        embedding_model = %gemini_config.embedding_model,
        generation_model = %gemini_config.generation_model,
        api_key = config.api_key.is_some(),
        threshold = config.policy.threshold,
        "configuration loaded"
    );

    let client = GeminiClient::new(gemini_config)?;
    let embedder = Arc::new(Embedder::new(client.clone()));
    let generator = Arc::new(Generator::new(client));

    let server = PersonaStrategyServer::new(
        Session::new(config.api_key),
        embedder,
        generator,
        config.policy,
    );

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
