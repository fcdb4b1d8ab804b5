//! Process entry point: load configuration, wire the memory/tool/runner
//! stack, and serve the cognitive cycle's single HTTP endpoint.

use agentcore::safety::rate_limiter::{RateLimiter, RateLimiterConfig};
use agentcore::{config::Settings, llm::LlmClient};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Placeholder LLM client wired at startup when no concrete provider is
/// configured. Always declines, surfacing clearly in `run_once`'s output
/// rather than silently fabricating a decision.
struct UnconfiguredLlmClient;

#[async_trait]
impl LlmClient for UnconfiguredLlmClient {
    async fn generate(&self, _prompt: &str, _system: Option<&str>) -> anyhow::Result<String> {
        anyhow::bail!("no LLM provider configured")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let settings = Arc::new(Settings::from_env().context("invalid configuration")?);
    info!(port = settings.port, "starting agentcore");

    let embedder: Arc<dyn agentcore::memory::EmbeddingProvider> =
        match agentcore::memory::FastEmbedProvider::new() {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                tracing::warn!("falling back to hash embedder: {}", e);
                Arc::new(agentcore::memory::HashEmbedder::default())
            }
        };

    let memory = Arc::new(agentcore::memory::MemoryManager::new(
        embedder,
        Arc::new(agentcore::memory::InMemoryVectorStore::new()),
        Arc::new(agentcore::memory::InMemoryMemoryRepository::new()),
    ));

    let tool_registry = Arc::new(agentcore::tools::ToolRegistry::new());

    let validator = Arc::new(agentcore::validation::OutputValidator::new(&serde_json::json!({
        "type": "object",
        "required": ["actionType"],
        "properties": {
            "actionType": { "type": "string", "minLength": 1 },
            "actionPayload": {},
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "reasoning": { "type": "string" }
        }
    }))?);

    let audit = Arc::new(agentcore::audit::AuditLogger::default());
    let llm: Arc<dyn LlmClient> = Arc::new(UnconfiguredLlmClient);

    let runner = Arc::new(agentcore::runner::RequestRunner::new(
        settings.clone(),
        memory,
        tool_registry,
        llm,
        validator,
        audit,
    ));

    let rate_limiter = Arc::new(RateLimiter::new(RateLimiterConfig::default()));

    let state = agentcore::server::AppState { runner, rate_limiter };
    agentcore::server::run_server(state, settings.port).await
}
