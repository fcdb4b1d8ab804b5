//! LLM client boundary.
//!
//! Minimized from this codebase's `LLMProvider` (which also carries
//! streaming and model-name routing): the cognitive cycle needs exactly
//! one synchronous-looking call per cycle iteration. Provider adapters
//! themselves are out of scope here — concrete implementations (OpenAI,
//! Anthropic, a local model) live outside this crate and are injected.

use async_trait::async_trait;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str, system: Option<&str>) -> anyhow::Result<String>;
}

#[cfg(test)]
pub struct EchoLlmClient;

#[cfg(test)]
#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn generate(&self, prompt: &str, _system: Option<&str>) -> anyhow::Result<String> {
        Ok(format!(r#"{{"actionType": "reply", "actionPayload": {{"text": "{}"}}}}"#, prompt.replace('"', "'")))
    }
}
