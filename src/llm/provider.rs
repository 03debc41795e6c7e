use async_trait::async_trait;

use crate::types::AppResult;

/// One analysis call to the remote AI service.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 1500,
            temperature: 0.3,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// The external collaborator performing content analysis. Treated as an
/// opaque remote call; the worker owns the timeout around it.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<String>;

    /// False for the degraded mock used when no API key is configured.
    fn is_live(&self) -> bool {
        true
    }
}
