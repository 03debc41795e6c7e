// DeepSeek chat-completions adapter
// API Reference: https://api-docs.deepseek.com/

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::{Analyzer, CompletionRequest};
use crate::types::{AppError, AppResult};

pub struct DeepSeekAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl DeepSeekAdapter {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn classify_failure(status: reqwest::StatusCode, message: &str) -> AppError {
        let lowered = message.to_lowercase();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || lowered.contains("authentication")
            || lowered.contains("invalid api key")
        {
            return AppError::RemoteService(format!(
                "API key error: {message}. Get your DeepSeek API key and add it to .env as DEEPSEEK_API_KEY, then restart."
            ));
        }
        AppError::RemoteService(format!("DeepSeek API error ({status}): {message}"))
    }
}

#[async_trait]
impl Analyzer for DeepSeekAdapter {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::RemoteService(format!("DeepSeek request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(Self::classify_failure(status, &parsed.error.message));
            }
            return Err(Self::classify_failure(status, &error_text));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::RemoteService(format!("Failed to parse DeepSeek response: {e}")))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::RemoteService("DeepSeek returned no choices".to_string()))?;

        Ok(choice.message.content)
    }
}
