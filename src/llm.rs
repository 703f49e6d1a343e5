use crate::config::{LlmAuth, LlmConfig};
use crate::error::{ChatSqlError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sampling parameters forwarded to the model endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Sampling randomness
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    /// Output length cap
    pub max_tokens: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.95,
            max_tokens: 2000,
        }
    }
}

/// Anything that can turn an instruction plus system message into a completion
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn send_request(
        &self,
        instruction: &str,
        system_message: &str,
        parameters: &GenerationParameters,
    ) -> Result<String>;
}

#[async_trait]
impl<T> ChatCompletion for Arc<T>
where
    T: ChatCompletion + ?Sized,
{
    async fn send_request(
        &self,
        instruction: &str,
        system_message: &str,
        parameters: &GenerationParameters,
    ) -> Result<String> {
        (**self)
            .send_request(instruction, system_message, parameters)
            .await
    }
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Request body for one instruction
    pub fn build_body(
        &self,
        instruction: &str,
        system_message: &str,
        parameters: &GenerationParameters,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": [
                {"role": "system", "content": system_message},
                {"role": "user", "content": instruction}
            ],
            "temperature": parameters.temperature,
            "top_p": parameters.top_p,
            "max_tokens": parameters.max_tokens,
        });

        if let Some(model) = &self.config.model {
            body["model"] = serde_json::json!(model);
        }

        body
    }

    /// Pull the completion text out of a chat-completions response
    pub fn extract_content(response_json: &serde_json::Value) -> Result<String> {
        if let Some(error) = response_json.get("error") {
            return Err(ChatSqlError::Llm(format!("LLM API error: {}", error)));
        }

        let choices = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ChatSqlError::Llm(format!(
                    "No choices array in LLM response. Response: {}",
                    response_json
                ))
            })?;

        let first = choices.first().ok_or_else(|| {
            ChatSqlError::Llm(format!(
                "Empty choices array in LLM response. Response: {}",
                response_json
            ))
        })?;

        match first.get("finish_reason").and_then(|r| r.as_str()) {
            Some("length") => warn!("LLM response was truncated due to length limit"),
            Some("content_filter") => {
                return Err(ChatSqlError::Llm(
                    "LLM response was filtered by content policy".to_string(),
                ));
            }
            _ => {}
        }

        let content = first["message"]["content"].as_str().ok_or_else(|| {
            ChatSqlError::Llm(format!(
                "No content in LLM response. Response: {}",
                response_json
            ))
        })?;

        if content.is_empty() {
            return Err(ChatSqlError::Llm(format!(
                "Empty content in LLM response. Response: {}",
                response_json
            )));
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl ChatCompletion for LlmClient {
    async fn send_request(
        &self,
        instruction: &str,
        system_message: &str,
        parameters: &GenerationParameters,
    ) -> Result<String> {
        let body = self.build_body(instruction, system_message, parameters);
        debug!("Sending LLM request to {}", self.config.url);

        let request = self.client.post(&self.config.url).json(&body);
        let request = match self.config.auth {
            LlmAuth::ApiKeyHeader => request.header("api-key", &self.config.api_key),
            LlmAuth::Bearer => request.bearer_auth(&self.config.api_key),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ChatSqlError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChatSqlError::Llm(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChatSqlError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = Self::extract_content(&response_json)?;
        debug!("LLM returned {} characters", content.len());
        Ok(content)
    }
}
