use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Trait for hosted chat-completion models
///
/// The recommendation service only needs one shape of call: a system prompt
/// fixing the output contract, a user prompt describing taste, and a JSON
/// payload back.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one chat completion in JSON mode and return the raw content string
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String>;

    /// Model name for logging and debugging
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completion client
#[derive(Clone)]
pub struct OpenAiChat {
    http_client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key,
            api_url,
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiChat {
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.7,
            "response_format": {"type": "json_object"}
        });

        let url = format!("{}/chat/completions", self.api_url);
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Chat API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response.json().await?;
        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ExternalApi("Chat API returned no choices".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
