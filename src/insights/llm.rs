use std::{env, time::Duration};

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::InsightsConfig,
    insights::{InsightError, LanguageModel},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
pub struct ChatClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatClient {
    /// Builds a client whose key comes from the environment variable named in
    /// `config`.
    pub fn from_config(config: &InsightsConfig) -> Result<Self, InsightError> {
        let api_key = env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| InsightError::MissingApiKey(config.api_key_env.clone()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| InsightError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

impl LanguageModel for ChatClient {
    fn complete(&self, system: &str, user: &str) -> Result<String, InsightError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        debug!("POST {} (model {})", self.endpoint, self.model);
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|err| InsightError::Transport(err.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|err| InsightError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(InsightError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_completion(&text)
    }
}

/// Content of the first choice of a chat-completion response body.
pub fn parse_completion(body: &str) -> Result<String, InsightError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|err| InsightError::Malformed(err.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(InsightError::EmptyCompletion)
}
