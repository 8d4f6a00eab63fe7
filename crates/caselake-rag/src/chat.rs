use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use caselake_core::config::ChatConfig;
use caselake_core::traits::ChatModel;
use caselake_core::{Error, Result};
use caselake_embed::openai::{api_key_from_env, http_client, post_json};

const PROVIDER: &str = "chat";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiChat {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(base_url: &str, api_key: String, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Self::new(&config.base_url, api_key, &config.model, Duration::from_secs(config.timeout_secs))
    }
}

impl ChatModel for OpenAiChat {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message { role: "system", content: system_prompt },
                Message { role: "user", content: user_prompt },
            ],
        };
        let res: ChatResponse = post_json(&self.client, &self.url, &self.api_key, &body, PROVIDER)?;
        debug!(model = %self.model, choices = res.choices.len(), "chat completion");
        res.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::provider(PROVIDER, "response has no message content", false))
    }
}
