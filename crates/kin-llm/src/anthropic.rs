//! HTTP client for the Anthropic Messages API, used as the LLM fallback
//! collaborator (spec §4.9's "LLM fallback" path).

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::traits::{CollaboratorError, Llm};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            anyhow::bail!("Anthropic API key is empty");
        }

        let http = Client::builder()
            .build()
            .context("failed to build Anthropic HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Llm for AnthropicClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, CollaboratorError> {
        let body = json!({
            "model": self.model,
            "system": system_prompt,
            "messages": [{
                "role": "user",
                "content": [{ "type": "text", "text": user_prompt }],
            }],
            "max_tokens": max_tokens,
        });

        debug!(model = %self.model, max_tokens, "sending completion request");

        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("failed to send request to Anthropic")
            .map_err(CollaboratorError::Failed)?;

        let status = response.status();
        let payload = response
            .json::<Value>()
            .await
            .context("failed to decode Anthropic JSON response")
            .map_err(CollaboratorError::Failed)?;

        if !status.is_success() {
            warn!(%status, body = %payload, "Anthropic returned an error status");
            return Err(CollaboratorError::Failed(anyhow!(
                "Anthropic responded with status {}: {}",
                status,
                payload
            )));
        }

        extract_content(&payload)
            .ok_or_else(|| CollaboratorError::Failed(anyhow!("response had no text content")))
    }
}

fn extract_content(payload: &Value) -> Option<String> {
    let array = payload.get("content")?.as_array()?;
    let mut buffer = String::new();
    for item in array {
        if let Some(text) = item.get("text").and_then(Value::as_str) {
            buffer.push_str(text);
        }
    }
    if buffer.is_empty() {
        None
    } else {
        Some(buffer)
    }
}
