//! OpenAI-compatible chat completions endpoint
//!
//! Works against OpenAI, OpenRouter and any server speaking the same
//! `/chat/completions` dialect (vLLM, Ollama, LM Studio).

use crate::*;
use reqwest::Client;
use serde_json::json;

/// Chat-completions client
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_key = api_key.into();
        let is_openrouter = api_key.starts_with("sk-or-");

        let api_base = api_base
            .filter(|b| !b.trim().is_empty())
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                if is_openrouter {
                    "https://openrouter.ai/api/v1".to_string()
                } else {
                    "https://api.openai.com/v1".to_string()
                }
            });

        let default_model = default_model.unwrap_or_else(|| "gpt-4o".to_string());

        Self {
            client: Client::new(),
            api_key,
            api_base,
            default_model,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": &m.content }))
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if !params.stop.is_empty() {
            body["stop"] = json!(params.stop);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let content = choice["message"]["content"]
            .as_str()
            .ok_or(ProviderError::InvalidResponse)?
            .to_string();
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let usage = match json["usage"].as_object() {
            Some(usage) => {
                let field = |name: &str| usage.get(name).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                Usage {
                    prompt_tokens: field("prompt_tokens"),
                    completion_tokens: field("completion_tokens"),
                    total_tokens: field("total_tokens"),
                }
            }
            None => Usage::default(),
        };

        Ok(ChatResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

/// Characters of a non-JSON error body kept in the message
const ERROR_BODY_PREVIEW: usize = 200;

/// Error for a failed request; gateways often answer with HTML or plain text
fn error_from_response(status: u16, body: &str) -> ProviderError {
    if status == 429 {
        return ProviderError::RateLimited;
    }
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string));
    ProviderError::Api(message.unwrap_or_else(|| {
        let text = body.trim();
        if text.is_empty() {
            format!("HTTP {}", status)
        } else {
            let preview: String = text.chars().take(ERROR_BODY_PREVIEW).collect();
            format!("HTTP {}: {}", status, preview)
        }
    }))
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }
        trace!("posting completion to {}", self.api_base);

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let mut parsed = self.parse_response(json)?;
        parsed.content = apply_stop(&parsed.content, &params.stop);
        debug!(
            "completion: {} chars, {} tokens",
            parsed.content.len(),
            parsed.usage.total_tokens
        );
        Ok(parsed)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
