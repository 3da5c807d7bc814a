//! Language-model boundary.
//!
//! The engine needs exactly two operations from a model: a structured
//! parse (schema-constrained JSON) and a free-text completion. Both are
//! expressed on the [`LanguageModel`] trait; agents receive the client by
//! injection so tests can substitute a deterministic stub.
//!
//! The production implementation targets any OpenAI-compatible
//! chat-completions API. For structured calls it first requests JSON-object
//! response format and falls back to a plain completion, then recovers the
//! JSON payload from fenced code blocks or the outermost brace span.

use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::LlmConfig;
use crate::error::{LlmError, LlmResult};

/// The narrow boundary the agents depend on.
pub trait LanguageModel {
    /// Schema-constrained parse: returns a JSON instance of `schema`.
    fn structured(
        &self,
        model: &str,
        system: &str,
        user: &str,
        schema: &Value,
    ) -> impl Future<Output = LlmResult<Value>>;

    /// Free-text completion.
    fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> impl Future<Output = LlmResult<String>>;
}

/// Chat-completions client holding one credential for the whole run.
#[derive(Debug)]
pub struct ChatClient {
    client: reqwest::Client,
    url_chat: String,
    structured_temperature: f32,
    text_temperature: f32,
}

impl ChatClient {
    /// Build a client from config. The API key is read from the
    /// environment variable named by `cfg.api_key_env`; absence is a
    /// startup error.
    pub fn new(cfg: &LlmConfig) -> LlmResult<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(cfg.api_key_env.clone()))?;

        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(LlmError::InvalidEndpoint {
                endpoint: cfg.endpoint.clone(),
            });
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
                LlmError::BadApiKey {
                    var: cfg.api_key_env.clone(),
                }
            })?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .default_headers(headers)
            .build()?;

        let url_chat = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));
        info!(endpoint = %cfg.endpoint, timeout_secs = cfg.timeout_secs, "chat client initialized");

        Ok(Self {
            client,
            url_chat,
            structured_temperature: cfg.structured_temperature,
            text_temperature: cfg.text_temperature,
        })
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        json_mode: bool,
    ) -> LlmResult<String> {
        let started = Instant::now();
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        debug!(model, json_mode, prompt_len = user.len(), "POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(%status, %snippet, model, "chat completion returned non-success status");
            return Err(LlmError::HttpStatus {
                status,
                url: self.url_chat.clone(),
                snippet,
            });
        }

        let out: ChatResponse = resp.json().await?;
        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or(LlmError::EmptyChoices)?;

        info!(model, latency_ms = started.elapsed().as_millis() as u64, "chat completion done");
        Ok(content)
    }
}

impl LanguageModel for ChatClient {
    async fn structured(
        &self,
        model: &str,
        system: &str,
        user: &str,
        schema: &Value,
    ) -> LlmResult<Value> {
        let enhanced = format!(
            "{user}\n\nReturn a single JSON object strictly matching this schema. \
             Do not include any other text.\n\nSchema:\n{}",
            serde_json::to_string_pretty(schema).unwrap_or_default()
        );

        // JSON-object mode first; some endpoints reject it, so fall back
        // to a plain completion and recover the payload textually.
        let content = match self
            .chat(model, system, &enhanced, self.structured_temperature, true)
            .await
        {
            Ok(content) => content,
            Err(LlmError::HttpStatus { .. }) => {
                self.chat(model, system, &enhanced, self.structured_temperature, false)
                    .await?
            }
            Err(e) => return Err(e),
        };

        extract_json_object(&content)
    }

    async fn complete(&self, model: &str, system: &str, user: &str) -> LlmResult<String> {
        self.chat(model, system, user, self.text_temperature, false)
            .await
    }
}

/// Recover a JSON object from model output: direct parse, then fenced
/// code blocks, then the outermost brace span.
pub fn extract_json_object(content: &str) -> LlmResult<Value> {
    let trimmed = content.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() {
            return Ok(v);
        }
    }

    let unfenced = strip_code_fence(trimmed);
    if let Ok(v) = serde_json::from_str::<Value>(unfenced.trim()) {
        if v.is_object() {
            return Ok(v);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Ok(v);
                }
            }
        }
    }

    Err(LlmError::Schema {
        reason: "no JSON object found in response".to_string(),
        head: make_snippet(content),
    })
}

/// Trim common code-fence wrappers around JSON.
fn strip_code_fence(s: &str) -> &str {
    let mut t = s.trim();
    if let Some(rest) = t.strip_prefix("```json") {
        t = rest;
    } else if let Some(rest) = t.strip_prefix("```") {
        t = rest;
    } else {
        return t;
    }
    match t.rfind("```") {
        Some(pos) => &t[..pos],
        None => t,
    }
}

fn make_snippet(text: &str) -> String {
    text.chars().take(300).collect()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}
