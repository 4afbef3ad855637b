//! Native Gemini client for food analysis and label extraction.
//!
//! Auth priority: config `api_key` → `GEMINI_API_KEY` → `GOOGLE_API_KEY` →
//! config `access_token` (bearer).
//!
//! Analysis requests run with deterministic settings (temperature 0, top-p 1,
//! top-k 1) and ask for `application/json` output. Label extraction sends the
//! image inline as base64 followed by the extraction prompt.
//!
//! Thinking models return parts tagged `thought: true`; those are dropped
//! and only the final text is returned.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::error::{CleanBitesError, Result};

use super::{CompletionClient, TextExtractor};

/// Gemini v1beta REST API base.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Output token cap for analysis requests.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 9192;

// ── Auth ─────────────────────────────────────────────────────────────────────

/// Authentication method for the Gemini REST API.
pub enum GeminiAuth {
    /// Standard API key, sent as `?key=` query parameter.
    ApiKey(String),
    /// OAuth bearer token, sent as `Authorization: Bearer` header.
    BearerToken(String),
}

impl std::fmt::Debug for GeminiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("GeminiAuth::ApiKey([REDACTED])"),
            Self::BearerToken(_) => f.write_str("GeminiAuth::BearerToken([REDACTED])"),
        }
    }
}

impl GeminiAuth {
    /// Resolve credentials in priority order, ignoring empty values.
    pub fn resolve(
        explicit_key: Option<&str>,
        env_key: Option<&str>,
        access_token: Option<&str>,
    ) -> Option<Self> {
        if let Some(k) = explicit_key.filter(|k| !k.is_empty()) {
            return Some(Self::ApiKey(k.to_string()));
        }
        if let Some(k) = env_key.filter(|k| !k.is_empty()) {
            return Some(Self::ApiKey(k.to_string()));
        }
        access_token
            .filter(|t| !t.is_empty())
            .map(|t| Self::BearerToken(t.to_string()))
    }
}

/// Token counts reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// Gemini `generateContent` client.
pub struct GeminiProvider {
    auth: GeminiAuth,
    model: String,
    api_base: String,
    max_output_tokens: u32,
    client: Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("auth", &self.auth)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GeminiProvider {
    /// Build a provider that authenticates with an API key.
    pub fn new_with_key(api_key: &str, model: &str) -> Result<Self> {
        Ok(Self {
            auth: GeminiAuth::ApiKey(api_key.to_string()),
            model: model.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            client: Self::build_client(Duration::from_secs(120))?,
        })
    }

    /// Build from configuration, falling back to `GEMINI_API_KEY` /
    /// `GOOGLE_API_KEY`.
    ///
    /// Returns `Ok(None)` when no credentials are available.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>> {
        let env_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok();

        let Some(auth) = GeminiAuth::resolve(
            config.api_key.as_deref(),
            env_key.as_deref(),
            config.access_token.as_deref(),
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            auth,
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_output_tokens: config.max_output_tokens,
            client: Self::build_client(Duration::from_secs(config.request_timeout_secs))?,
        }))
    }

    fn build_client(timeout: Duration) -> Result<Client> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CleanBitesError::Config(format!("failed to build HTTP client: {e}")))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body for a JSON-mode analysis prompt.
    pub fn build_completion_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": 0.0,
                "topP": 1.0,
                "topK": 1,
                "maxOutputTokens": self.max_output_tokens,
                "responseMimeType": "application/json"
            }
        })
    }

    /// Request body for reading a label image: the image first, then the
    /// extraction prompt.
    pub fn build_extraction_body(&self, image: &[u8], mime_type: &str, prompt: &str) -> Value {
        let data = base64::engine::general_purpose::STANDARD.encode(image);
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": mime_type, "data": data } },
                    { "text": "\n\n" },
                    { "text": prompt }
                ]
            }],
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens
            }
        })
    }

    /// Extract final answer text from a Gemini API response.
    ///
    /// Falls back to thought text when no final parts exist.
    pub fn response_text(response: &Value) -> Option<String> {
        let parts = response["candidates"][0]["content"]["parts"].as_array()?;

        let final_parts: Vec<&str> = parts
            .iter()
            .filter(|p| !p["thought"].as_bool().unwrap_or(false))
            .filter_map(|p| p["text"].as_str())
            .collect();

        if !final_parts.is_empty() {
            return Some(final_parts.join(""));
        }

        let thought_parts: Vec<&str> = parts.iter().filter_map(|p| p["text"].as_str()).collect();

        if !thought_parts.is_empty() {
            Some(thought_parts.join(""))
        } else {
            None
        }
    }

    /// Parse token usage from a Gemini response if available.
    pub fn response_usage(response: &Value) -> Option<TokenUsage> {
        let meta = response.get("usageMetadata")?;
        Some(TokenUsage {
            prompt_tokens: u32::try_from(meta["promptTokenCount"].as_u64()?).ok()?,
            completion_tokens: u32::try_from(meta["candidatesTokenCount"].as_u64()?).ok()?,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            GeminiAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
            GeminiAuth::BearerToken(token) => request.bearer_auth(token),
        }
    }

    /// POST `body` to `generateContent` and return the answer text.
    async fn generate(&self, body: &Value) -> Result<String> {
        debug!(model = %self.model, "Gemini generateContent request");

        let request = self.apply_auth(self.client.post(self.api_url()).json(body));
        let response = request
            .send()
            .await
            .map_err(|e| CleanBitesError::Provider(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let json: Value = response.json().await.map_err(|e| {
                CleanBitesError::Provider(format!("Failed to parse Gemini response: {e}"))
            })?;
            if let Some(usage) = Self::response_usage(&json) {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Gemini usage"
                );
            }
            return Self::response_text(&json).ok_or_else(|| {
                CleanBitesError::Provider("Gemini response contained no text".into())
            });
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(CleanBitesError::Provider(Self::error_message(
            status.as_u16(),
            &error_text,
        )))
    }

    /// Human-readable message from a Gemini error body.
    fn error_message(status: u16, body: &str) -> String {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or_else(|| body.to_string());
        format!("Gemini API error ({status}): {detail}")
    }
}

/// Label extraction pairs the provider with its extraction prompt.
pub struct GeminiExtractor {
    provider: std::sync::Arc<GeminiProvider>,
    prompt: String,
}

impl GeminiExtractor {
    pub fn new(provider: std::sync::Arc<GeminiProvider>, prompt: impl Into<String>) -> Self {
        Self {
            provider,
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate(&self.build_completion_body(prompt)).await
    }
}

#[async_trait]
impl TextExtractor for GeminiExtractor {
    async fn extract_text(&self, image: &[u8], mime_type: &str) -> Result<String> {
        let body = self
            .provider
            .build_extraction_body(image, mime_type, &self.prompt);
        self.provider.generate(&body).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
