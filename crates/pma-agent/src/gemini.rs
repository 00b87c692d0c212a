//! Gemini REST client implementing [`Generator`].

use crate::error::LlmError;
use crate::generator::{GenerateOptions, Generated, Generator};
use async_trait::async_trait;
use pma_core::config::LlmConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from config, reading the key from `llm.api_key_env`.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self, LlmError> {
        if cfg.provider != "gemini" {
            return Err(LlmError::Config(format!(
                "unsupported provider '{}'",
                cfg.provider
            )));
        }
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Config(format!(
                    "environment variable {} is not set",
                    cfg.api_key_env
                ))
            })?;
        Self::new(
            cfg.base_url(),
            cfg.model.clone(),
            api_key,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiReplyContent>,
}

#[derive(Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Deserialize)]
struct GeminiReplyPart {
    #[serde(default)]
    text: Option<String>,
}

fn request_body<'a>(prompt: &'a str, options: &'a GenerateOptions) -> GeminiRequest<'a> {
    let generation_config = (options.response_mime_type.is_some()
        || options.response_schema.is_some())
    .then(|| GeminiGenerationConfig {
        response_mime_type: options.response_mime_type.as_deref(),
        response_schema: options.response_schema.as_ref(),
    });
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user",
            parts: vec![GeminiPart { text: prompt }],
        }],
        generation_config,
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate_content(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generated, LlmError> {
        tracing::debug!(model = %self.model, chars = prompt.chars().count(), "gemini request");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(prompt, options))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(Generated { text })
    }
}
