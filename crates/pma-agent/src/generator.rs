//! The generation capability every LLM provider implements.

use crate::error::LlmError;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub response_mime_type: Option<String>,
    pub response_schema: Option<Value>,
}

impl GenerateOptions {
    /// Strict JSON output, optionally constrained by a schema.
    pub fn json(schema: Option<Value>) -> Self {
        Self {
            response_mime_type: Some("application/json".to_string()),
            response_schema: schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_content(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generated, LlmError>;
}

/// Strip a surrounding markdown code fence, as models often add one in
/// JSON mode.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
