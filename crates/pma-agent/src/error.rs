use pma_core::PmaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider returned no text")]
    EmptyResponse,

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("provider configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::Decode(e.to_string())
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}

/// Coarse failure class, used for retry decisions and user messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidApiKey,
    RateLimited,
    Transient,
    Other,
}

impl LlmError {
    /// Classified by substring on the error text first, then by variant.
    pub fn kind(&self) -> ErrorKind {
        let text = self.to_string().to_lowercase();
        if text.contains("api key not valid") {
            return ErrorKind::InvalidApiKey;
        }
        if text.contains("429") || text.contains("quota") || text.contains("rate limit") {
            return ErrorKind::RateLimited;
        }
        match self {
            LlmError::Http { status, .. } if *status >= 500 => ErrorKind::Transient,
            LlmError::Transport(_) | LlmError::Timeout => ErrorKind::Transient,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Message shown to the user when a document fails.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::InvalidApiKey => {
                "The LLM API key is not valid. Check the variable named by llm.api_key_env."
                    .to_string()
            }
            ErrorKind::RateLimited => {
                "The LLM provider rate limit or quota was reached. Wait a minute and retry."
                    .to_string()
            }
            ErrorKind::Transient => {
                format!("The LLM provider is temporarily unavailable ({self}). Try again shortly.")
            }
            ErrorKind::Other => format!("Generation failed: {self}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Core(#[from] PmaError),
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Llm(e) => e.user_message(),
            AgentError::Core(e) => e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
