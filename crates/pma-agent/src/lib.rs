pub mod agentic;
pub mod error;
pub mod gemini;
pub mod generator;
pub mod orchestrator;
pub mod retry;

pub use error::{AgentError, ErrorKind, LlmError, Result};
pub use gemini::GeminiClient;
pub use generator::{GenerateOptions, Generated, Generator};
pub use orchestrator::{AutoFailure, AutoSummary, Orchestrator};
