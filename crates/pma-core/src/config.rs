use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

impl ConfigWarning {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_GEMINI_BASE_URL)
    }
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Hard cap on instructions plus context, in chars.
    #[serde(default = "default_payload_chars")]
    pub max_payload_chars: usize,
    #[serde(default = "default_payload_chars")]
    pub compaction_max_chars: usize,
    /// Retries after the first attempt, transient errors only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_auto_delay_ms")]
    pub auto_delay_ms: u64,
}

fn default_payload_chars() -> usize {
    20_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_auto_delay_ms() -> u64 {
    3000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_payload_chars: default_payload_chars(),
            compaction_max_chars: default_payload_chars(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            auto_delay_ms: default_auto_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_task_iterations")]
    pub task_max_iterations: u32,
    #[serde(default = "default_change_iterations")]
    pub change_max_iterations: u32,
}

fn default_task_iterations() -> u32 {
    20
}

fn default_change_iterations() -> u32 {
    50
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            task_max_iterations: default_task_iterations(),
            change_max_iterations: default_change_iterations(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            project: project_name.into(),
            llm: LlmConfig::default(),
            generation: GenerationConfig::default(),
            agents: AgentsConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        crate::io::load_yaml(&paths::config_path(root))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::save_yaml(&paths::config_path(root), self)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.llm.provider != "gemini" {
            warnings.push(ConfigWarning::error(format!(
                "unknown llm provider '{}' (supported: gemini)",
                self.llm.provider
            )));
        }
        if self.llm.model.trim().is_empty() {
            warnings.push(ConfigWarning::error("llm.model is empty"));
        }
        if self.llm.timeout_secs == 0 {
            warnings.push(ConfigWarning::warning(
                "llm.timeout_secs is 0: requests will fail immediately",
            ));
        }

        if self.generation.max_payload_chars < 1000 {
            warnings.push(ConfigWarning::warning(format!(
                "generation.max_payload_chars={} leaves almost no room for context",
                self.generation.max_payload_chars
            )));
        }
        if self.generation.compaction_max_chars < 1000 {
            warnings.push(ConfigWarning::warning(format!(
                "generation.compaction_max_chars={} will truncate most documents",
                self.generation.compaction_max_chars
            )));
        }
        if self.generation.max_retries > 10 {
            warnings.push(ConfigWarning::warning(format!(
                "generation.max_retries={} (>10 is unusual)",
                self.generation.max_retries
            )));
        }

        if self.agents.task_max_iterations == 0 {
            warnings.push(ConfigWarning::warning(
                "agents.task_max_iterations is 0: task agents will never run",
            ));
        }
        if self.agents.change_max_iterations == 0 {
            warnings.push(ConfigWarning::warning(
                "agents.change_max_iterations is 0: change requests will never apply",
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
