#![allow(dead_code)]

use async_trait::async_trait;
use pma_agent::{GenerateOptions, Generated, Generator, LlmError};
use pma_core::config::Config;
use pma_core::prompts::COMPACTION_INSTRUCTION;
use std::sync::{Arc, Mutex};

type Respond = dyn Fn(&str) -> Result<String, LlmError> + Send + Sync;

/// A generator that answers from a closure and records every prompt.
pub struct FakeGenerator {
    respond: Box<Respond>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(respond: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Answers document and compaction prompts with canned content.
    pub fn documents() -> Arc<Self> {
        Self::new(|prompt| Ok(document_reply(prompt)))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate_content(&self, prompt: &str, _options: &GenerateOptions) -> Result<Generated, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.respond)(prompt).map(|text| Generated { text })
    }
}

pub const PLANS: &str = "## Tasks\n\
| Task Name | Role | Start Date (YYYY-MM-DD) | End Date (YYYY-MM-DD) | Dependencies | Sprint | Subcontractor |\n\
|---|---|---|---|---|---|---|\n\
| Design | Architect | 2024-03-01 | 2024-03-05 | | Sprint 1 | No |\n\
| Build | Engineer | 2024-03-06 | 2024-03-20 | Design | Sprint 1 | Yes |\n\
\n## Milestones\n\
| Milestone Name | Date (YYYY-MM-DD) |\n\
|---|---|\n\
| MVP | 2024-03-20 |\n";

pub const COMPACTED: &str = "compacted: facts only";

pub fn is_compaction(prompt: &str) -> bool {
    prompt.starts_with(COMPACTION_INSTRUCTION)
}

pub fn writes(prompt: &str, title: &str) -> bool {
    prompt.contains(&format!("Document to write: \"{title}\""))
}

pub fn document_reply(prompt: &str) -> String {
    if is_compaction(prompt) {
        COMPACTED.to_string()
    } else if writes(prompt, "Detailed Plans") {
        PLANS.to_string()
    } else {
        "# Generated\n\nBody text.".to_string()
    }
}

/// Config with no delays so tests run instantly.
pub fn fast_config() -> Config {
    let mut cfg = Config::new("apollo");
    cfg.generation.auto_delay_ms = 0;
    cfg.generation.initial_backoff_ms = 1;
    cfg.generation.max_retries = 0;
    cfg
}

pub fn invalid_key() -> LlmError {
    LlmError::Http {
        status: 400,
        body: "API key not valid. Please pass a valid API key.".into(),
    }
}
