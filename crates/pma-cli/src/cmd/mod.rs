pub mod agent;
pub mod auto;
pub mod change;
pub mod config;
pub mod doc;
pub mod impact;
pub mod init;
pub mod milestone;
pub mod roles;
pub mod status;
pub mod task;
pub mod track;

use anyhow::Context;
use pma_agent::{GeminiClient, Orchestrator};
use pma_core::config::Config;
use pma_core::project::{Project, ProjectPatch};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

pub(crate) fn load_project(root: &Path) -> anyhow::Result<Project> {
    Project::load(root).context("failed to load .pma/project.yaml")
}

pub(crate) fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load .pma/config.yaml")
}

/// Apply one patch and save.
pub(crate) fn commit(root: &Path, project: &mut Project, patch: ProjectPatch) -> anyhow::Result<()> {
    project.apply(patch, chrono::Utc::now())?;
    project.save(root).context("failed to save project")
}

/// An orchestrator backed by the configured Gemini client, persisting to `root`.
pub(crate) fn orchestrator(root: &Path, config: &Config) -> anyhow::Result<Orchestrator> {
    let client = GeminiClient::from_config(&config.llm).context("failed to configure the LLM client")?;
    Ok(Orchestrator::new(Arc::new(client), config).persist_to(root))
}

pub(crate) fn block_on<F: Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    Ok(rt.block_on(fut))
}
