//! Document generation pipeline.
//!
//! Every state change goes through [`Project::apply`] and, when a root is
//! set, is written to `.pma/project.yaml` before the next LLM call. A crash
//! therefore leaves the document in a persisted stage that
//! [`Orchestrator::resume`] can pick up.

use crate::agentic::{self, AgentOutcome, ChangeBrief, ChangeDocument, ChangeOutcome, TaskBrief};
use crate::error::{LlmError, Result};
use crate::generator::{strip_code_fence, GenerateOptions, Generator};
use crate::retry::{self, RetryPolicy};
use chrono::Utc;
use pma_core::config::{AgentsConfig, Config, GenerationConfig};
use pma_core::context::{truncate_chars, ContextAssembler};
use pma_core::document::Document;
use pma_core::hmap;
use pma_core::project::{Project, ProjectPatch, TrackingOutcome};
use pma_core::prompts::{self, PromptInput, COMPACTION_INSTRUCTION};
use pma_core::types::{AgentStatus, ChangeStatus, GenerationStage};
use pma_core::workflow::{self, ResumeStep};
use pma_core::PmaError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct AutoFailure {
    pub doc_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoSummary {
    pub approved: Vec<String>,
    pub failure: Option<AutoFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingOutcome>,
}

#[derive(Debug, Deserialize)]
struct ProposedDocument {
    title: String,
    phase: u8,
    #[serde(default)]
    sequence: u32,
}

pub struct Orchestrator {
    generator: Arc<dyn Generator>,
    root: Option<PathBuf>,
    generation: GenerationConfig,
    agents: AgentsConfig,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn Generator>, config: &Config) -> Self {
        Self {
            generator,
            root: None,
            generation: config.generation.clone(),
            agents: config.agents.clone(),
        }
    }

    /// Persist the project under `root` after every patch.
    pub fn persist_to(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.generation)
    }

    fn save(&self, project: &Project) -> Result<()> {
        if let Some(root) = &self.root {
            project.save(root)?;
        }
        Ok(())
    }

    fn commit(&self, project: &mut Project, patch: ProjectPatch) -> Result<()> {
        project.apply(patch, Utc::now())?;
        self.save(project)
    }

    fn fail(&self, project: &mut Project, doc_id: &str, version: u32, error: LlmError) -> Result<()> {
        tracing::warn!(doc = %doc_id, error = %error, "document generation failed");
        self.commit(
            project,
            ProjectPatch::GenerationFailed {
                doc_id: doc_id.to_string(),
                version,
                message: error.user_message(),
            },
        )?;
        Err(error.into())
    }

    // -----------------------------------------------------------------------
    // Prompts
    // -----------------------------------------------------------------------

    /// The full generation prompt for `doc_id`, context included.
    pub fn document_prompt(&self, project: &Project, doc_id: &str) -> Result<String> {
        let doc = project.document(doc_id)?;
        let category = doc.category();
        let input = PromptInput {
            project_name: &project.name,
            project_description: &project.description,
            document_title: &doc.title,
            phase: doc.phase,
            context: "",
        };
        let instructions = prompts::instructions(category, &input);
        let context = ContextAssembler::new(self.generation.max_payload_chars).assemble(
            doc,
            &project.documents,
            &project.phase_data,
            &instructions,
        );
        tracing::debug!(
            doc = %doc_id,
            %category,
            instructions = instructions.chars().count(),
            context = context.chars().count(),
            "document prompt assembled"
        );
        Ok(prompts::render(category, &PromptInput { context: &context, ..input }))
    }

    fn compaction_prompt(&self, doc_id: &str, content: &str) -> String {
        let budget = self
            .generation
            .compaction_max_chars
            .saturating_sub(COMPACTION_INSTRUCTION.chars().count());
        let body = truncate_chars(content, budget);
        if body.len() < content.len() {
            tracing::warn!(
                doc = %doc_id,
                original = content.chars().count(),
                kept = budget,
                "content truncated for compaction"
            );
        }
        prompts::compaction(body)
    }

    // -----------------------------------------------------------------------
    // Generate / compact / approve / reject / resume
    // -----------------------------------------------------------------------

    /// Generate then compact one document.
    pub async fn generate(&self, project: &mut Project, doc_id: &str) -> Result<()> {
        self.commit(
            project,
            ProjectPatch::BeginGeneration {
                doc_id: doc_id.to_string(),
            },
        )?;
        let version = project.document(doc_id)?.version;
        let prompt = self.document_prompt(project, doc_id)?;
        tracing::info!(doc = %doc_id, version, chars = prompt.chars().count(), "generating document");

        let generated = retry::generate(
            self.generator.as_ref(),
            self.policy(),
            &prompt,
            &GenerateOptions::default(),
        )
        .await;
        match generated {
            Ok(g) => self.commit(
                project,
                ProjectPatch::GenerationSucceeded {
                    doc_id: doc_id.to_string(),
                    version,
                    content: g.text,
                },
            )?,
            Err(e) => return self.fail(project, doc_id, version, e),
        }
        self.compact(project, doc_id).await
    }

    /// Compact the current content of a document.
    pub async fn compact(&self, project: &mut Project, doc_id: &str) -> Result<()> {
        let doc = project.document(doc_id)?;
        let version = doc.version;
        if doc.stage != Some(GenerationStage::Compacting) {
            self.commit(
                project,
                ProjectPatch::BeginCompaction {
                    doc_id: doc_id.to_string(),
                    version,
                },
            )?;
        }
        let content = project
            .data(doc_id)
            .map(|d| d.content.clone())
            .ok_or_else(|| PmaError::MissingContent(doc_id.to_string()))?;
        let prompt = self.compaction_prompt(doc_id, &content);

        let compacted = retry::generate(
            self.generator.as_ref(),
            self.policy(),
            &prompt,
            &GenerateOptions::default(),
        )
        .await;
        match compacted {
            Ok(g) => {
                self.commit(
                    project,
                    ProjectPatch::CompactionSucceeded {
                        doc_id: doc_id.to_string(),
                        version,
                        compacted: g.text,
                    },
                )?;
                tracing::info!(doc = %doc_id, version, "document ready for review");
                Ok(())
            }
            Err(e) => self.fail(project, doc_id, version, e),
        }
    }

    pub fn approve(&self, project: &mut Project, doc_id: &str) -> Result<TrackingOutcome> {
        let outcome = project.approve_document(doc_id, Utc::now())?;
        self.save(project)?;
        if let TrackingOutcome::Built { tasks, milestones } = &outcome {
            tracing::info!(tasks, milestones, "all documents approved, tracking created");
        }
        Ok(outcome)
    }

    pub fn reject(&self, project: &mut Project, doc_id: &str) -> Result<()> {
        self.commit(
            project,
            ProjectPatch::Reject {
                doc_id: doc_id.to_string(),
            },
        )
    }

    /// Finish an interrupted run. Returns false when there was nothing to do.
    pub async fn resume(&self, project: &mut Project, doc_id: &str) -> Result<bool> {
        let doc = project.document(doc_id)?;
        match workflow::resume_step(doc, project.data(doc_id)) {
            Some(ResumeStep::Generate) => self.generate(project, doc_id).await?,
            Some(ResumeStep::Compact) => self.compact(project, doc_id).await?,
            None => return Ok(false),
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Auto mode
    // -----------------------------------------------------------------------

    /// Generate, compact and approve every unapproved document in order,
    /// stopping at the first failure.
    pub async fn auto(&self, project: &mut Project) -> AutoSummary {
        let pending: Vec<String> = project
            .ordered_documents()
            .into_iter()
            .filter(|d| !d.is_approved())
            .map(|d| d.id.clone())
            .collect();
        let mut summary = AutoSummary::default();

        for (i, doc_id) in pending.iter().enumerate() {
            if i > 0 && self.generation.auto_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.generation.auto_delay_ms)).await;
            }
            tracing::info!(doc = %doc_id, step = i + 1, total = pending.len(), "auto mode");
            match self.auto_step(project, doc_id).await {
                Ok(outcome) => {
                    summary.approved.push(doc_id.clone());
                    if outcome != TrackingOutcome::NotTriggered {
                        summary.tracking = Some(outcome);
                    }
                }
                Err(e) => {
                    tracing::warn!(doc = %doc_id, error = %e, "auto mode halted");
                    summary.failure = Some(AutoFailure {
                        doc_id: doc_id.clone(),
                        message: e.user_message(),
                    });
                    break;
                }
            }
        }
        summary
    }

    async fn auto_step(&self, project: &mut Project, doc_id: &str) -> Result<TrackingOutcome> {
        let doc = project.document(doc_id)?;
        match workflow::resume_step(doc, project.data(doc_id)) {
            Some(ResumeStep::Compact) => self.compact(project, doc_id).await?,
            _ => self.generate(project, doc_id).await?,
        }
        self.approve(project, doc_id)
    }

    // -----------------------------------------------------------------------
    // Propose
    // -----------------------------------------------------------------------

    /// Ask the LLM for a document list. Falls back to the HMAP set when the
    /// reply is unusable. The flag is true when the proposal was used.
    pub async fn propose(&self, name: &str, description: &str) -> (Vec<Document>, bool) {
        let prompt = format!(
            "You are an expert project manager using the HMAP 9-phase methodology.\n\
             Project: {name}\nDescription: {description}\n\n\
             List the planning documents this project needs, in order. Each phase from \
             1 to 9 must have at least one document, and phase 7 must include a document \
             titled \"Detailed Plans\". Reply as a JSON array of objects with keys \
             \"title\", \"phase\" (1-9) and \"sequence\" (order within the phase)."
        );
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "title": {"type": "STRING"},
                    "phase": {"type": "INTEGER"},
                    "sequence": {"type": "INTEGER"}
                },
                "required": ["title", "phase"]
            }
        });
        let reply = retry::generate(
            self.generator.as_ref(),
            self.policy(),
            &prompt,
            &GenerateOptions::json(Some(schema)),
        )
        .await;

        let proposed = match reply {
            Ok(g) => parse_proposal(&g.text),
            Err(e) => {
                tracing::warn!(error = %e, "document proposal failed");
                None
            }
        };
        match proposed {
            Some(docs) => (docs, true),
            None => {
                tracing::warn!("using the default HMAP document set");
                (hmap::default_documents(), false)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Run the task agent. A completed run appends an approved deliverable.
    pub async fn run_task_agent(&self, project: &mut Project, task_id: &str) -> Result<AgentOutcome> {
        let task = pma_core::task::find(&project.tasks, task_id)?;
        let brief = TaskBrief {
            project_name: project.name.clone(),
            task_name: task.name.clone(),
            role: task.role.clone(),
            start_date: task.start_date.to_string(),
            end_date: task.end_date.to_string(),
            foundation: project.foundation().unwrap_or_default().to_string(),
            document_titles: project
                .ordered_documents()
                .iter()
                .map(|d| d.title.clone())
                .collect(),
        };
        self.commit(
            project,
            ProjectPatch::SetTaskAgentStatus {
                task_id: task_id.to_string(),
                status: Some(AgentStatus::Running),
            },
        )?;

        let outcome = agentic::run_task_loop(
            self.generator.as_ref(),
            self.policy(),
            &brief,
            self.agents.task_max_iterations,
        )
        .await;

        let patch = match &outcome {
            AgentOutcome::Completed { title, content, .. } => ProjectPatch::AddAgentDocument {
                task_id: task_id.to_string(),
                title: title.clone(),
                content: content.clone(),
            },
            AgentOutcome::NeedsManualCompletion { .. } => ProjectPatch::SetTaskAgentStatus {
                task_id: task_id.to_string(),
                status: Some(AgentStatus::Failed),
            },
        };
        self.commit(project, patch)?;
        Ok(outcome)
    }

    /// Propagate a change request across the documents. On QA approval the
    /// revised documents go back to review and the change is applied.
    pub async fn run_change(&self, project: &mut Project, change_id: &str) -> Result<ChangeOutcome> {
        let change = project.change(change_id)?;
        let brief = ChangeBrief {
            project_name: project.name.clone(),
            title: change.title.clone(),
            reason: change.reason.clone(),
            impact: change.impact().to_string(),
            documents: project
                .ordered_documents()
                .into_iter()
                .filter_map(|d| {
                    let content = project.data(&d.id)?.content.clone();
                    (!content.trim().is_empty()).then(|| ChangeDocument {
                        id: d.id.clone(),
                        title: d.title.clone(),
                        content,
                    })
                })
                .collect(),
            max_document_chars: self.generation.max_payload_chars / 2,
        };

        let outcome = agentic::run_change_loop(
            self.generator.as_ref(),
            self.policy(),
            &brief,
            self.agents.change_max_iterations,
        )
        .await;

        let patch = match &outcome {
            ChangeOutcome::Applied { revisions, .. } => ProjectPatch::ReviseDocuments {
                change_id: Some(change_id.to_string()),
                revisions: revisions.clone(),
            },
            ChangeOutcome::NeedsManualCompletion { .. } => ProjectPatch::SetChangeStatus {
                change_id: change_id.to_string(),
                status: ChangeStatus::Failed,
            },
        };
        self.commit(project, patch)?;
        Ok(outcome)
    }
}

/// Validate a proposed document list: non-empty titles, phases 1..=9, every
/// phase covered.
fn parse_proposal(text: &str) -> Option<Vec<Document>> {
    let items: Vec<ProposedDocument> = match serde_json::from_str(strip_code_fence(text)) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, "document proposal is not valid JSON");
            return None;
        }
    };
    let valid = !items.is_empty()
        && items
            .iter()
            .all(|d| !d.title.trim().is_empty() && (1..=9).contains(&d.phase))
        && (1..=9u8).all(|phase| items.iter().any(|d| d.phase == phase));
    if !valid {
        tracing::warn!(count = items.len(), "document proposal rejected");
        return None;
    }
    let specs: Vec<(String, u8, u32)> = items
        .into_iter()
        .map(|d| (d.title.trim().to_string(), d.phase, d.sequence))
        .collect();
    Some(hmap::documents_from_specs(&specs))
}
