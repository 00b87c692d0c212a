//! The project aggregate and its reducer.
//!
//! Every mutation goes through [`Project::apply`] with a [`ProjectPatch`].
//! Patches carrying an LLM result also carry the document version captured
//! when the call started; a patch whose version no longer matches is
//! rejected with [`PmaError::StaleResponse`] and changes nothing.

use crate::change::{self, ChangeRequest};
use crate::config::ConfigWarning;
use crate::document::{Document, PhaseData};
use crate::error::{PmaError, Result};
use crate::hmap;
use crate::impact::Baseline;
use crate::milestone::{self, Milestone};
use crate::paths;
use crate::task::{self, Task};
use crate::tracking::{self, Tracking};
use crate::types::{AgentStatus, ChangeStatus, DocumentStatus, GenerationStage, Recurrence, TaskStatus};
use crate::workflow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Sprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Sprint {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start_date: None,
            end_date: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectPatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ProjectPatch {
    /// Bump the version and mark the document as generating.
    BeginGeneration { doc_id: String },
    GenerationSucceeded {
        doc_id: String,
        version: u32,
        content: String,
    },
    BeginCompaction { doc_id: String, version: u32 },
    CompactionSucceeded {
        doc_id: String,
        version: u32,
        compacted: String,
    },
    GenerationFailed {
        doc_id: String,
        version: u32,
        message: String,
    },
    Approve { doc_id: String },
    Reject { doc_id: String },
    /// Manual replacement of a document's content.
    EditContent { doc_id: String, content: String },
    SetTracking(Tracking),
    SetTaskStatus { task_id: String, status: TaskStatus },
    CommentTask {
        task_id: String,
        author: String,
        text: String,
    },
    RecordActuals {
        task_id: String,
        time: Option<f64>,
        cost: Option<f64>,
    },
    SetTaskAgentStatus {
        task_id: String,
        status: Option<AgentStatus>,
    },
    /// `None` fields are left unchanged.
    ConfigureTask {
        task_id: String,
        recurrence: Option<Option<Recurrence>>,
        use_agent: Option<bool>,
    },
    /// Append an approved deliverable produced by a task agent.
    AddAgentDocument {
        task_id: String,
        title: String,
        content: String,
    },
    CompleteMilestone {
        milestone_id: String,
        on: Option<NaiveDate>,
    },
    InferMilestones,
    AddChangeRequest(ChangeRequest),
    /// Replace the content of several documents at once and send them back
    /// for review. With a `change_id`, the change request is marked applied.
    ReviseDocuments {
        change_id: Option<String>,
        revisions: Vec<(String, String)>,
    },
    SetChangeStatus {
        change_id: String,
        status: ChangeStatus,
    },
}

/// What approving a document did to tracking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tracking", rename_all = "snake_case")]
pub enum TrackingOutcome {
    NotTriggered,
    Built { tasks: usize, milestones: usize },
    Failed { message: String },
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub budget: i64,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub documents: Vec<Document>,
    #[serde(default)]
    pub phase_data: BTreeMap<String, PhaseData>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub sprints: Vec<Sprint>,
    #[serde(default)]
    pub change_requests: Vec<ChangeRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// A new project with the HMAP document set.
    pub fn new(name: impl Into<String>, description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::with_documents(name, description, hmap::default_documents(), now)
    }

    pub fn with_documents(
        name: impl Into<String>,
        description: impl Into<String>,
        documents: Vec<Document>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            owner: None,
            budget: 0,
            end_date: None,
            documents,
            phase_data: BTreeMap::new(),
            tasks: Vec::new(),
            milestones: Vec::new(),
            sprints: vec![Sprint::new("sprint-1", "Sprint 1")],
            change_requests: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        crate::io::load_yaml(&paths::project_path(root))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::save_yaml(&paths::project_path(root), self)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn document(&self, id: &str) -> Result<&Document> {
        self.documents
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| PmaError::DocumentNotFound(id.to_string()))
    }

    pub fn data(&self, id: &str) -> Option<&PhaseData> {
        self.phase_data.get(id)
    }

    /// Documents in global order.
    pub fn ordered_documents(&self) -> Vec<&Document> {
        crate::document::sorted(&self.documents)
    }

    pub fn all_approved(&self) -> bool {
        !self.documents.is_empty() && self.documents.iter().all(|d| d.is_approved())
    }

    /// Current end date and budget. Without an end date, the latest task end
    /// date stands in, then the creation date.
    pub fn baseline(&self) -> Baseline {
        let end_date = self
            .end_date
            .or_else(|| self.tasks.iter().map(|t| t.end_date).max())
            .unwrap_or_else(|| self.created_at.date_naive());
        Baseline {
            end_date,
            budget: self.budget,
        }
    }

    /// Compacted content of the first document, used as background for
    /// agent prompts.
    pub fn foundation(&self) -> Option<&str> {
        let first = crate::document::first(&self.documents)?;
        let data = self.phase_data.get(&first.id)?;
        data.compacted()
            .or_else(|| Some(data.content.as_str()).filter(|c| !c.trim().is_empty()))
    }

    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.budget == 0 {
            warnings.push(ConfigWarning::warning(
                "project budget is 0: impact projections will start from zero",
            ));
        }
        if self.end_date.is_none() {
            warnings.push(ConfigWarning::warning(
                "project has no end date: impact projections use the latest task end date",
            ));
        }
        warnings
    }

    // -----------------------------------------------------------------------
    // Reducer
    // -----------------------------------------------------------------------

    fn doc_mut(&mut self, id: &str) -> Result<&mut Document> {
        self.documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| PmaError::DocumentNotFound(id.to_string()))
    }

    /// The document, if `version` is still current.
    fn current_doc_mut(&mut self, id: &str, version: u32) -> Result<&mut Document> {
        let doc = self.doc_mut(id)?;
        if doc.version != version {
            return Err(PmaError::StaleResponse {
                id: id.to_string(),
                expected: version,
                actual: doc.version,
            });
        }
        Ok(doc)
    }

    fn replace_content(&mut self, doc_id: &str, content: String) -> Result<()> {
        let doc = self.doc_mut(doc_id)?;
        doc.version += 1;
        doc.status = DocumentStatus::Working;
        doc.stage = None;
        doc.last_error = None;
        let data = self.phase_data.entry(doc_id.to_string()).or_default();
        data.content = content;
        data.compacted_content = None;
        Ok(())
    }

    pub fn apply(&mut self, patch: ProjectPatch, now: DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        match patch {
            ProjectPatch::BeginGeneration { doc_id } => {
                workflow::ensure_can_generate(&self.documents, &doc_id)?;
                let doc = self.doc_mut(&doc_id)?;
                doc.version += 1;
                doc.stage = Some(GenerationStage::Generating);
                doc.last_error = None;
            }
            ProjectPatch::GenerationSucceeded {
                doc_id,
                version,
                content,
            } => {
                let doc = self.current_doc_mut(&doc_id, version)?;
                doc.status = DocumentStatus::Working;
                doc.stage = Some(GenerationStage::Compacting);
                let data = self.phase_data.entry(doc_id).or_default();
                data.content = content;
                data.compacted_content = None;
            }
            ProjectPatch::BeginCompaction { doc_id, version } => {
                let has_content = self
                    .phase_data
                    .get(&doc_id)
                    .map(|d| !d.content.trim().is_empty())
                    .unwrap_or(false);
                if !has_content {
                    return Err(PmaError::MissingContent(doc_id));
                }
                self.current_doc_mut(&doc_id, version)?.stage = Some(GenerationStage::Compacting);
            }
            ProjectPatch::CompactionSucceeded {
                doc_id,
                version,
                compacted,
            } => {
                self.current_doc_mut(&doc_id, version)?.stage = None;
                self.phase_data.entry(doc_id).or_default().compacted_content = Some(compacted);
            }
            ProjectPatch::GenerationFailed {
                doc_id,
                version,
                message,
            } => {
                let doc = self.current_doc_mut(&doc_id, version)?;
                doc.status = DocumentStatus::Failed;
                doc.stage = None;
                doc.last_error = Some(message);
            }
            ProjectPatch::Approve { doc_id } => {
                workflow::ensure_can_approve(&self.documents, &doc_id, self.phase_data.get(&doc_id))?;
                let doc = self.doc_mut(&doc_id)?;
                doc.status = DocumentStatus::Approved;
                doc.last_error = None;
            }
            ProjectPatch::Reject { doc_id } => {
                workflow::ensure_can_generate(&self.documents, &doc_id)?;
                let doc = self.doc_mut(&doc_id)?;
                if let Some(stage) = doc.stage {
                    return Err(PmaError::InvalidTransition {
                        id: doc_id,
                        from: stage.to_string(),
                        to: DocumentStatus::Rejected.to_string(),
                        reason: "generation is still in progress".to_string(),
                    });
                }
                doc.status = DocumentStatus::Rejected;
            }
            ProjectPatch::EditContent { doc_id, content } => {
                self.replace_content(&doc_id, content)?;
            }
            ProjectPatch::SetTracking(tracking) => {
                if !self.tasks.is_empty() || !self.milestones.is_empty() {
                    return Err(PmaError::TrackingExists {
                        tasks: self.tasks.len(),
                        milestones: self.milestones.len(),
                    });
                }
                self.tasks = tracking.tasks;
                self.milestones = tracking.milestones;
            }
            ProjectPatch::SetTaskStatus { task_id, status } => {
                if let Some(spawned) = task::set_status(&mut self.tasks, &task_id, status, today)? {
                    tracing::info!(task = %task_id, next = %spawned, "recurring task rescheduled");
                }
                milestone::infer_statuses(&mut self.milestones, &self.tasks);
            }
            ProjectPatch::CommentTask {
                task_id,
                author,
                text,
            } => task::add_comment(&mut self.tasks, &task_id, author, text)?,
            ProjectPatch::RecordActuals {
                task_id,
                time,
                cost,
            } => task::record_actuals(&mut self.tasks, &task_id, time, cost)?,
            ProjectPatch::SetTaskAgentStatus { task_id, status } => {
                task::find(&self.tasks, &task_id)?;
                if let Some(t) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    t.agent_status = status;
                }
            }
            ProjectPatch::ConfigureTask {
                task_id,
                recurrence,
                use_agent,
            } => {
                task::find(&self.tasks, &task_id)?;
                if let Some(t) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    if let Some(r) = recurrence {
                        t.recurrence = r;
                    }
                    if let Some(flag) = use_agent {
                        t.use_agent = flag;
                    }
                }
            }
            ProjectPatch::AddAgentDocument {
                task_id,
                title,
                content,
            } => {
                task::find(&self.tasks, &task_id)?;
                let (phase, sequence) = crate::document::sorted(&self.documents)
                    .last()
                    .map(|d| (d.phase, d.sequence + 1))
                    .unwrap_or((1, 0));
                let id = hmap::unique_id(&self.documents, &paths::slugify(&title));
                let mut doc = Document::new(id.clone(), title, phase, sequence);
                doc.status = DocumentStatus::Approved;
                doc.version = 1;
                self.documents.push(doc);
                self.phase_data.insert(
                    id,
                    PhaseData {
                        content,
                        ..Default::default()
                    },
                );
                if let Some(t) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                    t.agent_status = Some(AgentStatus::Completed);
                }
            }
            ProjectPatch::CompleteMilestone { milestone_id, on } => {
                milestone::complete(&mut self.milestones, &milestone_id, on.unwrap_or(today))?;
            }
            ProjectPatch::InferMilestones => {
                milestone::infer_statuses(&mut self.milestones, &self.tasks);
            }
            ProjectPatch::AddChangeRequest(change) => {
                self.change_requests.push(change);
            }
            ProjectPatch::ReviseDocuments {
                change_id,
                revisions,
            } => {
                for (doc_id, _) in &revisions {
                    self.document(doc_id)?;
                }
                if let Some(id) = &change_id {
                    self.change_mut(id)?;
                }
                let affected: Vec<String> = revisions.iter().map(|(id, _)| id.clone()).collect();
                for (doc_id, content) in revisions {
                    self.replace_content(&doc_id, content)?;
                }
                if let Some(id) = change_id {
                    let change = self.change_mut(&id)?;
                    change.status = ChangeStatus::Applied;
                    change.affected = affected;
                }
            }
            ProjectPatch::SetChangeStatus { change_id, status } => {
                self.change_mut(&change_id)?.status = status;
            }
        }
        self.updated_at = now;
        Ok(())
    }

    fn change_mut(&mut self, id: &str) -> Result<&mut ChangeRequest> {
        self.change_requests
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PmaError::ChangeRequestNotFound(id.to_string()))
    }

    pub fn change(&self, id: &str) -> Result<&ChangeRequest> {
        change::find(&self.change_requests, id)
            .ok_or_else(|| PmaError::ChangeRequestNotFound(id.to_string()))
    }

    /// Approve a document and, on the transition into "all approved", build
    /// tracking from the Detailed Plans. A tracking failure does not undo
    /// the approval; it is reported in the outcome.
    pub fn approve_document(&mut self, doc_id: &str, now: DateTime<Utc>) -> Result<TrackingOutcome> {
        let was_all_approved = self.all_approved();
        self.apply(
            ProjectPatch::Approve {
                doc_id: doc_id.to_string(),
            },
            now,
        )?;
        if !tracking::should_build(was_all_approved, self) {
            return Ok(TrackingOutcome::NotTriggered);
        }
        Ok(self.build_tracking(now))
    }

    /// Build tracking from the Detailed Plans regardless of the trigger.
    pub fn build_tracking(&mut self, now: DateTime<Utc>) -> TrackingOutcome {
        let built = tracking::build_tracking(self, now)
            .and_then(|t| {
                let counts = (t.tasks.len(), t.milestones.len());
                self.apply(ProjectPatch::SetTracking(t), now)?;
                Ok(counts)
            });
        match built {
            Ok((tasks, milestones)) => TrackingOutcome::Built { tasks, milestones },
            Err(e) => {
                tracing::warn!(error = %e, "tracking not built");
                TrackingOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
