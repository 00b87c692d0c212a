//! Bounded multi-role loops.
//!
//! The task loop runs Doer, Tools and Tester once per iteration until the
//! Tester answers `COMPLETE`. Tester feedback is appended to the draft for
//! the next Doer turn. Tools notes are recorded in the transcript but are not
//! shown to the Doer.
//!
//! The change loop runs Identify, Revise and QA until QA answers `APPROVED`,
//! carrying QA feedback into the next cycle.
//!
//! Both loops return their failures as values: provider errors and an
//! exhausted iteration cap end in a "needs manual completion" outcome.

use crate::generator::{strip_code_fence, GenerateOptions, Generator};
use crate::retry::{self, RetryPolicy};
use pma_core::context::truncate_chars;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

pub const TASK_MAX_ITERATIONS: u32 = 20;
pub const CHANGE_MAX_ITERATIONS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Doer,
    Tools,
    Tester,
    Identify,
    Revise,
    Qa,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AgentRole::Doer => "doer",
            AgentRole::Tools => "tools",
            AgentRole::Tester => "tester",
            AgentRole::Identify => "identify",
            AgentRole::Revise => "revise",
            AgentRole::Qa => "qa",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub iteration: u32,
    pub role: AgentRole,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AgentOutcome {
    Completed {
        title: String,
        content: String,
        iterations: u32,
        transcript: Vec<TranscriptEntry>,
    },
    NeedsManualCompletion {
        error: String,
        iterations: u32,
        transcript: Vec<TranscriptEntry>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChangeOutcome {
    Applied {
        /// `(document id, revised content)`.
        revisions: Vec<(String, String)>,
        iterations: u32,
        transcript: Vec<TranscriptEntry>,
    },
    NeedsManualCompletion {
        error: String,
        iterations: u32,
        transcript: Vec<TranscriptEntry>,
    },
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

pub const COMPLETE: &str = "COMPLETE";
pub const SUFFICIENT: &str = "SUFFICIENT";
pub const APPROVED: &str = "APPROVED";

/// Markers are case-sensitive substrings: any reply containing `COMPLETE`
/// passes, including `COMPLETED` and `INCOMPLETE`.
pub fn is_complete(reply: &str) -> bool {
    reply.contains(COMPLETE)
}

pub fn is_sufficient(reply: &str) -> bool {
    reply.contains(SUFFICIENT)
}

pub fn is_approved(reply: &str) -> bool {
    reply.contains(APPROVED)
}

// ---------------------------------------------------------------------------
// Task loop
// ---------------------------------------------------------------------------

/// What the task agent knows about its assignment.
#[derive(Debug, Clone, Default)]
pub struct TaskBrief {
    pub project_name: String,
    pub task_name: String,
    pub role: String,
    pub start_date: String,
    pub end_date: String,
    /// Compacted first-phase document.
    pub foundation: String,
    pub document_titles: Vec<String>,
}

impl TaskBrief {
    fn header(&self) -> String {
        format!(
            "Project: {}\nTask: {}\nRole: {}\nSchedule: {} to {}\n\nProject background:\n{}\n",
            self.project_name,
            self.task_name,
            if self.role.is_empty() { "unassigned" } else { self.role.as_str() },
            self.start_date,
            self.end_date,
            if self.foundation.trim().is_empty() {
                "(none available)"
            } else {
                self.foundation.as_str()
            }
        )
    }
}

pub fn doer_prompt(brief: &TaskBrief, draft: &str) -> String {
    let mut prompt = format!(
        "You are the Doer. Produce the complete deliverable for the task below as a \
         markdown document.\n\n{}",
        brief.header()
    );
    if draft.trim().is_empty() {
        prompt.push_str("\nWrite the first full draft.");
    } else {
        prompt.push_str(
            "\nYour previous draft follows, possibly with tester feedback appended. \
             Write a complete improved version that resolves the feedback. Output only \
             the document.\n\nPREVIOUS DRAFT:\n",
        );
        prompt.push_str(draft);
    }
    prompt
}

pub fn tools_prompt(brief: &TaskBrief, draft: &str) -> String {
    format!(
        "You are the Tools reviewer. Check the draft against the other project \
         documents listed below and note missing references, inputs or data sources.\n\
         Reply with the single word SUFFICIENT if nothing is missing, otherwise list \
         concrete improvements.\n\n{}\nProject documents:\n{}\n\nDRAFT:\n{}",
        brief.header(),
        brief
            .document_titles
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n"),
        draft
    )
}

pub fn tester_prompt(brief: &TaskBrief, draft: &str) -> String {
    format!(
        "You are the Tester. Decide whether the draft fully delivers the task.\n\
         Reply with the single word COMPLETE if it does. Otherwise describe every \
         deficiency precisely.\n\n{}\nDRAFT:\n{}",
        brief.header(),
        draft
    )
}

/// Run the Doer/Tools/Tester loop for up to `max_iterations`.
pub async fn run_task_loop(
    generator: &dyn Generator,
    policy: RetryPolicy,
    brief: &TaskBrief,
    max_iterations: u32,
) -> AgentOutcome {
    let options = GenerateOptions::default();
    let mut transcript = Vec::new();
    let mut draft = String::new();

    for iteration in 1..=max_iterations {
        let step = async {
            let doer = retry::generate(generator, policy, &doer_prompt(brief, &draft), &options)
                .await?
                .text;
            transcript.push(TranscriptEntry {
                iteration,
                role: AgentRole::Doer,
                text: doer.clone(),
            });

            let tools = retry::generate(generator, policy, &tools_prompt(brief, &doer), &options)
                .await?
                .text;
            if !is_sufficient(&tools) {
                tracing::debug!(iteration, "tools notes recorded");
            }
            transcript.push(TranscriptEntry {
                iteration,
                role: AgentRole::Tools,
                text: tools,
            });

            let tester = retry::generate(generator, policy, &tester_prompt(brief, &doer), &options)
                .await?
                .text;
            transcript.push(TranscriptEntry {
                iteration,
                role: AgentRole::Tester,
                text: tester.clone(),
            });
            Ok::<_, crate::error::LlmError>((doer, tester))
        };

        let (doer, tester) = match step.await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!(task = %brief.task_name, iteration, error = %e, "task agent stopped");
                return AgentOutcome::NeedsManualCompletion {
                    error: e.user_message(),
                    iterations: iteration,
                    transcript,
                };
            }
        };

        if is_complete(&tester) {
            tracing::info!(task = %brief.task_name, iteration, "task agent complete");
            return AgentOutcome::Completed {
                title: format!("{} Deliverable", brief.task_name),
                content: doer,
                iterations: iteration,
                transcript,
            };
        }
        draft = format!("{doer}\n\n---\nTester feedback:\n{tester}");
    }

    AgentOutcome::NeedsManualCompletion {
        error: format!(
            "task '{}' did not pass testing within {max_iterations} iterations; \
             it needs manual completion",
            brief.task_name
        ),
        iterations: max_iterations,
        transcript,
    }
}

// ---------------------------------------------------------------------------
// Change loop
// ---------------------------------------------------------------------------

/// A document the change loop may revise.
#[derive(Debug, Clone)]
pub struct ChangeDocument {
    pub id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeBrief {
    pub project_name: String,
    pub title: String,
    pub reason: String,
    pub impact: String,
    pub documents: Vec<ChangeDocument>,
    /// Per-document cap on content included in a revision prompt.
    pub max_document_chars: usize,
}

impl ChangeBrief {
    fn header(&self) -> String {
        format!(
            "Project: {}\nChange request: {}\nReason: {}\nImpact: {}\n",
            self.project_name, self.title, self.reason, self.impact
        )
    }
}

#[derive(Debug, Deserialize)]
struct AffectedReply {
    #[serde(default)]
    affected: Vec<String>,
}

pub fn identify_prompt(brief: &ChangeBrief, qa_feedback: Option<&str>) -> String {
    let mut prompt = format!(
        "You identify which project documents a change request affects.\n\n{}\n\
         Documents:\n{}\n\nReply as JSON: {{\"affected\": [\"<exact document title>\", ...]}}",
        brief.header(),
        brief
            .documents
            .iter()
            .map(|d| format!("- {}", d.title))
            .collect::<Vec<_>>()
            .join("\n")
    );
    if let Some(feedback) = qa_feedback {
        prompt.push_str("\n\nThe previous attempt was rejected by QA:\n");
        prompt.push_str(feedback);
    }
    prompt
}

fn identify_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {"affected": {"type": "ARRAY", "items": {"type": "STRING"}}},
        "required": ["affected"]
    })
}

/// Map the identify reply to document ids. JSON first; on bad JSON, any
/// document whose title appears in the text.
pub fn resolve_affected(reply: &str, documents: &[ChangeDocument]) -> Vec<String> {
    let by_title = |title: &str| {
        let wanted = title.trim().to_lowercase();
        documents
            .iter()
            .find(|d| d.title.to_lowercase() == wanted)
            .map(|d| d.id.clone())
    };
    let mut ids: Vec<String> = match serde_json::from_str::<AffectedReply>(strip_code_fence(reply)) {
        Ok(parsed) => parsed.affected.iter().filter_map(|t| by_title(t)).collect(),
        Err(_) => {
            let text = reply.to_lowercase();
            documents
                .iter()
                .filter(|d| text.contains(&d.title.to_lowercase()))
                .map(|d| d.id.clone())
                .collect()
        }
    };
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
    ids
}

/// Split `content` into the part a reviser sees and the tail kept as is.
///
/// The cut falls on the last line break within `max_chars`, so the tail
/// always starts a line. Content within the cap has an empty tail.
pub fn revision_window(content: &str, max_chars: usize) -> (&str, &str) {
    let head = truncate_chars(content, max_chars);
    if head.len() == content.len() {
        return (content, "");
    }
    let cut = head.rfind('\n').map(|i| i + 1).unwrap_or(head.len());
    content.split_at(cut)
}

/// Re-attach the unrevised tail to a revision.
fn join_revision(revised: String, tail: &str) -> String {
    if tail.is_empty() {
        return revised;
    }
    format!("{}\n{tail}", revised.trim_end())
}

pub fn revise_prompt(brief: &ChangeBrief, doc: &ChangeDocument, qa_feedback: Option<&str>) -> String {
    let (content, tail) = revision_window(&doc.content, brief.max_document_chars);
    let mut prompt = format!(
        "You revise a project document so it reflects an approved change request. \
         Keep everything the change does not touch. Output only the full revised \
         markdown document.\n\n{}\nDocument: {}\n",
        brief.header(),
        doc.title
    );
    if let Some(feedback) = qa_feedback {
        prompt.push_str("\nQA feedback on the previous revision:\n");
        prompt.push_str(feedback);
        prompt.push('\n');
    }
    if !tail.is_empty() {
        prompt.push_str(
            "\nOnly the opening excerpt is shown. The rest of the document is kept \
             unchanged after your text, so do not summarize or close it off.\n",
        );
    }
    prompt.push_str("\nCURRENT DOCUMENT:\n");
    prompt.push_str(content);
    prompt
}

pub fn qa_prompt(brief: &ChangeBrief, revisions: &[(String, String)]) -> String {
    let mut prompt = format!(
        "You are QA for a change request. Check that the revised documents apply the \
         change consistently and lose nothing else.\nReply with the single word \
         APPROVED if they do, otherwise explain what must be fixed.\n\n{}\n",
        brief.header()
    );
    if revisions.is_empty() {
        prompt.push_str("\nNo documents were identified as affected.\n");
    }
    for (id, content) in revisions {
        let title = brief
            .documents
            .iter()
            .find(|d| &d.id == id)
            .map(|d| d.title.as_str())
            .unwrap_or(id);
        let shown = truncate_chars(content, brief.max_document_chars);
        if shown.len() < content.len() {
            tracing::warn!(
                doc = %id,
                original = content.chars().count(),
                kept = brief.max_document_chars,
                "revision truncated for qa review"
            );
        }
        prompt.push_str(&format!("\n### {title}\n{shown}\n"));
    }
    prompt
}

/// Run the Identify/Revise/QA loop for up to `max_iterations` cycles.
pub async fn run_change_loop(
    generator: &dyn Generator,
    policy: RetryPolicy,
    brief: &ChangeBrief,
    max_iterations: u32,
) -> ChangeOutcome {
    let plain = GenerateOptions::default();
    let json_mode = GenerateOptions::json(Some(identify_schema()));
    let mut transcript = Vec::new();
    let mut qa_feedback: Option<String> = None;

    for iteration in 1..=max_iterations {
        let cycle = async {
            let reply = retry::generate(
                generator,
                policy,
                &identify_prompt(brief, qa_feedback.as_deref()),
                &json_mode,
            )
            .await?
            .text;
            let affected = resolve_affected(&reply, &brief.documents);
            transcript.push(TranscriptEntry {
                iteration,
                role: AgentRole::Identify,
                text: reply,
            });

            let mut revisions = Vec::with_capacity(affected.len());
            for id in &affected {
                let Some(doc) = brief.documents.iter().find(|d| &d.id == id) else {
                    continue;
                };
                let (_, tail) = revision_window(&doc.content, brief.max_document_chars);
                if !tail.is_empty() {
                    tracing::warn!(
                        doc = %id,
                        original = doc.content.chars().count(),
                        kept = doc.content.chars().count() - tail.chars().count(),
                        "document truncated for revision; the tail is kept unchanged"
                    );
                }
                let revised = retry::generate(
                    generator,
                    policy,
                    &revise_prompt(brief, doc, qa_feedback.as_deref()),
                    &plain,
                )
                .await?
                .text;
                let revised = join_revision(revised, tail);
                transcript.push(TranscriptEntry {
                    iteration,
                    role: AgentRole::Revise,
                    text: revised.clone(),
                });
                revisions.push((id.clone(), revised));
            }

            let verdict = retry::generate(generator, policy, &qa_prompt(brief, &revisions), &plain)
                .await?
                .text;
            transcript.push(TranscriptEntry {
                iteration,
                role: AgentRole::Qa,
                text: verdict.clone(),
            });
            Ok::<_, crate::error::LlmError>((revisions, verdict))
        };

        let (revisions, verdict) = match cycle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(change = %brief.title, iteration, error = %e, "change agent stopped");
                return ChangeOutcome::NeedsManualCompletion {
                    error: e.user_message(),
                    iterations: iteration,
                    transcript,
                };
            }
        };

        if is_approved(&verdict) {
            tracing::info!(
                change = %brief.title,
                iteration,
                documents = revisions.len(),
                "change approved by qa"
            );
            return ChangeOutcome::Applied {
                revisions,
                iterations: iteration,
                transcript,
            };
        }
        qa_feedback = Some(verdict);
    }

    ChangeOutcome::NeedsManualCompletion {
        error: format!(
            "change '{}' was not approved by QA within {max_iterations} iterations; \
             it needs manual completion",
            brief.title
        ),
        iterations: max_iterations,
        transcript,
    }
}
