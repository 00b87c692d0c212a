//! Prompt templates per document category.
//!
//! [`render`] is an exhaustive match over [`DocumentCategory`]; adding a
//! category without a template is a compile error.

use crate::types::DocumentCategory;

/// Everything a document template needs.
#[derive(Debug, Clone, Default)]
pub struct PromptInput<'a> {
    pub project_name: &'a str,
    pub project_description: &'a str,
    pub document_title: &'a str,
    pub phase: u8,
    /// Assembled context block; empty when rendering for budget measurement.
    pub context: &'a str,
}

/// Column headers the Detailed Plans tasks table must use.
pub const TASK_TABLE_HEADER: &str = "| Task Name | Role | Start Date (YYYY-MM-DD) | End Date (YYYY-MM-DD) | Dependencies | Sprint | Subcontractor |";
/// Column headers the Detailed Plans milestones table must use.
pub const MILESTONE_TABLE_HEADER: &str = "| Milestone Name | Date (YYYY-MM-DD) |";

pub const CONTEXT_HEADER: &str = "\n\nCONTEXT FROM EARLIER APPROVED DOCUMENTS:\n";

pub const COMPACTION_INSTRUCTION: &str = "Rewrite the following project document into the \
densest possible form that preserves every fact, number, name, date, decision, risk and \
requirement. Use terse key: value lines and short bullet lists. No prose, no introductions, \
no markdown tables, no commentary. Output only the compacted document.\n\nDOCUMENT:\n";

pub fn render(category: DocumentCategory, input: &PromptInput) -> String {
    let body = match category {
        DocumentCategory::Concept => concept(input),
        DocumentCategory::Resources => resources(input),
        DocumentCategory::Swot => swot(input),
        DocumentCategory::Kickoff => kickoff(input),
        DocumentCategory::StatementOfWork => statement_of_work(input),
        DocumentCategory::PreliminaryReview => preliminary_review(input),
        DocumentCategory::DetailedPlans => detailed_plans(input),
        DocumentCategory::SprintPlanning => sprint_planning(input),
        DocumentCategory::Deployment => deployment(input),
        DocumentCategory::Generic => generic(input),
    };
    format!("{}{body}{}", preamble(input), context_block(input))
}

/// The static part of a document prompt, including the context header.
///
/// This is what the context budget is measured against: the final prompt is
/// exactly this text followed by the context block.
pub fn instructions(category: DocumentCategory, input: &PromptInput) -> String {
    let bare = PromptInput {
        context: "",
        ..input.clone()
    };
    format!("{}{CONTEXT_HEADER}", render(category, &bare))
}

/// The compaction prompt for `content`.
pub fn compaction(content: &str) -> String {
    format!("{COMPACTION_INSTRUCTION}{content}")
}

fn preamble(input: &PromptInput) -> String {
    format!(
        "You are an expert project manager following the HMAP 9-phase planning methodology.\n\
         Project: {}\n\
         Description: {}\n\
         Document to write: \"{}\" (phase {} of 9)\n\
         Write the complete document in GitHub-flavored markdown. Do not include any text \
         before or after the document.\n\n",
        input.project_name, input.project_description, input.document_title, input.phase
    )
}

fn context_block(input: &PromptInput) -> String {
    if input.context.is_empty() {
        String::new()
    } else {
        format!("{CONTEXT_HEADER}{}", input.context)
    }
}

fn concept(_input: &PromptInput) -> String {
    "Write a Concept Proposal. Include: problem statement, objectives, scope (in and out), \
     key stakeholders, success criteria, high-level timeline, rough budget range, and major \
     assumptions and constraints."
        .to_string()
}

fn resources(_input: &PromptInput) -> String {
    "Write a Resources & Skills List. Use these sections exactly:\n\
     ## Roles\n\
     A bullet list, one role per line, formatted as `- Role Name: responsibilities`.\n\
     ## Equipment\n\
     ## Software & Services\n\
     ## Facilities\n\
     Each of the last three is a bullet list of non-labor resources formatted as \
     `- Resource Name: purpose`. Write `- None` for an empty section."
        .to_string()
}

fn swot(_input: &PromptInput) -> String {
    "Write a SWOT Analysis with sections ## Strengths, ## Weaknesses, ## Opportunities and \
     ## Threats, followed by ## Strategic Implications linking each threat to a mitigation."
        .to_string()
}

fn kickoff(_input: &PromptInput) -> String {
    "Write a Kickoff Briefing: purpose, goals, team and responsibilities, communication plan \
     (cadence, channels), decision-making process, immediate next steps with owners."
        .to_string()
}

fn statement_of_work(_input: &PromptInput) -> String {
    "Write a Statement of Work: background, scope of work, deliverables with acceptance \
     criteria, period of performance, schedule, budget and payment terms, assumptions, \
     and change-control procedure."
        .to_string()
}

fn preliminary_review(_input: &PromptInput) -> String {
    "Write a Preliminary Review of the plan so far: consistency of scope, schedule and budget \
     across the earlier documents, gaps found, risks with likelihood and impact, and a clear \
     go / no-go recommendation with conditions."
        .to_string()
}

fn detailed_plans(input: &PromptInput) -> String {
    format!(
        "Write the Detailed Plans for \"{}\". The document MUST contain these two sections, \
         each holding exactly one markdown table with exactly these columns:\n\n\
         ## Tasks\n\
         {TASK_TABLE_HEADER}\n\
         |---|---|---|---|---|---|---|\n\n\
         ## Milestones\n\
         {MILESTONE_TABLE_HEADER}\n\
         |---|---|\n\n\
         Rules:\n\
         - Dates use YYYY-MM-DD.\n\
         - Dependencies is a comma-separated list of Task Names that appear EARLIER in the \
         table, or empty.\n\
         - Sprint names a sprint such as `Sprint 1`.\n\
         - Subcontractor is `Yes` or `No`.\n\
         - Never use the `|` character inside a cell.\n\
         Other sections (work breakdown narrative, risk register, budget detail) may follow \
         the two tables.",
        input.project_name
    )
}

fn sprint_planning(_input: &PromptInput) -> String {
    "Write Sprint Planning: sprint cadence and length, a section per sprint (## Sprint N) \
     with goal, committed tasks, capacity assumptions, and definition of done."
        .to_string()
}

fn deployment(_input: &PromptInput) -> String {
    "Write a Deployment Plan: release strategy, environments, step-by-step rollout with \
     owners, verification checks, rollback procedure, communication plan, and post-launch \
     support."
        .to_string()
}

fn generic(input: &PromptInput) -> String {
    format!(
        "Write the \"{}\" document appropriate to phase {} of the project. Be specific, \
         actionable and consistent with the earlier documents.",
        input.document_title, input.phase
    )
}
