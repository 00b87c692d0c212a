//! Per-document generation state machine.
//!
//! ```text
//! Locked → Todo → Generating → Compacting → Working ──approve──▶ Approved
//!                     │             │          │
//!                     └──── Failed ◀┘          └──reject──▶ Rejected
//! ```
//!
//! `Locked` is derived, not stored: a document is locked while its immediate
//! predecessor in global order is not approved. `Generating` and `Compacting`
//! are persisted as [`GenerationStage`] so an interrupted run resumes at the
//! right step.

use crate::document::{self, Document, PhaseData};
use crate::error::{PmaError, Result};
use crate::types::{DocumentStatus, GenerationStage};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Locked,
    Todo,
    Generating,
    Compacting,
    Working,
    Failed,
    Approved,
    Rejected,
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentState::Locked => "locked",
            DocumentState::Todo => "todo",
            DocumentState::Generating => "generating",
            DocumentState::Compacting => "compacting",
            DocumentState::Working => "working",
            DocumentState::Failed => "failed",
            DocumentState::Approved => "approved",
            DocumentState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Next step for a document that was interrupted mid-generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStep {
    Generate,
    Compact,
}

fn find<'a>(documents: &'a [Document], id: &str) -> Result<&'a Document> {
    documents
        .iter()
        .find(|d| d.id == id)
        .ok_or_else(|| PmaError::DocumentNotFound(id.to_string()))
}

/// The unapproved predecessor holding `id` locked, if any.
pub fn blocked_by<'a>(documents: &'a [Document], id: &str) -> Result<Option<&'a Document>> {
    find(documents, id)?;
    Ok(document::predecessor(documents, id).filter(|p| !p.is_approved()))
}

/// True iff the immediate predecessor of `id` exists and is not approved.
pub fn is_locked(documents: &[Document], id: &str) -> Result<bool> {
    Ok(blocked_by(documents, id)?.is_some())
}

pub fn state_of(documents: &[Document], id: &str) -> Result<DocumentState> {
    let doc = find(documents, id)?;
    if doc.status == DocumentStatus::Approved {
        return Ok(DocumentState::Approved);
    }
    if is_locked(documents, id)? {
        return Ok(DocumentState::Locked);
    }
    Ok(match (doc.stage, doc.status) {
        (Some(GenerationStage::Generating), _) => DocumentState::Generating,
        (Some(GenerationStage::Compacting), _) => DocumentState::Compacting,
        (None, DocumentStatus::Todo) => DocumentState::Todo,
        (None, DocumentStatus::Working) => DocumentState::Working,
        (None, DocumentStatus::Failed) => DocumentState::Failed,
        (None, DocumentStatus::Rejected) => DocumentState::Rejected,
        (None, DocumentStatus::Approved) => DocumentState::Approved,
    })
}

/// Generation is allowed on any unlocked document.
pub fn ensure_can_generate(documents: &[Document], id: &str) -> Result<()> {
    if let Some(blocker) = blocked_by(documents, id)? {
        return Err(PmaError::DocumentLocked {
            id: id.to_string(),
            blocked_by: blocker.id.clone(),
        });
    }
    Ok(())
}

/// Approval needs an unlocked, settled document with content.
pub fn ensure_can_approve(documents: &[Document], id: &str, data: Option<&PhaseData>) -> Result<()> {
    ensure_can_generate(documents, id)?;
    let doc = find(documents, id)?;
    if let Some(stage) = doc.stage {
        return Err(PmaError::InvalidTransition {
            id: id.to_string(),
            from: stage.to_string(),
            to: DocumentStatus::Approved.to_string(),
            reason: "generation is still in progress".to_string(),
        });
    }
    if data.map(|d| d.content.trim().is_empty()).unwrap_or(true) {
        return Err(PmaError::MissingContent(id.to_string()));
    }
    Ok(())
}

/// Where to pick up a document whose last run was interrupted, or whose
/// content was replaced without a fresh compaction.
pub fn resume_step(doc: &Document, data: Option<&PhaseData>) -> Option<ResumeStep> {
    let has_content = data.map(|d| !d.content.trim().is_empty()).unwrap_or(false);
    let has_compacted = data.and_then(|d| d.compacted()).is_some();
    match doc.stage {
        Some(GenerationStage::Generating) => Some(ResumeStep::Generate),
        Some(GenerationStage::Compacting) if has_content => Some(ResumeStep::Compact),
        Some(GenerationStage::Compacting) => Some(ResumeStep::Generate),
        None if has_content && !has_compacted => Some(ResumeStep::Compact),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Document> {
        vec![
            Document::new("a", "A", 1, 0),
            Document::new("b", "B", 2, 0),
            Document::new("c", "C", 3, 0),
        ]
    }

    #[test]
    fn first_document_is_never_locked() {
        let docs = chain();
        assert!(!is_locked(&docs, "a").unwrap());
        assert_eq!(state_of(&docs, "a").unwrap(), DocumentState::Todo);
    }

    #[test]
    fn locked_iff_predecessor_not_approved() {
        let mut docs = chain();
        for status in [
            DocumentStatus::Todo,
            DocumentStatus::Working,
            DocumentStatus::Failed,
            DocumentStatus::Rejected,
        ] {
            docs[0].status = status;
            assert!(is_locked(&docs, "b").unwrap(), "{status}");
        }
        docs[0].status = DocumentStatus::Approved;
        assert!(!is_locked(&docs, "b").unwrap());
        assert!(is_locked(&docs, "c").unwrap());
    }

    #[test]
    fn generate_on_locked_document_fails() {
        let docs = chain();
        let err = ensure_can_generate(&docs, "b").unwrap_err();
        assert!(matches!(err, PmaError::DocumentLocked { ref blocked_by, .. } if blocked_by == "a"));
        ensure_can_generate(&docs, "a").unwrap();
        assert!(ensure_can_generate(&docs, "zzz").is_err());
    }

    #[test]
    fn stage_drives_state() {
        let mut docs = chain();
        docs[0].stage = Some(GenerationStage::Compacting);
        docs[0].status = DocumentStatus::Working;
        assert_eq!(state_of(&docs, "a").unwrap(), DocumentState::Compacting);
        docs[0].stage = None;
        assert_eq!(state_of(&docs, "a").unwrap(), DocumentState::Working);
    }

    #[test]
    fn approve_requires_content_and_settled_stage() {
        let mut docs = chain();
        assert!(matches!(
            ensure_can_approve(&docs, "a", None),
            Err(PmaError::MissingContent(_))
        ));
        let data = PhaseData {
            content: "# A".into(),
            ..Default::default()
        };
        docs[0].stage = Some(GenerationStage::Generating);
        assert!(ensure_can_approve(&docs, "a", Some(&data)).is_err());
        docs[0].stage = None;
        ensure_can_approve(&docs, "a", Some(&data)).unwrap();
        assert!(ensure_can_approve(&docs, "b", Some(&data)).is_err());
    }

    #[test]
    fn resume_step_from_persisted_stage() {
        let mut doc = Document::new("a", "A", 1, 0);
        assert_eq!(resume_step(&doc, None), None);
        doc.stage = Some(GenerationStage::Generating);
        assert_eq!(resume_step(&doc, None), Some(ResumeStep::Generate));
        doc.stage = Some(GenerationStage::Compacting);
        assert_eq!(resume_step(&doc, None), Some(ResumeStep::Generate));
        let mut data = PhaseData {
            content: "body".into(),
            ..Default::default()
        };
        assert_eq!(resume_step(&doc, Some(&data)), Some(ResumeStep::Compact));

        // Revised content without a compaction still needs one.
        doc.stage = None;
        assert_eq!(resume_step(&doc, Some(&data)), Some(ResumeStep::Compact));
        data.compacted_content = Some("dense".into());
        assert_eq!(resume_step(&doc, Some(&data)), None);
    }
}
