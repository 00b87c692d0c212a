use crate::types::{DocumentCategory, DocumentStatus, GenerationStage};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// HMAP phase, 1 through 9.
    pub phase: u8,
    /// Tie-break within a phase.
    #[serde(default)]
    pub sequence: u32,
    pub status: DocumentStatus,
    #[serde(default)]
    pub owner: Option<String>,
    /// Bumped on every generation and manual revision.
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<GenerationStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, phase: u8, sequence: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            phase,
            sequence,
            status: DocumentStatus::Todo,
            owner: None,
            version: 0,
            stage: None,
            last_error: None,
        }
    }

    pub fn category(&self) -> DocumentCategory {
        DocumentCategory::classify(&self.title, self.phase)
    }

    pub fn is_approved(&self) -> bool {
        self.status == DocumentStatus::Approved
    }

    /// Global document order: `(phase, sequence, title)`.
    pub fn sort_cmp(&self, other: &Document) -> Ordering {
        self.phase
            .cmp(&other.phase)
            .then(self.sequence.cmp(&other.sequence))
            .then_with(|| self.title.cmp(&other.title))
    }
}

/// Documents in global order.
pub fn sorted(documents: &[Document]) -> Vec<&Document> {
    let mut docs: Vec<&Document> = documents.iter().collect();
    docs.sort_by(|a, b| a.sort_cmp(b));
    docs
}

/// First document in global order.
pub fn first(documents: &[Document]) -> Option<&Document> {
    documents.iter().min_by(|a, b| a.sort_cmp(b))
}

/// The document immediately before `id` in global order.
pub fn predecessor<'a>(documents: &'a [Document], id: &str) -> Option<&'a Document> {
    let docs = sorted(documents);
    let pos = docs.iter().position(|d| d.id == id)?;
    pos.checked_sub(1).map(|p| docs[p])
}

// ---------------------------------------------------------------------------
// PhaseData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    /// Base64 or data-URL payload, stored as given.
    pub data: String,
}

/// Generated content for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseData {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compacted_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl PhaseData {
    /// Compacted content if present and non-blank.
    pub fn compacted(&self) -> Option<&str> {
        self.compacted_content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }
}
