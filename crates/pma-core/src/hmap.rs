//! The fixed HMAP document sequence.

use crate::document::Document;
use crate::paths::slugify;

/// `(title, phase)` for the nine canonical HMAP documents.
pub const HMAP_DOCUMENTS: &[(&str, u8)] = &[
    ("Concept Proposal", 1),
    ("Resources & Skills List", 2),
    ("SWOT Analysis", 3),
    ("Kickoff Briefing", 4),
    ("Statement of Work", 5),
    ("Preliminary Review", 6),
    ("Detailed Plans", 7),
    ("Sprint Planning", 8),
    ("Deployment Plan", 9),
];

pub fn default_documents() -> Vec<Document> {
    let specs: Vec<(String, u8, u32)> = HMAP_DOCUMENTS
        .iter()
        .map(|(title, phase)| (title.to_string(), *phase, 0))
        .collect();
    documents_from_specs(&specs)
}

/// Build documents from `(title, phase, sequence)` triples, giving each a
/// unique slug id. Phases are clamped to 1..=9.
pub fn documents_from_specs(specs: &[(String, u8, u32)]) -> Vec<Document> {
    let mut docs: Vec<Document> = Vec::with_capacity(specs.len());
    for (title, phase, sequence) in specs {
        let id = unique_id(&docs, &slugify(title));
        docs.push(Document::new(id, title.clone(), (*phase).clamp(1, 9), *sequence));
    }
    docs
}

/// `base`, or `base-2`, `base-3`, ... if already taken.
pub fn unique_id(existing: &[Document], base: &str) -> String {
    if !existing.iter().any(|d| d.id == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !existing.iter().any(|d| &d.id == candidate))
        .unwrap_or_else(|| base.to_string())
}
