//! Prompt context assembly under a hard character budget.
//!
//! Context is the compacted content of two approved documents: the first
//! document of the project and the one immediately before the target. The
//! budget covers instructions plus context, so
//! `chars(context) + chars(instructions) <= max_chars` always holds.

use crate::document::{self, Document, PhaseData};
use std::collections::BTreeMap;

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const NO_CONTEXT_WARNING: &str = "NOTE: No approved context from earlier project \
documents is available. Proceed using only the project details given above. Do not stop, \
refuse, or ask for more information.";

/// Longest prefix of `s` with at most `max` chars.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Budget left for context once `instructions` are accounted for.
    pub fn available(&self, instructions: &str) -> usize {
        self.max_chars.saturating_sub(char_len(instructions))
    }

    /// Build the context block for `target`.
    ///
    /// `instructions` is the full prompt rendered with an empty context.
    pub fn assemble(
        &self,
        target: &Document,
        documents: &[Document],
        phase_data: &BTreeMap<String, PhaseData>,
        instructions: &str,
    ) -> String {
        let available = self.available(instructions);

        let candidate = |doc: Option<&Document>| -> Option<(String, String)> {
            let doc = doc.filter(|d| d.id != target.id && d.is_approved())?;
            let text = phase_data.get(&doc.id)?.compacted()?;
            Some((doc.id.clone(), text.to_string()))
        };

        let first = candidate(document::first(documents));
        let previous = candidate(document::predecessor(documents, &target.id))
            .filter(|(id, _)| first.as_ref().map(|(f, _)| f != id).unwrap_or(true));

        let mut context = String::new();
        let mut used = 0usize;

        if let Some((id, text)) = &first {
            let part = truncate_chars(text, available);
            if part.len() < text.len() {
                tracing::warn!(
                    doc = %id,
                    original = char_len(text),
                    kept = available,
                    "first-document context truncated"
                );
            }
            context.push_str(part);
            used += char_len(part);
        }

        if let Some((id, text)) = &previous {
            let sep = if context.is_empty() { "" } else { CONTEXT_SEPARATOR };
            let remaining = available
                .saturating_sub(used)
                .saturating_sub(char_len(sep));
            if remaining > 0 {
                let part = truncate_chars(text, remaining);
                if part.len() < text.len() {
                    tracing::warn!(
                        doc = %id,
                        original = char_len(text),
                        kept = remaining,
                        "previous-document context truncated"
                    );
                }
                context.push_str(sep);
                context.push_str(part);
            } else {
                tracing::warn!(doc = %id, "previous-document context dropped: no budget left");
            }
        }

        if context.is_empty() && target.phase > 1 {
            return truncate_chars(NO_CONTEXT_WARNING, available).to_string();
        }

        context
    }
}
