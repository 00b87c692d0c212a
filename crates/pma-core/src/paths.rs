use crate::error::{PmaError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PMA_DIR: &str = ".pma";
pub const EXPORTS_DIR: &str = ".pma/exports";

pub const CONFIG_FILE: &str = ".pma/config.yaml";
pub const PROJECT_FILE: &str = ".pma/project.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn project_path(root: &Path) -> PathBuf {
    root.join(PROJECT_FILE)
}

/// Export file for a document. Ids come from a hand-editable project file,
/// so anything that is not a plain slug is refused.
pub fn export_path(root: &Path, doc_id: &str) -> Result<PathBuf> {
    validate_slug(doc_id)?;
    Ok(root.join(EXPORTS_DIR).join(format!("{doc_id}.md")))
}

// ---------------------------------------------------------------------------
// Slugs
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(PmaError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Derive a document id from a title: "Statement of Work (SOW)" -> "statement-of-work-sow".
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(64);
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("document");
    }
    slug
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
