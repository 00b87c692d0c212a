//! Role and resource extraction from the "Resources & Skills List" document.
//!
//! This is a heading/bullet heuristic. Roles listed under headings that do not
//! contain one of [`ROLE_KEYWORDS`] are reported as resources.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Heading keywords that mark a role section, in lookup order.
pub const ROLE_KEYWORDS: &[&str] = &["roles", "personnel", "team members", "team"];

static BULLET_RE: OnceLock<Regex> = OnceLock::new();

fn bullet_re() -> &'static Regex {
    BULLET_RE.get_or_init(|| Regex::new(r"^[-*]\s+").unwrap())
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_role_heading(line: &str) -> bool {
    let lower = line.to_lowercase();
    ROLE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Name carried by a bullet line, or `None` if the line is not a bullet.
fn bullet_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let m = bullet_re().find(trimmed)?;
    let body = &trimmed[m.end()..];
    let cut = body.find([':', '(']).unwrap_or(body.len());
    let name = body[..cut].replace("**", "").trim().to_string();
    Some(name)
}

fn push_unique(out: &mut Vec<String>, seen: &mut HashSet<String>, name: String) {
    if !name.is_empty() && seen.insert(name.clone()) {
        out.push(name);
    }
}

/// Role names listed under the first role heading, or under the first bullet
/// run in the document when no such heading exists.
pub fn parse_roles_from_markdown(markdown: &str) -> Vec<String> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut roles = Vec::new();
    let mut seen = HashSet::new();

    let heading_idx = ROLE_KEYWORDS.iter().find_map(|keyword| {
        lines
            .iter()
            .position(|l| is_heading(l) && l.to_lowercase().contains(keyword))
    });

    match heading_idx {
        Some(idx) => {
            for line in &lines[idx + 1..] {
                if is_heading(line) {
                    break;
                }
                if let Some(name) = bullet_name(line) {
                    push_unique(&mut roles, &mut seen, name);
                }
            }
        }
        None => {
            let mut in_run = false;
            for line in &lines {
                match bullet_name(line) {
                    Some(name) => {
                        in_run = true;
                        push_unique(&mut roles, &mut seen, name);
                    }
                    None if in_run => break,
                    None => {}
                }
            }
        }
    }

    roles
}

/// Non-labor resources: bullets outside every role heading, excluding "none".
pub fn parse_resources_from_markdown(markdown: &str) -> Vec<String> {
    let mut resources = Vec::new();
    let mut seen = HashSet::new();
    let mut in_role_section = false;

    for line in markdown.lines() {
        if is_heading(line) {
            in_role_section = is_role_heading(line);
            continue;
        }
        if in_role_section {
            continue;
        }
        if let Some(name) = bullet_name(line) {
            if name.eq_ignore_ascii_case("none") {
                continue;
            }
            push_unique(&mut resources, &mut seen, name);
        }
    }

    resources
}
