//! Markdown table extraction.
//!
//! The table layout is dictated to the LLM by the prompt templates, so the
//! parser does no recovery: a row whose cell count differs from the header
//! is dropped, and a section with no header/separator pair yields nothing.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// One data row, keyed by normalized header names in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableRow {
    cells: Vec<(String, String)>,
}

impl TableRow {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First non-empty value among `keys`, tried in order.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.is_empty())
    }

    /// First cell whose key starts with any of `prefixes`.
    pub fn get_prefixed(&self, prefixes: &[&str]) -> Option<&str> {
        prefixes.iter().find_map(|p| {
            self.cells
                .iter()
                .find(|(k, _)| k.starts_with(p))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();
static KEY_RE: OnceLock<Regex> = OnceLock::new();

fn separator_re() -> &'static Regex {
    SEPARATOR_RE.get_or_init(|| Regex::new(r"^[|\s\-:]+$").unwrap())
}

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"[\s\-]+").unwrap())
}

fn is_separator(line: &str) -> bool {
    line.contains('-') && separator_re().is_match(line)
}

/// Split a table line into trimmed cells, ignoring the outer pipes.
pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

/// `"Start Date (YYYY-MM-DD)"` -> `"start_date_yyyy_mm_dd"`.
pub fn normalize_header(header: &str) -> String {
    let lowered: String = header
        .to_lowercase()
        .chars()
        .filter(|c| *c != '(' && *c != ')')
        .collect();
    key_re().replace_all(lowered.trim(), "_").into_owned()
}

/// Parse the first markdown table in `section`.
pub fn parse_markdown_table(section: &str) -> Vec<TableRow> {
    let lines: Vec<&str> = section.lines().collect();

    let Some(header_idx) = lines
        .windows(2)
        .position(|pair| pair[0].contains('|') && is_separator(pair[1]))
    else {
        return Vec::new();
    };

    let headers: Vec<String> = split_cells(lines[header_idx])
        .iter()
        .map(|h| normalize_header(h))
        .collect();

    lines[header_idx + 2..]
        .iter()
        .filter(|line| line.contains('|'))
        .filter_map(|line| {
            let cells = split_cells(line);
            if cells.len() != headers.len() {
                return None;
            }
            Some(TableRow {
                cells: headers.iter().cloned().zip(cells).collect(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TASKS: &str = "\
Some intro text.

| Task Name | Role | Start Date (YYYY-MM-DD) | Dependencies |
|-----------|------|:-----------------------:|--------------|
| Design Mockups | Designer | 2024-01-01 | |
| Build API | Backend Engineer | 2024-01-05 | Design Mockups |
| Write Docs | Writer | 2024-01-09 | Build API, Design Mockups |
";

    #[test]
    fn parses_rows_keyed_by_normalized_headers() {
        let rows = parse_markdown_table(TASKS);
        assert_eq!(rows.len(), 3);
        let keys: Vec<&str> = rows[0].keys().collect();
        assert_eq!(
            keys,
            ["task_name", "role", "start_date_yyyy_mm_dd", "dependencies"]
        );
        assert_eq!(rows[1].get("task_name"), Some("Build API"));
        assert_eq!(rows[2].get("dependencies"), Some("Build API, Design Mockups"));
        assert_eq!(rows[0].get("dependencies"), Some(""));
    }

    #[test]
    fn drops_rows_with_wrong_cell_count() {
        let text = "\
| A | B |
|---|---|
| 1 | 2 |
| 1 | 2 | 3 |
| only |
| 3 | 4 |
";
        let rows = parse_markdown_table(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("a"), Some("3"));
    }

    #[test]
    fn no_table_returns_empty() {
        assert!(parse_markdown_table("").is_empty());
        assert!(parse_markdown_table("just prose\nand more prose").is_empty());
        // Header without a separator line is not a table.
        assert!(parse_markdown_table("| a | b |\n| 1 | 2 |").is_empty());
    }

    #[test]
    fn separator_must_contain_a_dash() {
        assert!(parse_markdown_table("| a | b |\n| : | : |\n| 1 | 2 |").is_empty());
    }

    #[test]
    fn tolerates_tables_without_outer_pipes() {
        let rows = parse_markdown_table("Name | Date\n--- | ---\nLaunch | 2024-03-01\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("date"), Some("2024-03-01"));
    }

    #[test]
    fn skips_prose_lines_after_header() {
        let text = "| A |\n|---|\n| 1 |\nnot a row\n| 2 |\n";
        assert_eq!(parse_markdown_table(text).len(), 2);
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header("Start Date (YYYY-MM-DD)"), "start_date_yyyy_mm_dd");
        assert_eq!(normalize_header("  Sub-contractor  "), "sub_contractor");
        assert_eq!(normalize_header("Task   Name"), "task_name");
    }

    #[test]
    fn lookup_helpers() {
        let rows = parse_markdown_table(TASKS);
        assert_eq!(rows[0].get_prefixed(&["start_date"]), Some("2024-01-01"));
        assert_eq!(rows[0].get_any(&["task", "task_name"]), Some("Design Mockups"));
        assert_eq!(rows[0].get_any(&["dependencies"]), None);
    }
}
