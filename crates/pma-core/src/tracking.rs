//! Turning the approved "Detailed Plans" document into tasks and milestones.
//!
//! [`build_tracking`] is pure: it reads the project and returns the new
//! entities, and the caller persists them in one step. Nothing is written
//! when it fails.

use crate::error::{PmaError, Result};
use crate::milestone::Milestone;
use crate::project::Project;
use crate::table::{parse_markdown_table, TableRow};
use crate::task::Task;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

const TASK_NAME_KEYS: &[&str] = &["task_name", "task", "name"];
const MILESTONE_NAME_KEYS: &[&str] = &["milestone_name", "milestone", "name"];
const MILESTONE_DATE_PREFIXES: &[&str] = &["date", "target_date", "planned_date"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct Tracking {
    pub tasks: Vec<Task>,
    pub milestones: Vec<Milestone>,
}

/// Build tracking only on the transition into "every document approved",
/// and only while the project has no tasks or milestones yet.
pub fn should_build(was_all_approved: bool, project: &Project) -> bool {
    !was_all_approved
        && project.all_approved()
        && project.tasks.is_empty()
        && project.milestones.is_empty()
}

/// Split markdown into `(heading, body)` pairs at each `## ` heading.
/// Text before the first heading is returned with an empty heading.
pub fn split_sections(content: &str) -> Vec<(String, String)> {
    let mut sections = vec![(String::new(), String::new())];
    for line in content.lines() {
        if let Some(heading) = line.trim_start().strip_prefix("## ") {
            sections.push((heading.trim().to_string(), String::new()));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    sections
}

fn find_section<'a>(sections: &'a [(String, String)], prefix: &str) -> Option<&'a str> {
    sections
        .iter()
        .find(|(heading, _)| heading.to_lowercase().starts_with(prefix))
        .map(|(_, body)| body.as_str())
}

fn parse_date(cell: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(cell?.trim(), "%Y-%m-%d").ok()
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn build_tracking(project: &Project, now: DateTime<Utc>) -> Result<Tracking> {
    let plans = project
        .documents
        .iter()
        .find(|d| d.title.to_lowercase().contains("detailed plans"))
        .ok_or_else(|| PmaError::DetailedPlansMissing("no such document".to_string()))?;
    let content = project
        .phase_data
        .get(&plans.id)
        .map(|d| d.content.as_str())
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| PmaError::DetailedPlansMissing(plans.id.clone()))?;

    let sections = split_sections(content);
    let stamp = now.timestamp_millis();
    let task_rows = find_section(&sections, "tasks")
        .map(parse_markdown_table)
        .unwrap_or_default();
    let milestone_rows = find_section(&sections, "milestones")
        .map(parse_markdown_table)
        .unwrap_or_default();

    let tasks = build_tasks(project, &task_rows, stamp);
    let milestones = build_milestones(&milestone_rows, stamp);
    tracing::info!(
        doc = %plans.id,
        tasks = tasks.len(),
        milestones = milestones.len(),
        "tracking built from detailed plans"
    );
    Ok(Tracking { tasks, milestones })
}

fn build_tasks(project: &Project, rows: &[TableRow], stamp: i64) -> Vec<Task> {
    let named: Vec<(usize, &TableRow, &str)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row.get_any(TASK_NAME_KEYS).map(|name| (i, row, name)))
        .collect();

    let ids: HashMap<String, String> = named
        .iter()
        .map(|(i, _, name)| (name_key(name), format!("task-{stamp}-{i}")))
        .collect();

    let fallback_start = project.created_at.date_naive();
    let default_sprint = project.sprints.first().map(|s| s.id.clone());

    named
        .into_iter()
        .map(|(i, row, name)| {
            let id = format!("task-{stamp}-{i}");
            let start = parse_date(row.get_prefixed(&["start_date"])).unwrap_or(fallback_start);
            let end = parse_date(row.get_prefixed(&["end_date"])).unwrap_or(start);
            let mut task = Task::new(id.clone(), name.trim(), start, end);

            task.role = row.get("role").unwrap_or_default().to_string();
            task.depends_on = row
                .get_any(&["dependencies", "depends_on"])
                .unwrap_or_default()
                .split(',')
                .filter_map(|dep| ids.get(&name_key(dep)))
                .filter(|dep| **dep != id)
                .cloned()
                .collect();
            task.sprint_id = row
                .get("sprint")
                .and_then(|cell| {
                    project
                        .sprints
                        .iter()
                        .find(|s| s.name.eq_ignore_ascii_case(cell.trim()))
                })
                .map(|s| s.id.clone())
                .or_else(|| default_sprint.clone());
            task.is_subcontracted = row
                .get_any(&["subcontractor", "subcontracted"])
                .map(|v| v.trim().eq_ignore_ascii_case("yes"))
                .unwrap_or(false);
            task
        })
        .collect()
}

fn build_milestones(rows: &[TableRow], stamp: i64) -> Vec<Milestone> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let name = row.get_any(MILESTONE_NAME_KEYS)?;
            let Some(date) = parse_date(row.get_prefixed(MILESTONE_DATE_PREFIXES)) else {
                tracing::warn!(milestone = %name, "milestone dropped: unparseable date");
                return None;
            };
            Some(Milestone::new(
                format!("milestone-{stamp}-{i}"),
                name.trim(),
                date,
            ))
        })
        .collect()
}
