//! Change requests and their deployment plans.

use crate::document::Document;
use crate::error::{PmaError, Result};
use crate::impact::{apply_impact, parse_impact, shift_date, Baseline, Impact};
use crate::task::Task;
use crate::types::{ChangeStatus, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub reason: String,
    /// Compact `±Nd ±Mc` notation.
    #[serde(default)]
    pub impact_str: String,
    pub status: ChangeStatus,
    /// Ids of the documents revised when the change was applied.
    #[serde(default)]
    pub affected: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ChangeRequest {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        reason: impl Into<String>,
        impact_str: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            reason: reason.into(),
            impact_str: impact_str.into(),
            status: ChangeStatus::Proposed,
            affected: Vec::new(),
            created_at: now,
        }
    }

    pub fn impact(&self) -> Impact {
        parse_impact(&self.impact_str)
    }

    pub fn projected(&self, baseline: Baseline) -> Result<Baseline> {
        apply_impact(baseline, self.impact())
    }
}

/// Next free `cr-N` id.
pub fn next_id(changes: &[ChangeRequest]) -> String {
    let n = changes
        .iter()
        .filter_map(|c| c.id.strip_prefix("cr-")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("cr-{}", n + 1)
}

pub fn find<'a>(changes: &'a [ChangeRequest], id: &str) -> Option<&'a ChangeRequest> {
    changes.iter().find(|c| c.id == id)
}

/// Markdown plan for rolling out a change.
///
/// Open tasks are shifted by the change's day impact; done tasks stay put.
pub fn deployment_plan(
    change: &ChangeRequest,
    baseline: Baseline,
    affected: &[&Document],
    tasks: &[Task],
) -> Result<String> {
    let impact = change.impact();
    let projected = apply_impact(baseline, impact)?;
    let mut out = String::new();

    let _ = writeln!(out, "# Deployment Plan: {}\n", change.title);

    out.push_str("## Impact Analysis\n\n");
    if !change.reason.trim().is_empty() {
        let _ = writeln!(out, "Reason: {}\n", change.reason.trim());
    }
    let _ = writeln!(out, "Impact: {impact}\n");
    let _ = writeln!(
        out,
        "- End date: {} -> {} ({:+} days)",
        baseline.end_date, projected.end_date, impact.days
    );
    let _ = writeln!(
        out,
        "- Budget: {} -> {} ({:+})\n",
        baseline.budget, projected.budget, impact.cost
    );

    out.push_str("## Affected Documents\n\n");
    if affected.is_empty() {
        out.push_str("- None\n");
    }
    for doc in affected {
        let _ = writeln!(out, "- {} (phase {}): review and re-approve", doc.title, doc.phase);
    }
    out.push('\n');

    out.push_str("## Task Modifications\n\n");
    let open: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Done)
        .collect();
    if impact.days == 0 || open.is_empty() {
        out.push_str("- No schedule changes required\n");
    } else {
        for task in open {
            let shifted = shift_date(task.end_date, impact.days)
                .ok_or_else(|| PmaError::ImpactOutOfRange(impact.to_string()))?;
            let _ = writeln!(out, "- {}: end {} -> {}", task.name, task.end_date, shifted);
        }
    }
    Ok(out)
}
