use crate::error::{PmaError, Result};
use crate::task::Task;
use crate::types::{MilestoneStatus, TaskStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    pub planned_date: NaiveDate,
    #[serde(default)]
    pub actual_date: Option<NaiveDate>,
    pub status: MilestoneStatus,
}

impl Milestone {
    pub fn new(id: impl Into<String>, name: impl Into<String>, planned_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            planned_date,
            actual_date: None,
            status: MilestoneStatus::Planned,
        }
    }

    pub fn complete(&mut self, on: NaiveDate) {
        self.status = MilestoneStatus::Completed;
        self.actual_date = Some(on);
    }

    /// Slip in days against the plan; positive means late.
    pub fn slip_days(&self) -> Option<i64> {
        self.actual_date
            .map(|a| (a - self.planned_date).num_days())
    }
}

pub fn complete(milestones: &mut [Milestone], id: &str, on: NaiveDate) -> Result<()> {
    let m = milestones
        .iter_mut()
        .find(|m| m.id == id)
        .ok_or_else(|| PmaError::MilestoneNotFound(id.to_string()))?;
    m.complete(on);
    Ok(())
}

/// Mark planned milestones complete when every task due on or before the
/// milestone date is done. Returns the number of milestones changed.
///
/// The actual date is the latest completion date among those tasks. A
/// milestone with no tasks due before it is left alone.
pub fn infer_statuses(milestones: &mut [Milestone], tasks: &[Task]) -> usize {
    let mut changed = 0;
    for m in milestones
        .iter_mut()
        .filter(|m| m.status == MilestoneStatus::Planned)
    {
        let due: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.end_date <= m.planned_date)
            .collect();
        if due.is_empty() || due.iter().any(|t| t.status != TaskStatus::Done) {
            continue;
        }
        let finished = due
            .iter()
            .filter_map(|t| t.actual_end_date)
            .max()
            .unwrap_or(m.planned_date);
        m.complete(finished);
        changed += 1;
    }
    changed
}
