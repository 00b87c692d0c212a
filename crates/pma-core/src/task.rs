use crate::document::Attachment;
use crate::error::{PmaError, Result};
use crate::types::{AgentStatus, Recurrence, TaskStatus};
use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub sprint_id: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub is_subcontracted: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Hours spent.
    #[serde(default)]
    pub actual_time: Option<f64>,
    #[serde(default)]
    pub actual_cost: Option<f64>,
    #[serde(default)]
    pub actual_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub use_agent: bool,
    #[serde(default)]
    pub agent_status: Option<AgentStatus>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: String::new(),
            start_date,
            end_date,
            sprint_id: None,
            status: TaskStatus::Todo,
            is_subcontracted: false,
            depends_on: Vec::new(),
            actual_time: None,
            actual_cost: None,
            actual_end_date: None,
            comments: Vec::new(),
            attachments: Vec::new(),
            recurrence: None,
            use_agent: false,
            agent_status: None,
        }
    }

    /// The next occurrence of a recurring task, or `None` if not recurring.
    pub fn next_occurrence(&self, id: impl Into<String>) -> Option<Task> {
        let recurrence = self.recurrence?;
        let shift = |d: NaiveDate| match recurrence {
            Recurrence::Daily => d.checked_add_days(Days::new(1)).unwrap_or(d),
            Recurrence::Weekly => d.checked_add_days(Days::new(7)).unwrap_or(d),
            Recurrence::Monthly => d.checked_add_months(Months::new(1)).unwrap_or(d),
        };
        let mut next = Task::new(id, self.name.clone(), shift(self.start_date), shift(self.end_date));
        next.role = self.role.clone();
        next.sprint_id = self.sprint_id.clone();
        next.is_subcontracted = self.is_subcontracted;
        next.depends_on = self.depends_on.clone();
        next.recurrence = self.recurrence;
        next.use_agent = self.use_agent;
        Some(next)
    }
}

// ---------------------------------------------------------------------------
// Task list operations (operate on a mutable Vec<Task>)
// ---------------------------------------------------------------------------

/// Move a task to `status`. Completing stamps `actual_end_date` and, for a
/// recurring task, appends its next occurrence. Returns the spawned task id.
pub fn set_status(
    tasks: &mut Vec<Task>,
    id: &str,
    status: TaskStatus,
    today: NaiveDate,
) -> Result<Option<String>> {
    let len = tasks.len();
    let task = find_mut(tasks, id)?;
    let was_done = task.status == TaskStatus::Done;
    task.status = status;

    if status != TaskStatus::Done {
        task.actual_end_date = None;
        return Ok(None);
    }
    if was_done {
        return Ok(None);
    }

    task.actual_end_date = Some(today);
    let next_id = format!("{}-r{len}", base_id(&task.id));
    let Some(next) = task.next_occurrence(next_id) else {
        return Ok(None);
    };
    let spawned_id = next.id.clone();
    tasks.push(next);
    Ok(Some(spawned_id))
}

fn base_id(id: &str) -> &str {
    match id.rfind("-r") {
        Some(pos) if id[pos + 2..].chars().all(|c| c.is_ascii_digit()) && pos + 2 < id.len() => {
            &id[..pos]
        }
        _ => id,
    }
}

pub fn add_comment(
    tasks: &mut [Task],
    id: &str,
    author: impl Into<String>,
    text: impl Into<String>,
) -> Result<()> {
    let task = find_mut(tasks, id)?;
    task.comments.push(Comment {
        author: author.into(),
        text: text.into(),
        created_at: Utc::now(),
    });
    Ok(())
}

pub fn record_actuals(
    tasks: &mut [Task],
    id: &str,
    time: Option<f64>,
    cost: Option<f64>,
) -> Result<()> {
    let task = find_mut(tasks, id)?;
    if time.is_some() {
        task.actual_time = time;
    }
    if cost.is_some() {
        task.actual_cost = cost;
    }
    Ok(())
}

/// Return the first `todo` task whose dependencies are all done.
pub fn next_task(tasks: &[Task]) -> Option<&Task> {
    let done: std::collections::HashSet<&str> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .map(|t| t.id.as_str())
        .collect();

    tasks.iter().find(|t| {
        t.status == TaskStatus::Todo && t.depends_on.iter().all(|dep| done.contains(dep.as_str()))
    })
}

/// Human-readable summary: "3/5 done, 1 in progress, 1 in review"
pub fn summarize(tasks: &[Task]) -> String {
    let total = tasks.len();
    let count = |s: TaskStatus| tasks.iter().filter(|t| t.status == s).count();
    format!(
        "{}/{total} done, {} in progress, {} in review",
        count(TaskStatus::Done),
        count(TaskStatus::InProgress),
        count(TaskStatus::Review)
    )
}

pub fn find<'a>(tasks: &'a [Task], id: &str) -> Result<&'a Task> {
    tasks
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| PmaError::TaskNotFound(id.to_string()))
}

fn find_mut<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| PmaError::TaskNotFound(id.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
