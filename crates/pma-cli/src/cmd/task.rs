use crate::output::{print_json, print_table};
use clap::Subcommand;
use pma_core::{
    project::{Project, ProjectPatch},
    task as task_ops,
    types::{Recurrence, TaskStatus},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// List tasks
    List {
        /// Only tasks in this sprint (id or name)
        #[arg(long)]
        sprint: Option<String>,
        /// Only tasks with this status (todo, in_progress, review, done)
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Move a task to in progress
    Start { id: String },
    /// Move a task to review
    Review { id: String },
    /// Complete a task; recurring tasks spawn their next occurrence
    Complete { id: String },
    /// Add a comment to a task
    Comment {
        id: String,
        #[arg(required = true)]
        text: Vec<String>,
        #[arg(long, default_value = "pma")]
        author: String,
    },
    /// Record actual hours and cost
    Actuals {
        id: String,
        #[arg(long)]
        time: Option<f64>,
        #[arg(long)]
        cost: Option<f64>,
    },
    /// Set how a task repeats and whether an agent may work it
    Set {
        id: String,
        /// daily, weekly, monthly or none
        #[arg(long)]
        recurrence: Option<String>,
        #[arg(long)]
        use_agent: Option<bool>,
    },
    /// Show the next task that is ready to start
    Next,
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TaskSubcommand::List { sprint, status } => list(root, sprint.as_deref(), status, json),
        TaskSubcommand::Start { id } => set_status(root, &id, TaskStatus::InProgress, json),
        TaskSubcommand::Review { id } => set_status(root, &id, TaskStatus::Review, json),
        TaskSubcommand::Complete { id } => set_status(root, &id, TaskStatus::Done, json),
        TaskSubcommand::Comment { id, text, author } => {
            comment(root, &id, &author, &text.join(" "), json)
        }
        TaskSubcommand::Actuals { id, time, cost } => actuals(root, &id, time, cost, json),
        TaskSubcommand::Set {
            id,
            recurrence,
            use_agent,
        } => configure(root, &id, recurrence.as_deref(), use_agent, json),
        TaskSubcommand::Next => next(root, json),
    }
}

fn sprint_name(project: &Project, sprint_id: Option<&str>) -> String {
    sprint_id
        .and_then(|id| project.sprints.iter().find(|s| s.id == id))
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "-".to_string())
}

fn list(
    root: &Path,
    sprint: Option<&str>,
    status: Option<TaskStatus>,
    json: bool,
) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    let tasks: Vec<_> = project
        .tasks
        .iter()
        .filter(|t| status.map(|s| t.status == s).unwrap_or(true))
        .filter(|t| match sprint {
            None => true,
            Some(want) => t.sprint_id.as_deref().is_some_and(|id| {
                id == want || sprint_name(&project, Some(id)).eq_ignore_ascii_case(want)
            }),
        })
        .collect();

    if json {
        print_json(&tasks)?;
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks. Tracking is created when every document is approved (or via `pma track`).");
        return Ok(());
    }
    print_table(
        &["ID", "NAME", "ROLE", "START", "END", "SPRINT", "STATUS", "DEPENDS"],
        tasks
            .iter()
            .map(|t| {
                vec![
                    t.id.clone(),
                    t.name.clone(),
                    t.role.clone(),
                    t.start_date.to_string(),
                    t.end_date.to_string(),
                    sprint_name(&project, t.sprint_id.as_deref()),
                    t.status.to_string(),
                    if t.depends_on.is_empty() {
                        "-".to_string()
                    } else {
                        t.depends_on.join(",")
                    },
                ]
            })
            .collect(),
    );
    println!("\n{}", task_ops::summarize(&project.tasks));
    Ok(())
}

fn set_status(root: &Path, id: &str, status: TaskStatus, json: bool) -> anyhow::Result<()> {
    let mut project = super::load_project(root)?;
    let before = project.tasks.len();
    let milestones_done = completed_milestones(&project);
    super::commit(
        root,
        &mut project,
        ProjectPatch::SetTaskStatus {
            task_id: id.to_string(),
            status,
        },
    )?;
    let spawned = project.tasks.get(before).map(|t| t.id.clone());
    let newly_completed = completed_milestones(&project) - milestones_done;

    if json {
        print_json(&serde_json::json!({
            "task_id": id,
            "status": status,
            "spawned": spawned,
            "milestones_completed": newly_completed,
        }))?;
        return Ok(());
    }
    println!("Task [{id}] is now {status}");
    if let Some(next) = spawned {
        println!("  recurring: scheduled [{next}]");
    }
    if newly_completed > 0 {
        println!("  milestones completed: {newly_completed}");
    }
    Ok(())
}

fn completed_milestones(project: &Project) -> usize {
    project
        .milestones
        .iter()
        .filter(|m| m.actual_date.is_some())
        .count()
}

fn comment(root: &Path, id: &str, author: &str, text: &str, json: bool) -> anyhow::Result<()> {
    let mut project = super::load_project(root)?;
    super::commit(
        root,
        &mut project,
        ProjectPatch::CommentTask {
            task_id: id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
        },
    )?;
    if json {
        print_json(&serde_json::json!({ "task_id": id, "author": author, "text": text }))?;
    } else {
        println!("Commented on [{id}]");
    }
    Ok(())
}

fn actuals(
    root: &Path,
    id: &str,
    time: Option<f64>,
    cost: Option<f64>,
    json: bool,
) -> anyhow::Result<()> {
    if time.is_none() && cost.is_none() {
        anyhow::bail!("nothing to record: pass --time and/or --cost");
    }
    let mut project = super::load_project(root)?;
    super::commit(
        root,
        &mut project,
        ProjectPatch::RecordActuals {
            task_id: id.to_string(),
            time,
            cost,
        },
    )?;
    let task = task_ops::find(&project.tasks, id)?;
    if json {
        print_json(task)?;
    } else {
        println!(
            "Recorded actuals for [{id}]: {} h, cost {}",
            task.actual_time.map(|t| t.to_string()).unwrap_or_else(|| "-".into()),
            task.actual_cost.map(|c| c.to_string()).unwrap_or_else(|| "-".into())
        );
    }
    Ok(())
}

fn configure(
    root: &Path,
    id: &str,
    recurrence: Option<&str>,
    use_agent: Option<bool>,
    json: bool,
) -> anyhow::Result<()> {
    let recurrence = match recurrence {
        None => None,
        Some("none") => Some(None),
        Some(r) => Some(Some(r.parse::<Recurrence>()?)),
    };
    let mut project = super::load_project(root)?;
    super::commit(
        root,
        &mut project,
        ProjectPatch::ConfigureTask {
            task_id: id.to_string(),
            recurrence,
            use_agent,
        },
    )?;
    let task = task_ops::find(&project.tasks, id)?;
    if json {
        print_json(task)?;
    } else {
        println!(
            "Task [{id}]: recurrence {}, agent {}",
            task.recurrence.map(|r| r.to_string()).unwrap_or_else(|| "none".into()),
            if task.use_agent { "allowed" } else { "off" }
        );
    }
    Ok(())
}

fn next(root: &Path, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    let next = task_ops::next_task(&project.tasks);
    if json {
        print_json(&next)?;
        return Ok(());
    }
    match next {
        Some(t) => println!(
            "[{}] {} ({} to {}){}",
            t.id,
            t.name,
            t.start_date,
            t.end_date,
            if t.role.is_empty() {
                String::new()
            } else {
                format!(", {}", t.role)
            }
        ),
        None => println!("No task is ready to start."),
    }
    Ok(())
}
