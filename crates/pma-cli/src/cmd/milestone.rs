use crate::output::{print_json, print_table};
use chrono::NaiveDate;
use clap::Subcommand;
use pma_core::{project::ProjectPatch, types::MilestoneStatus};
use std::path::Path;

#[derive(Subcommand)]
pub enum MilestoneSubcommand {
    /// List milestones with planned and actual dates
    List,
    /// Mark a milestone completed
    Complete {
        id: String,
        /// Completion date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Complete milestones whose preceding tasks are all done
    Infer,
}

pub fn run(root: &Path, subcmd: MilestoneSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        MilestoneSubcommand::List => list(root, json),
        MilestoneSubcommand::Complete { id, date } => complete(root, &id, date, json),
        MilestoneSubcommand::Infer => infer(root, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    if json {
        print_json(&project.milestones)?;
        return Ok(());
    }
    if project.milestones.is_empty() {
        println!("No milestones.");
        return Ok(());
    }
    print_table(
        &["ID", "NAME", "PLANNED", "ACTUAL", "SLIP", "STATUS"],
        project
            .milestones
            .iter()
            .map(|m| {
                vec![
                    m.id.clone(),
                    m.name.clone(),
                    m.planned_date.to_string(),
                    m.actual_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                    m.slip_days()
                        .map(|d| format!("{d:+}d"))
                        .unwrap_or_else(|| "-".into()),
                    m.status.to_string(),
                ]
            })
            .collect(),
    );
    Ok(())
}

fn complete(root: &Path, id: &str, date: Option<NaiveDate>, json: bool) -> anyhow::Result<()> {
    let mut project = super::load_project(root)?;
    super::commit(
        root,
        &mut project,
        ProjectPatch::CompleteMilestone {
            milestone_id: id.to_string(),
            on: date,
        },
    )?;
    let m = project
        .milestones
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| anyhow::anyhow!("milestone '{id}' not found"))?;
    if json {
        print_json(m)?;
    } else {
        println!(
            "Completed milestone '{}' on {}",
            m.name,
            m.actual_date.map(|d| d.to_string()).unwrap_or_default()
        );
    }
    Ok(())
}

fn infer(root: &Path, json: bool) -> anyhow::Result<()> {
    let mut project = super::load_project(root)?;
    let planned: Vec<String> = project
        .milestones
        .iter()
        .filter(|m| m.status == MilestoneStatus::Planned)
        .map(|m| m.id.clone())
        .collect();
    super::commit(root, &mut project, ProjectPatch::InferMilestones)?;
    let completed: Vec<&str> = project
        .milestones
        .iter()
        .filter(|m| m.status == MilestoneStatus::Completed && planned.contains(&m.id))
        .map(|m| m.name.as_str())
        .collect();

    if json {
        print_json(&serde_json::json!({ "completed": completed }))?;
    } else if completed.is_empty() {
        println!("No milestones changed.");
    } else {
        for name in completed {
            println!("completed: {name}");
        }
    }
    Ok(())
}
