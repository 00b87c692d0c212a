use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use pma_agent::agentic::ChangeOutcome;
use pma_core::{
    change::{self, ChangeRequest},
    document::Document,
    io,
    project::ProjectPatch,
};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ChangeSubcommand {
    /// Record a change request
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        reason: String,
        /// Schedule and budget delta, e.g. "+15d +5000c"
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        impact: String,
    },
    /// List change requests
    List,
    /// Revise the affected documents with the change agent
    Run { id: String },
    /// Render the deployment plan for a change
    Plan {
        id: String,
        /// Write the plan to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: ChangeSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ChangeSubcommand::Create {
            title,
            reason,
            impact,
        } => create(root, &title, &reason, &impact, json),
        ChangeSubcommand::List => list(root, json),
        ChangeSubcommand::Run { id } => run_agent(root, &id, json),
        ChangeSubcommand::Plan { id, output } => plan(root, &id, output.as_deref(), json),
    }
}

fn create(root: &Path, title: &str, reason: &str, impact: &str, json: bool) -> anyhow::Result<()> {
    let mut project = super::load_project(root)?;
    let id = change::next_id(&project.change_requests);
    let request = ChangeRequest::new(&id, title, reason, impact, chrono::Utc::now());
    let projected = request.projected(project.baseline())?;
    super::commit(root, &mut project, ProjectPatch::AddChangeRequest(request))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "title": title, "projected": projected }))?;
    } else {
        println!("Created change request [{id}]: {title}");
        println!(
            "  projected end date {}, budget {}",
            projected.end_date, projected.budget
        );
        println!("  next: pma change run {id}");
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    if json {
        print_json(&project.change_requests)?;
        return Ok(());
    }
    if project.change_requests.is_empty() {
        println!("No change requests.");
        return Ok(());
    }
    print_table(
        &["ID", "TITLE", "IMPACT", "STATUS", "AFFECTED"],
        project
            .change_requests
            .iter()
            .map(|c| {
                vec![
                    c.id.clone(),
                    c.title.clone(),
                    c.impact().to_string(),
                    c.status.to_string(),
                    if c.affected.is_empty() {
                        "-".to_string()
                    } else {
                        c.affected.join(",")
                    },
                ]
            })
            .collect(),
    );
    Ok(())
}

fn run_agent(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let mut project = super::load_project(root)?;
    let orch = super::orchestrator(root, &config)?;
    let outcome = super::block_on(orch.run_change(&mut project, id))?
        .with_context(|| format!("change agent failed for '{id}'"))?;

    if json {
        print_json(&outcome)?;
    }
    match outcome {
        ChangeOutcome::Applied {
            revisions,
            iterations,
            ..
        } => {
            if !json {
                println!("Change [{id}] applied after {iterations} iteration(s)");
                for (doc_id, _) in &revisions {
                    println!("  revised: {doc_id} (needs re-approval)");
                }
                println!("  plan: pma change plan {id}");
            }
            Ok(())
        }
        ChangeOutcome::NeedsManualCompletion { error, .. } => {
            anyhow::bail!("change [{id}] needs manual completion: {error}")
        }
    }
}

fn plan(root: &Path, id: &str, output: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    let request = project.change(id)?;
    let affected: Vec<&Document> = request
        .affected
        .iter()
        .filter_map(|doc_id| project.document(doc_id).ok())
        .collect();
    let markdown = change::deployment_plan(request, project.baseline(), &affected, &project.tasks)?;

    match output {
        Some(path) => {
            io::atomic_write(path, markdown.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            if json {
                print_json(&serde_json::json!({ "id": id, "path": path.display().to_string() }))?;
            } else {
                println!("Wrote deployment plan to {}", path.display());
            }
        }
        None if json => print_json(&serde_json::json!({ "id": id, "plan": markdown }))?,
        None => print!("{markdown}"),
    }
    Ok(())
}
