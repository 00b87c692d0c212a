use crate::output::print_json;
use pma_core::project::TrackingOutcome;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let mut project = super::load_project(root)?;
    let orch = super::orchestrator(root, &config)?;

    if project.all_approved() {
        if json {
            print_json(&serde_json::json!({ "approved": [], "failure": null }))?;
        } else {
            println!("All documents are already approved.");
        }
        return Ok(());
    }

    let summary = super::block_on(orch.auto(&mut project))?;

    if json {
        print_json(&summary)?;
    } else {
        for id in &summary.approved {
            println!("approved: {id}");
        }
        match &summary.tracking {
            Some(TrackingOutcome::Built { tasks, milestones }) => {
                println!("Tracking created: {tasks} tasks, {milestones} milestones");
            }
            Some(TrackingOutcome::Failed { message }) => {
                println!("Tracking could not be built: {message}");
            }
            _ => {}
        }
    }

    if let Some(failure) = summary.failure {
        anyhow::bail!(
            "auto mode stopped at '{}': {}. Fix the cause, then re-run `pma auto`",
            failure.doc_id,
            failure.message
        );
    }
    Ok(())
}
