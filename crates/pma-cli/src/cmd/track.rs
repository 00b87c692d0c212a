use crate::output::print_json;
use anyhow::Context;
use pma_core::project::TrackingOutcome;
use std::path::Path;

/// Build tracking without waiting for every document to be approved.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let mut project = super::load_project(root)?;
    let outcome = project.build_tracking(chrono::Utc::now());
    if let TrackingOutcome::Failed { message } = &outcome {
        anyhow::bail!("tracking could not be built: {message}");
    }
    project.save(root).context("failed to save project")?;

    if json {
        print_json(&outcome)?;
    } else if let TrackingOutcome::Built { tasks, milestones } = outcome {
        println!("Created {tasks} tasks and {milestones} milestones");
    }
    Ok(())
}
