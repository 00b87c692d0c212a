use crate::output::print_json;
use anyhow::Context;
use pma_agent::agentic::AgentOutcome;
use std::path::Path;

#[derive(clap::Subcommand)]
pub enum AgentSubcommand {
    /// Draft a task's deliverable with the Doer/Tools/Tester loop.
    ///
    /// On success the deliverable is added to the project as an approved
    /// document. If the Tester never answers COMPLETE within
    /// `agents.task_max_iterations`, the task is flagged for manual work.
    Task {
        /// Task id (see `pma task list`)
        id: String,
        /// Print every agent turn
        #[arg(long)]
        transcript: bool,
    },
}

pub fn run(root: &Path, subcommand: AgentSubcommand, json: bool) -> anyhow::Result<()> {
    let AgentSubcommand::Task { id, transcript } = subcommand;

    let config = super::load_config(root)?;
    let mut project = super::load_project(root)?;
    let task = pma_core::task::find(&project.tasks, &id)?;
    if !task.use_agent {
        tracing::info!(task = %id, "task is not flagged for agents; running on request");
    }
    let orch = super::orchestrator(root, &config)?;

    tracing::info!(task = %id, max_iterations = config.agents.task_max_iterations, "starting task agent");
    let outcome = super::block_on(orch.run_task_agent(&mut project, &id))?
        .with_context(|| format!("task agent failed for '{id}'"))?;

    if json {
        print_json(&outcome)?;
    } else if transcript {
        let entries = match &outcome {
            AgentOutcome::Completed { transcript, .. }
            | AgentOutcome::NeedsManualCompletion { transcript, .. } => transcript,
        };
        for e in entries {
            println!("--- iteration {} / {} ---\n{}\n", e.iteration, e.role, e.text);
        }
    }

    match outcome {
        AgentOutcome::Completed {
            title, iterations, ..
        } => {
            if !json {
                println!("Task [{id}] completed in {iterations} iteration(s): added '{title}'");
            }
            Ok(())
        }
        AgentOutcome::NeedsManualCompletion { error, .. } => {
            anyhow::bail!("task [{id}] needs manual completion: {error}")
        }
    }
}
