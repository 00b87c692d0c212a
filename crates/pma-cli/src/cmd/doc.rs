use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use pma_core::{io, paths, project::ProjectPatch, project::TrackingOutcome, workflow};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum DocSubcommand {
    /// List documents in phase order with their state
    List,
    /// Print a document's content
    Show {
        id: String,
        /// Print the compacted form used as context
        #[arg(long)]
        compacted: bool,
    },
    /// Generate (or regenerate) a document, then compact it
    Generate { id: String },
    /// Finish a generation that was interrupted
    Resume { id: String },
    /// Replace a document's content with a file's, for manual edits
    Edit {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Approve a document, unlocking the next one
    Approve { id: String },
    /// Reject a document
    Reject { id: String },
    /// Write a document's content to .pma/exports/<id>.md
    Export { id: String },
}

pub fn run(root: &Path, subcmd: DocSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DocSubcommand::List => list(root, json),
        DocSubcommand::Show { id, compacted } => show(root, &id, compacted, json),
        DocSubcommand::Generate { id } => generate(root, &id, json),
        DocSubcommand::Resume { id } => resume(root, &id, json),
        DocSubcommand::Edit { id, file } => edit(root, &id, &file, json),
        DocSubcommand::Approve { id } => approve(root, &id, json),
        DocSubcommand::Reject { id } => reject(root, &id, json),
        DocSubcommand::Export { id } => export(root, &id, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    let mut rows = Vec::new();
    for doc in project.ordered_documents() {
        let state = workflow::state_of(&project.documents, &doc.id)?;
        rows.push((doc, state));
    }

    if json {
        let items: Vec<_> = rows
            .iter()
            .map(|(d, state)| {
                serde_json::json!({
                    "id": d.id,
                    "title": d.title,
                    "phase": d.phase,
                    "sequence": d.sequence,
                    "category": d.category(),
                    "state": state,
                    "version": d.version,
                    "last_error": d.last_error,
                })
            })
            .collect();
        print_json(&items)?;
        return Ok(());
    }

    print_table(
        &["ID", "PHASE", "TITLE", "STATE", "VER"],
        rows.iter()
            .map(|(d, state)| {
                vec![
                    d.id.clone(),
                    d.phase.to_string(),
                    d.title.clone(),
                    state.to_string(),
                    d.version.to_string(),
                ]
            })
            .collect(),
    );
    Ok(())
}

fn show(root: &Path, id: &str, compacted: bool, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    let doc = project.document(id)?;
    let data = project.data(id);
    let text = if compacted {
        data.and_then(|d| d.compacted()).unwrap_or_default()
    } else {
        data.map(|d| d.content.as_str()).unwrap_or_default()
    };

    if json {
        print_json(&serde_json::json!({
            "id": doc.id,
            "title": doc.title,
            "status": doc.status,
            "version": doc.version,
            "content": data.map(|d| d.content.as_str()),
            "compacted_content": data.and_then(|d| d.compacted()),
        }))?;
    } else if text.is_empty() {
        println!("'{id}' has no {}content yet", if compacted { "compacted " } else { "" });
    } else {
        println!("{text}");
    }
    Ok(())
}

fn generate(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let mut project = super::load_project(root)?;
    let orch = super::orchestrator(root, &config)?;
    super::block_on(orch.generate(&mut project, id))?
        .with_context(|| format!("failed to generate '{id}'"))?;
    report_ready(&project, id, json)
}

fn resume(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let mut project = super::load_project(root)?;
    let orch = super::orchestrator(root, &config)?;
    let resumed = super::block_on(orch.resume(&mut project, id))?
        .with_context(|| format!("failed to resume '{id}'"))?;
    if !resumed && !json {
        println!("'{id}' has nothing to resume");
        return Ok(());
    }
    report_ready(&project, id, json)
}

fn report_ready(project: &pma_core::project::Project, id: &str, json: bool) -> anyhow::Result<()> {
    let doc = project.document(id)?;
    if json {
        print_json(&serde_json::json!({
            "id": doc.id,
            "status": doc.status,
            "version": doc.version,
        }))?;
    } else {
        println!("Generated '{}' (version {}), ready for review", doc.title, doc.version);
        println!("  review: pma doc show {id}");
        println!("  then:   pma doc approve {id}");
    }
    Ok(())
}

fn edit(root: &Path, id: &str, file: &Path, json: bool) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut project = super::load_project(root)?;
    super::commit(
        root,
        &mut project,
        ProjectPatch::EditContent {
            doc_id: id.to_string(),
            content,
        },
    )?;
    let doc = project.document(id)?;
    if json {
        print_json(&serde_json::json!({ "id": id, "version": doc.version, "status": doc.status }))?;
    } else {
        println!("Updated '{}' (version {})", doc.title, doc.version);
    }
    Ok(())
}

fn approve(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let mut project = super::load_project(root)?;
    let outcome = project.approve_document(id, chrono::Utc::now())?;
    project.save(root).context("failed to save project")?;

    if json {
        print_json(&serde_json::json!({ "id": id, "status": "approved", "tracking": outcome }))?;
        return Ok(());
    }
    println!("Approved '{id}'");
    match outcome {
        TrackingOutcome::NotTriggered => {
            if let Some(next) = project.ordered_documents().iter().find(|d| !d.is_approved()) {
                println!("  unlocked: {}", next.id);
            }
        }
        TrackingOutcome::Built { tasks, milestones } => {
            println!("All documents approved: created {tasks} tasks and {milestones} milestones");
        }
        TrackingOutcome::Failed { message } => {
            println!("All documents approved, but tracking could not be built: {message}");
            println!("  fix the Detailed Plans document, then run: pma track");
        }
    }
    Ok(())
}

fn reject(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let mut project = super::load_project(root)?;
    super::commit(
        root,
        &mut project,
        ProjectPatch::Reject {
            doc_id: id.to_string(),
        },
    )?;
    if json {
        print_json(&serde_json::json!({ "id": id, "status": "rejected" }))?;
    } else {
        println!("Rejected '{id}'. Regenerate with: pma doc generate {id}");
    }
    Ok(())
}

fn export(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    let doc = project.document(id)?;
    let content = project
        .data(id)
        .map(|d| d.content.as_str())
        .filter(|c| !c.trim().is_empty())
        .with_context(|| format!("'{id}' has no content to export"))?;
    let path = paths::export_path(root, &doc.id)?;
    io::atomic_write(&path, content.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "path": path.display().to_string() }))?;
    } else {
        println!("Exported '{}' to {}", doc.title, path.display());
    }
    Ok(())
}
