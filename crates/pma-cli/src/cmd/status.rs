use crate::output::{print_json, print_table};
use pma_core::{task, types::MilestoneStatus, workflow};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    let baseline = project.baseline();

    let mut rows = Vec::new();
    let mut approved = 0usize;
    for doc in project.ordered_documents() {
        let state = workflow::state_of(&project.documents, &doc.id)?;
        if doc.is_approved() {
            approved += 1;
        }
        rows.push((doc, state));
    }
    let next = rows.iter().find(|(d, _)| !d.is_approved()).map(|(d, _)| d.id.clone());
    let milestones_done = project
        .milestones
        .iter()
        .filter(|m| m.status == MilestoneStatus::Completed)
        .count();
    let warnings = project.warnings();

    if json {
        let documents: Vec<_> = rows
            .iter()
            .map(|(d, state)| {
                serde_json::json!({
                    "id": d.id,
                    "title": d.title,
                    "phase": d.phase,
                    "state": state,
                    "version": d.version,
                    "last_error": d.last_error,
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "project": project.name,
            "budget": baseline.budget,
            "end_date": baseline.end_date,
            "documents": documents,
            "approved": approved,
            "next_document": next,
            "tasks": project.tasks.len(),
            "milestones": project.milestones.len(),
            "milestones_completed": milestones_done,
            "change_requests": project.change_requests.len(),
            "warnings": warnings,
        }))?;
        return Ok(());
    }

    println!("Project: {}", project.name);
    if !project.description.is_empty() {
        println!("  {}", project.description);
    }
    println!("Budget: {}  End date: {}", baseline.budget, baseline.end_date);
    println!("\nDocuments ({approved}/{} approved):", rows.len());
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
    if let Some(id) = next {
        println!("\nNext document: {id}");
    }
    if !project.tasks.is_empty() {
        println!("\nTasks: {}", task::summarize(&project.tasks));
        println!(
            "Milestones: {milestones_done}/{} completed",
            project.milestones.len()
        );
    }
    if !project.change_requests.is_empty() {
        println!("Change requests: {}", project.change_requests.len());
    }
    for w in &warnings {
        println!("warning: {}", w.message);
    }
    Ok(())
}
