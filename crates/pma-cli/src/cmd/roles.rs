use crate::output::print_json;
use pma_core::{roles, types::DocumentCategory};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let project = super::load_project(root)?;
    let content = project
        .ordered_documents()
        .into_iter()
        .find(|d| d.category() == DocumentCategory::Resources)
        .and_then(|d| project.data(&d.id))
        .map(|d| d.content.as_str())
        .unwrap_or_default();

    let role_names = roles::parse_roles_from_markdown(content);
    let resources = roles::parse_resources_from_markdown(content);

    if json {
        print_json(&serde_json::json!({ "roles": role_names, "resources": resources }))?;
        return Ok(());
    }
    if content.trim().is_empty() {
        println!("The Resources & Skills document has no content yet.");
        return Ok(());
    }
    println!("Roles:");
    for r in &role_names {
        println!("  - {r}");
    }
    println!("Resources:");
    if resources.is_empty() {
        println!("  (none)");
    }
    for r in &resources {
        println!("  - {r}");
    }
    Ok(())
}
