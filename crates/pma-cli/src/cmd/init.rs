use crate::output::print_json;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use pma_core::{config::Config, hmap, io, paths, project::Project};
use std::path::Path;

pub struct InitArgs {
    pub name: Option<String>,
    pub description: String,
    pub budget: Option<i64>,
    pub end_date: Option<NaiveDate>,
    pub propose: bool,
}

pub fn run(root: &Path, args: InitArgs, json: bool) -> anyhow::Result<()> {
    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    for dir in [paths::PMA_DIR, paths::EXPORTS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_created = !paths::config_path(root).exists();
    let config = if config_created {
        let cfg = Config::new(&name);
        cfg.save(root).context("failed to write config.yaml")?;
        cfg
    } else {
        Config::load(root).context("failed to load config.yaml")?
    };

    let project_created = !paths::project_path(root).exists();
    let mut proposed = false;
    if project_created {
        let documents = if args.propose {
            let orch = super::orchestrator(root, &config)?;
            let (docs, used) = super::block_on(orch.propose(&name, &args.description))?;
            proposed = used;
            docs
        } else {
            hmap::default_documents()
        };
        let mut project = Project::with_documents(&name, &args.description, documents, Utc::now());
        project.budget = args.budget.unwrap_or(0);
        project.end_date = args.end_date;
        project.save(root).context("failed to write project.yaml")?;
    }

    let project = super::load_project(root)?;
    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "project": project.name,
            "config_created": config_created,
            "project_created": project_created,
            "proposed": proposed,
            "documents": project.documents.len(),
        }))?;
        return Ok(());
    }

    println!("Initializing pma in: {}", root.display());
    let mark = |created: bool| if created { "created:" } else { "exists: " };
    println!("  {} {}", mark(config_created), paths::CONFIG_FILE);
    println!("  {} {}", mark(project_created), paths::PROJECT_FILE);
    if project_created && args.propose && !proposed {
        println!("  the LLM proposal was unusable; using the HMAP document set");
    }
    println!(
        "\nProject '{}' has {} documents. Next: pma doc generate {}",
        project.name,
        project.documents.len(),
        project
            .ordered_documents()
            .first()
            .map(|d| d.id.as_str())
            .unwrap_or("<id>")
    );
    for w in project.warnings() {
        println!("warning: {}", w.message);
    }
    Ok(())
}
