use crate::output::print_json;
use clap::Subcommand;
use pma_core::config::{ConfigWarning, WarnLevel};
use pma_core::project::Project;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration, defaults included
    Show,
    /// Validate the config and project settings for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    if json {
        print_json(&config)?;
    } else {
        print!("{}", serde_yaml::to_string(&config)?);
        if std::env::var(&config.llm.api_key_env).is_err() {
            println!("# note: {} is not set", config.llm.api_key_env);
        }
    }
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let mut warnings: Vec<ConfigWarning> = config.validate();
    // Project settings are optional here: config may exist before the project.
    if let Ok(project) = Project::load(root) {
        warnings.extend(project.warnings());
    }

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
