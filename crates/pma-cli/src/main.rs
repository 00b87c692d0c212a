mod cmd;
mod output;
mod root;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cmd::{
    agent::AgentSubcommand, change::ChangeSubcommand, config::ConfigSubcommand,
    doc::DocSubcommand, milestone::MilestoneSubcommand, task::TaskSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pma",
    about = "Project Management Accelerator: generate, approve and track an HMAP project plan",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .pma/ or .git/)
    #[arg(long, global = true, env = "PMA_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .pma/ with a config and a project holding the HMAP documents
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        budget: Option<i64>,
        /// Target end date (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,
        /// Ask the LLM for the document list instead of the fixed HMAP set
        #[arg(long)]
        propose: bool,
    },

    /// Show documents, tracking progress and warnings
    Status,

    /// Generate, review and export planning documents
    Doc {
        #[command(subcommand)]
        subcommand: DocSubcommand,
    },

    /// Generate, compact and approve every remaining document in order
    Auto,

    /// Build tasks and milestones from the Detailed Plans document
    Track,

    /// Manage tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Manage milestones
    Milestone {
        #[command(subcommand)]
        subcommand: MilestoneSubcommand,
    },

    /// Project an impact string such as "+15d +5000c" onto the schedule and budget
    Impact {
        #[arg(allow_hyphen_values = true)]
        impact: String,
        /// Budget to project from (default: the project's)
        #[arg(long, allow_hyphen_values = true)]
        budget: Option<i64>,
        /// End date to project from (default: the project's)
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },

    /// List the roles and resources named in the Resources document
    Roles,

    /// Manage change requests
    Change {
        #[command(subcommand)]
        subcommand: ChangeSubcommand,
    },

    /// Run a task agent
    Agent {
        #[command(subcommand)]
        subcommand: AgentSubcommand,
    },

    /// Show or validate .pma/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Auto | Commands::Agent { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init {
            name,
            description,
            budget,
            end_date,
            propose,
        } => cmd::init::run(
            &root,
            cmd::init::InitArgs {
                name,
                description,
                budget,
                end_date,
                propose,
            },
            cli.json,
        ),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Doc { subcommand } => cmd::doc::run(&root, subcommand, cli.json),
        Commands::Auto => cmd::auto::run(&root, cli.json),
        Commands::Track => cmd::track::run(&root, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Milestone { subcommand } => cmd::milestone::run(&root, subcommand, cli.json),
        Commands::Impact {
            impact,
            budget,
            end_date,
        } => cmd::impact::run(&root, &impact, budget, end_date, cli.json),
        Commands::Roles => cmd::roles::run(&root, cli.json),
        Commands::Change { subcommand } => cmd::change::run(&root, subcommand, cli.json),
        Commands::Agent { subcommand } => cmd::agent::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
