mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use conductor::config::{self, ConductorConfig};
use conductor::store::types::TemplateKind;

#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Database-driven configuration synthesis and session lifecycle hooks"
)]
struct Cli {
    /// Config file (default: ~/.conductor/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle one lifecycle event: JSON on stdin, JSON on stdout
    Hook,
    /// Resynthesize a project's settings and write them now
    Resync {
        /// Project name (default: the project registered at the directory)
        project: Option<String>,
        /// Project directory (default: registered path, then current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the synthesized settings without writing them
    Preview {
        project: Option<String>,
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Inspect or close sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Show or checkpoint a project's session state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
    /// Manage configuration templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
    /// Register projects, their types, and overrides
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Show the deployment audit trail
    Deployments {
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Run database diagnostics and print a health report
    Doctor,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Close a session with a summary and outcomes
    End {
        #[arg(long)]
        session: String,
        #[arg(long)]
        summary: Option<String>,
        /// Completed work item (repeatable)
        #[arg(long = "done")]
        done: Vec<String>,
        /// Something learned (repeatable)
        #[arg(long = "learned")]
        learned: Vec<String>,
        /// Focus for the next session on this project
        #[arg(long)]
        focus: Option<String>,
        /// Next step (repeatable)
        #[arg(long = "next")]
        next: Vec<String>,
    },
    /// List sessions, newest first
    List {
        #[arg(long)]
        project: Option<String>,
        /// Only open sessions
        #[arg(long)]
        open: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum StateAction {
    Show {
        project: String,
    },
    Set {
        project: String,
        #[arg(long)]
        focus: Option<String>,
        #[arg(long = "next")]
        next: Vec<String>,
        /// Only write if the stored revision still equals this (0 = no state yet)
        #[arg(long)]
        expect_revision: Option<i64>,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// Create or update a template from a JSON file
    Put {
        name: String,
        /// hook-set, tool-permissions or service-bindings
        #[arg(long)]
        kind: TemplateKind,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        file: PathBuf,
    },
    List,
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Register a project or change its type/path
    Add {
        name: String,
        #[arg(long = "type")]
        project_type: String,
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Replace a project's override document from a JSON file
    Override {
        name: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Set the defaults for a project type
    Type {
        project_type: String,
        #[arg(long)]
        template: String,
        #[arg(long = "service")]
        services: Vec<String>,
        #[arg(long = "capability")]
        capabilities: Vec<String>,
        #[arg(long = "instruction")]
        instructions: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let is_hook = matches!(cli.command, Command::Hook);

    let loaded = match &cli.config {
        Some(path) => ConductorConfig::load_from(path),
        None => ConductorConfig::load(),
    };
    // A hook must still answer with a broken config file; everything else fails fast.
    let (config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) if is_hook => (ConductorConfig::default(), Some(e)),
        Err(e) => return Err(e),
    };

    init_tracing(&config);
    if let Some(e) = config_error {
        tracing::error!(error = %format!("{e:#}"), "config file unusable, using defaults");
    }

    match cli.command {
        Command::Hook => conductor::hooks::run_hook(config).await?,
        Command::Resync { project, path } => {
            cli::resync::resync(&config, project.as_deref(), path.as_deref())?
        }
        Command::Preview { project, path } => {
            cli::resync::preview(&config, project.as_deref(), path.as_deref())?
        }
        Command::Session { action } => match action {
            SessionAction::End {
                session,
                summary,
                done,
                learned,
                focus,
                next,
            } => cli::session::end(
                &config,
                cli::session::EndArgs {
                    session: &session,
                    summary,
                    done,
                    learned,
                    focus: focus.as_deref(),
                    next,
                },
            )?,
            SessionAction::List {
                project,
                open,
                limit,
            } => cli::session::list(&config, project.as_deref(), open, limit)?,
        },
        Command::State { action } => match action {
            StateAction::Show { project } => cli::session::show_state(&config, &project)?,
            StateAction::Set {
                project,
                focus,
                next,
                expect_revision,
            } => cli::session::set_state(
                &config,
                &project,
                focus.as_deref(),
                &next,
                expect_revision,
            )?,
        },
        Command::Template { action } => match action {
            TemplateAction::Put {
                name,
                kind,
                parent,
                file,
            } => cli::registry::put_template(&config, &name, kind, parent.as_deref(), &file)?,
            TemplateAction::List => cli::registry::list_templates(&config)?,
        },
        Command::Project { action } => match action {
            ProjectAction::Add {
                name,
                project_type,
                path,
            } => cli::registry::add_project(&config, &name, &project_type, path.as_deref())?,
            ProjectAction::Override { name, file } => {
                cli::registry::set_override(&config, &name, &file)?
            }
            ProjectAction::Type {
                project_type,
                template,
                services,
                capabilities,
                instructions,
            } => cli::registry::set_type(
                &config,
                &project_type,
                &template,
                services,
                capabilities,
                instructions,
            )?,
        },
        Command::Deployments { project, limit } => {
            cli::registry::list_deployments(&config, project.as_deref(), limit)?
        }
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for hook responses, and additionally
/// append to `[logging] file` when configured.
fn init_tracing(config: &ConductorConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = config.logging.file.as_deref().and_then(|path| {
        let path = config::expand_tilde(path);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| eprintln!("conductor: cannot open log file {}: {e}", path.display()))
            .ok()
    });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::io::stderr.and(Arc::new(file)))
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
