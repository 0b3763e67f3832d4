//! Command-line argument parsing and dispatch for `eikobot`.
//!
//! Built on [`clap`] derive macros. Each variant of [`Commands`] maps to a
//! handler in [`crate::commands`].
//!
//! ```bash
//! # Compile a model and print the task DAG as JSON
//! eikobot compile -f main.eiko --output-model
//!
//! # Deploy, previewing changes only
//! eikobot deploy -f main.eiko --dry-run
//!
//! # Scaffold a project in the current directory
//! eikobot project init
//!
//! # Install a package from GitHub
//! eikobot package install GH://eikobot-dev/std
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands;

/// The Eikobot desired-state orchestrator.
#[derive(Parser)]
#[command(name = "eikobot")]
#[command(about = "Desired-state infrastructure orchestration", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a model without deploying it.
    Compile {
        /// Entry file of the model.
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        /// Print the compiled resource/task model as JSON.
        #[arg(long)]
        output_model: bool,
        /// Show host stack traces for internal plugin errors.
        #[arg(long)]
        enable_plugin_stacktrace: bool,
    },

    /// Compile and deploy a model.
    Deploy {
        /// Entry file of the model.
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        /// Only read the current state and report pending changes.
        #[arg(long)]
        dry_run: bool,
        /// Verbose logging.
        #[arg(long)]
        debug: bool,
    },

    /// Project management.
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Package management.
    Package {
        #[command(subcommand)]
        command: PackageCommands,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Scaffold `eiko.toml` and a starter `main.eiko` in the current
    /// directory.
    Init,
}

#[derive(Subcommand)]
pub enum PackageCommands {
    /// Install a package (`GH://owner/name`, `name@version`, or `.` for
    /// the current project).
    Install {
        /// The package spec; defaults to the manifest's `requires` list.
        spec: Option<String>,
        /// With `.`: link the project instead of copying it.
        #[arg(short = 'e', long = "editable")]
        editable: bool,
    },
    /// Build a release artifact.
    Release {
        /// Release target; only `github` is supported.
        target: String,
    },
}

/// Parses arguments and runs the selected command.
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compile { file, output_model, enable_plugin_stacktrace } => {
            commands::init_tracing(false);
            commands::compile(&file, output_model, enable_plugin_stacktrace)
        }
        Commands::Deploy { file, dry_run, debug } => {
            commands::init_tracing(debug);
            commands::deploy(&file, dry_run)
        }
        Commands::Project { command: ProjectCommands::Init } => {
            commands::init_tracing(false);
            commands::project_init()
        }
        Commands::Package { command } => {
            commands::init_tracing(false);
            match command {
                PackageCommands::Install { spec, editable } => {
                    commands::package_install(spec.as_deref(), editable)
                }
                PackageCommands::Release { target } => commands::package_release(&target),
            }
        }
    }
}
