//! # Registrar CLI Module
//!
//! This module implements the CLI interface for Registrar.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show record counts
//! - `init` - Initialize a new database
//! - `add-study` - Register a study program
//! - `studies` - List study programs
//! - `list` - List every student
//! - `show` - Show one student
//! - `enroll` - Enroll a student into semester 1
//! - `update` - Update a student's names
//! - `delete` - Delete a student
//! - `promote` - Move every student of a semester to another semester

mod commands;

use crate::config::{BackendKind, RegistrarConfig};
use clap::{Parser, Subcommand};
use registrar_core::RegistrarError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Registrar - student enrollment and semester promotion
#[derive(Parser, Debug)]
#[command(name = "registrar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a registrar.toml configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the registry database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile, `server` only)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show record counts
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Register a study program
    AddStudy {
        /// Unique study name
        name: String,
    },

    /// List study programs
    Studies,

    /// List every student
    List,

    /// Show one student
    Show {
        /// Student index number
        index: String,
    },

    /// Enroll a student into semester 1 of a study
    Enroll {
        /// Student index number
        index: String,
        first_name: String,
        last_name: String,
        /// Birth date, YYYY-MM-DD
        birth_date: String,
        /// Name of an existing study
        study: String,
    },

    /// Update a student's names
    Update {
        /// Student index number
        index: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,
    },

    /// Delete a student
    Delete {
        /// Student index number
        index: String,
    },

    /// Move every student of one semester to another
    Promote {
        /// Name of the study
        study: String,
        /// Semester the students are in now
        old_semester: u32,
        /// Semester to move them to
        new_semester: u32,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Merge the config file, environment and global flags.
pub fn resolve_config(cli: &Cli) -> Result<RegistrarConfig, RegistrarError> {
    let mut config = RegistrarConfig::load(cli.config.as_deref())?.with_env();
    if let Some(path) = &cli.database {
        config.storage.path.clone_from(path);
    }
    if let Some(backend) = &cli.backend {
        config.storage.backend = BackendKind::parse(backend)?;
    }
    if cli.verbose {
        tracing::info!(
            "Using {} storage at {:?}",
            config.storage.backend.as_str(),
            config.storage.path
        );
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), RegistrarError> {
    let mut config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::AddStudy { name }) => cmd_add_study(&config, json_mode, &name),
        Some(Commands::Studies) => cmd_studies(&config, json_mode),
        Some(Commands::List) => cmd_list(&config, json_mode),
        Some(Commands::Show { index }) => cmd_show(&config, json_mode, &index),
        Some(Commands::Enroll {
            index,
            first_name,
            last_name,
            birth_date,
            study,
        }) => cmd_enroll(
            &config,
            json_mode,
            &EnrollArgs {
                index,
                first_name,
                last_name,
                birth_date,
                study,
            },
        ),
        Some(Commands::Update {
            index,
            first_name,
            last_name,
        }) => cmd_update(&config, json_mode, &index, first_name, last_name),
        Some(Commands::Delete { index }) => cmd_delete(&config, json_mode, &index),
        Some(Commands::Promote {
            study,
            old_semester,
            new_semester,
        }) => cmd_promote(&config, json_mode, &study, old_semester, new_semester),
    }
}
