//! # PartShop CLI
//!
//! Command-line shell over the PartShop store.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        partshop <command>                               │
//! │                                                                         │
//! │  1. Parse arguments (clap)                                              │
//! │  2. Load config.toml, apply PARTSHOP_* env vars, then flags             │
//! │  3. Initialize tracing (stderr)                                         │
//! │  4. Open the store: connect, upgrade schema, prepare attachment dirs    │
//! │  5. Run the command, print text or JSON                                 │
//! │  6. Close the pool                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use partshop_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

use commands::category::CategoryCommand;
use commands::item::ItemCommand;
use commands::settings::SettingsCommand;
use commands::shopping::ShopCommand;
use commands::transfer::ExportTarget;
use commands::{Context, Output};
use config::AppConfig;
use error::CliResult;

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "partshop", author, version, about = "Electronic parts inventory and shopping list")]
pub struct Cli {
    /// Database file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Attachment directory
    #[arg(long, global = true)]
    pub attachments: Option<PathBuf>,

    /// Config file
    #[arg(long, global = true, env = "PARTSHOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or upgrade the store and write a default config
    Init,

    /// Show paths, schema version and counts
    Status,

    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryCommand,
    },

    /// Manage inventory items
    Item {
        #[command(subcommand)]
        action: ItemCommand,
    },

    /// Manage the shopping list
    Shop {
        #[command(subcommand)]
        action: ShopCommand,
    },

    /// Import a category,name,quantity CSV file (quantities are added)
    Import { file: PathBuf },

    /// Export the inventory as CSV
    Export {
        /// Copy the export into this directory
        #[arg(long, conflicts_with = "stdout")]
        to: Option<PathBuf>,

        /// Write the CSV to stdout
        #[arg(long)]
        stdout: bool,
    },

    /// Read and write settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Delete all categories, items and shopping list entries
    Wipe {
        #[arg(long)]
        confirm: bool,
    },
}

impl Cli {
    /// Flags win over everything else.
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(db) = &self.db {
            config.database_path = db.clone();
        }
        if let Some(dir) = &self.attachments {
            config.attachments_dir = Some(dir.clone());
        }
    }
}

// =============================================================================
// Entry Point
// =============================================================================

/// Parses arguments, runs the command and reports failures.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let out = Output::new(cli.json);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            out.error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let mut config = AppConfig::load(cli.config.clone())?;
    cli.apply_to(&mut config);
    config.validate()?;

    init_tracing(&config.log_filter, cli.verbose);

    let ctx = open(config, cli.config.clone().or_else(config::default_config_path), cli.json)
        .await?;
    let result = dispatch(&ctx, cli.command).await;
    ctx.db.close().await;
    result
}

/// Opens the configured store. The schema is brought up to date here.
pub async fn open(
    config: AppConfig,
    config_path: Option<PathBuf>,
    json: bool,
) -> CliResult<Context> {
    let mut db_config = DbConfig::new(config.database_path.clone());
    if let Some(dir) = &config.attachments_dir {
        db_config = db_config.attachments_dir(dir.clone());
    }
    let db = Database::new(db_config).await?;

    Ok(Context {
        db,
        config,
        config_path,
        out: Output::new(json),
    })
}

async fn dispatch(ctx: &Context, command: Commands) -> CliResult<()> {
    let out = ctx.out;
    match command {
        Commands::Init => {
            let report = commands::store::init(ctx).await?;
            out.emit(&report, commands::store::render_init)
        }
        Commands::Status => {
            let report = commands::store::status(ctx).await?;
            out.emit(&report, commands::store::render_status)
        }
        Commands::Category { action } => commands::category::run(ctx, action).await,
        Commands::Item { action } => commands::item::run(ctx, action).await,
        Commands::Shop { action } => commands::shopping::run(ctx, action).await,
        Commands::Import { file } => {
            let summary = commands::transfer::import(ctx, &file).await?;
            out.emit(&summary, commands::transfer::render_import)
        }
        Commands::Export { to, stdout } => {
            let target = match (to, stdout) {
                (_, true) => ExportTarget::Stdout,
                (Some(dir), false) => ExportTarget::Directory(dir),
                (None, false) => ExportTarget::Default,
            };
            let outcome = commands::transfer::export(ctx, &target).await?;
            if target == ExportTarget::Stdout {
                // The CSV itself went to stdout.
                return Ok(());
            }
            out.emit(&outcome, commands::transfer::render_export)
        }
        Commands::Settings { action } => commands::settings::run(ctx, action).await,
        Commands::Wipe { confirm } => {
            let summary = commands::store::wipe(ctx, confirm).await?;
            out.emit(&summary, commands::store::render_wipe)
        }
    }
}

/// Initializes the tracing subscriber on stderr.
///
/// `RUST_LOG` wins; otherwise `--verbose` selects debug output and the
/// configured filter applies.
fn init_tracing(filter: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug,sqlx=warn")
        } else {
            EnvFilter::new(filter)
        }
    });

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "partshop",
            "status",
            "--db",
            "/tmp/other.db",
            "--attachments",
            "/tmp/files",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.attachments_dir, Some(PathBuf::from("/tmp/files")));
    }

    #[test]
    fn test_export_flags_conflict() {
        let parsed = Cli::try_parse_from(["partshop", "export", "--to", "/tmp", "--stdout"]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_open_creates_store_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_path: dir.path().join("data").join("partshop.db"),
            export_dir: dir.path().join("exports"),
            ..AppConfig::default()
        };

        let ctx = open(config, None, false).await.unwrap();
        dispatch(&ctx, Commands::Status).await.unwrap();
        assert!(dir.path().join("data").join("attachments").join("images").is_dir());
        ctx.db.close().await;
    }
}
