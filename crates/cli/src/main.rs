mod commands;
mod config;
mod export;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Entity kind filter for the rename subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum KindFilter {
    Resource,
    ResourceGroup,
}

/// Rename tag keys across resources and resource groups, keeping every value.
#[derive(Parser)]
#[command(
    name = "retag",
    version,
    about = "Rename tag keys across resources and resource groups, keeping every value"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a retag.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the distinct tag keys in an inventory with entity counts
    Keys {
        /// Path to the inventory JSON file
        inventory: PathBuf,
        /// Only look at these accounts (repeatable; default: all)
        #[arg(long = "account")]
        accounts: Vec<String>,
    },

    /// Rename one or more tag keys to a new key, preserving values
    Rename {
        /// Path to the inventory JSON file (rewritten in place)
        inventory: PathBuf,
        /// Old tag key to rename (repeatable)
        #[arg(long = "key", required = true)]
        keys: Vec<String>,
        /// Replacement tag key
        #[arg(long)]
        new_key: String,
        /// Only rename in these accounts (repeatable; default: all)
        #[arg(long = "account")]
        accounts: Vec<String>,
        /// Only rename on this kind of entity
        #[arg(long, value_enum)]
        kind: Option<KindFilter>,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Show the planned tag changes without applying them
        #[arg(long)]
        dry_run: bool,
        /// Directory for CSV audit tables and summary.json
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match config::read_config(path) {
            Ok(c) => c,
            Err(e) => {
                report_error(&format!("error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        },
        None => config::Config::default(),
    };
    logging::init_logging(&config.logging);

    match cli.command {
        Commands::Keys {
            inventory,
            accounts,
        } => {
            commands::keys::cmd_keys(&inventory, &accounts, cli.output, cli.quiet);
        }
        Commands::Rename {
            inventory,
            keys,
            new_key,
            accounts,
            kind,
            yes,
            dry_run,
            report_dir,
        } => {
            commands::rename::cmd_rename(commands::rename::RenameOptions {
                inventory: &inventory,
                keys,
                new_key,
                accounts: &accounts,
                kind,
                yes,
                dry_run,
                report_dir: report_dir.as_deref(),
                engine: config.engine,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
