mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::*;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Apply ordered SQL migrations to a PostgreSQL database")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
pub struct GlobalArgs {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Bookkeeping table name
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Migrations directory
    #[arg(long, global = true)]
    pub directory: Option<PathBuf>,

    /// Config file (defaults to ./stratum.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every pending migration
    #[command(alias = "migrate")]
    Apply,

    /// Show every migration file with its status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List applied migrations in application order
    List,

    /// Exit with status 0 if the migration was applied, 1 otherwise
    Has {
        /// Migration filename; directory components are ignored
        filename: String,
    },

    /// Create an empty SQL migration
    New {
        /// Migration name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(&cli.global.log_level, cli.global.json_logs)?;

    let settings = Settings::resolve(&cli.global)?;

    match cli.command {
        Commands::Apply => {
            apply::run(&settings).await?;
        }
        Commands::Status { json } => {
            status::show(&settings, json).await?;
        }
        Commands::List => {
            status::list(&settings).await?;
        }
        Commands::Has { filename } => {
            if !status::has(&settings, &filename).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::New { name } => {
            new::create(&settings, &name).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
