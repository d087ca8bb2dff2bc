use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tollgate_core::GateConfig;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about = "MySQL access gateway for AI agents")]
struct Cli {
    /// Path to the configuration file.
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "TOLLGATE_CONFIG",
        default_value = "tollgate.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server on stdio.
    Serve,

    /// Evaluate a SQL statement against the configured policy without
    /// executing it.
    Check {
        /// The SQL statement to evaluate.
        sql: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = GateConfig::from_file(&cli.config)?;

    match cli.cmd {
        Command::Serve => commands::serve::run(&config).await,
        Command::Check { sql } => {
            let blocked = commands::check::run(&config, &sql)?;
            if blocked {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
