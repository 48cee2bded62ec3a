//! arrowgate-cli - Command-line interface for arrowgate
//!
//! Fetches the served table, runs structured calls and sends raw commands.

mod commands;

use arrowgate_client::{Client, ConnectionConfig, RetryPolicy};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arrowgate-cli")]
#[command(about = "Command-line interface for the arrowgate table server")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, env = "ARROWGATE_SERVER", default_value = "127.0.0.1:5001")]
    server: SocketAddr,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Retries for failed requests (1 second apart)
    #[arg(short, long, default_value = "0")]
    retries: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the served table
    Fetch {
        /// Rows to display
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print the table as JSON instead of a grid
        #[arg(long)]
        json: bool,

        /// Write the full table as JSON to a file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Call an operation with a JSON argument
    Call {
        /// Operation name
        operation: String,

        /// Argument JSON (or @file.json to read from file)
        #[arg(default_value = "null")]
        argument: String,

        /// Rows to display when the result is a table
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Treat the argument as a list and call once per batch, halving
        /// batches the server rejects as too large
        #[arg(long)]
        each: bool,
    },

    /// Send a raw command line
    Send {
        /// Command text
        command: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = ConnectionConfig::new(cli.server)
        .with_request_timeout(Duration::from_secs(cli.timeout));
    let client = Client::new(config);
    let retry = RetryPolicy::new().with_max_retries(cli.retries);

    client.connect().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    match commands::execute(&client, &retry, cli.command).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    client.close().await?;
    Ok(())
}
