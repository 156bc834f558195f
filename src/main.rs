//! gridwire - wire inspector for the gridwire client protocol
//!
//! Prints operation layouts, encodes sample requests and decodes hex dumps
//! of captured wire traffic.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use gridwire_protocol::{Config, Registry};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridwire")]
#[command(about = "Inspect and exercise the gridwire client wire protocol")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the field layout of every registered message type
    Layouts {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Encode a sample ScheduledExecutor.SubmitToMember request as hex
    Sample {
        /// Correlation id stamped on the request
        #[arg(short, long, default_value = "1")]
        correlation_id: i64,

        /// Fragment size in bytes (defaults to the configured value)
        #[arg(short, long)]
        fragment_size: Option<usize>,
    },

    /// Decode hex wire bytes, one or more wire units, from a file or stdin
    Inspect {
        /// Input file (reads stdin when omitted)
        file: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration (from file if GRIDWIRE_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            if std::env::var("GRIDWIRE_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::warn!("Invalid configuration ({}), using defaults", e);
            Config::default()
        }
    };

    let registry = Registry::with_builtin();
    match commands::execute(&registry, &config, cli.command) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
