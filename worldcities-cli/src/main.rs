use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{CityCommands, CountryCommands};

/// worldcities - browse and edit countries and cities
#[derive(Parser)]
#[command(name = "worldcities")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// API root URL
    #[arg(
        long,
        global = true,
        env = "WORLDCITIES_URL",
        default_value = "http://localhost:8080"
    )]
    base_url: String,

    /// Bearer token for create, update and delete
    #[arg(long, global = true, env = "WORLDCITIES_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Country commands
    Countries {
        #[command(subcommand)]
        command: CountryCommands,
    },
    /// City commands
    Cities {
        #[command(subcommand)]
        command: CityCommands,
    },
    /// Check the health and readiness endpoints
    Health {
        /// Show response details
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Countries { command } => {
            commands::countries(&cli.base_url, cli.token, command).await
        }
        Commands::Cities { command } => commands::cities(&cli.base_url, cli.token, command).await,
        Commands::Health { verbose } => commands::health(&cli.base_url, verbose).await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
