//! DbBot - chat with your SQL database

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

use commands::{chat_command, init_command, status_command, tables_command, DatabaseArgs};

/// DbBot - ask questions about your SQL database in plain language
#[derive(Parser)]
#[command(name = "dbbot")]
#[command(about = "Ask questions about your SQL database in plain language")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the config file
    Init,
    /// Chat with your database
    Chat {
        /// Database type: postgresql, mysql or sqlite
        #[arg(short, long)]
        dialect: Option<String>,
        /// Connection string, e.g. ./chinook.db
        #[arg(short, long)]
        uri: Option<String>,
        /// Ask a single question and exit
        #[arg(short, long)]
        message: Option<String>,
        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show configuration status
    Status,
    /// List the tables of the database
    Tables {
        /// Database type: postgresql, mysql or sqlite
        #[arg(short, long)]
        dialect: Option<String>,
        /// Connection string
        #[arg(short, long)]
        uri: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG may come from .env
    dbbot_config::load_dotenv();
    init_tracing(matches!(cli.command, Commands::Chat { verbose: true, .. }));

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Chat {
            dialect,
            uri,
            message,
            verbose: _,
        } => chat_command(DatabaseArgs { dialect, uri }, message).await,
        Commands::Status => status_command().await,
        Commands::Tables { dialect, uri } => tables_command(DatabaseArgs { dialect, uri }).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
