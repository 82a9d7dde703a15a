use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use myssh_client::{run_client, ClientMode};
use myssh_protocol::DEFAULT_PORT;
use myssh_server::{run_server, ServerConfig, ShellMode};

#[derive(Parser)]
#[command(author, version, about = "Encrypted remote shell", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the shell server
    Server {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Credential file (JSON array of username/password records)
        #[arg(short, long, default_value = "users.json", value_name = "FILE")]
        users_file: PathBuf,
        /// Give each session a full interactive shell on a pseudo-terminal
        /// instead of the line-based pipeline shell
        #[arg(short, long)]
        interactive: bool,
    },
    /// Connect to a shell server
    Client {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Server port
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// The server runs in interactive mode; relay keystrokes raw
        #[arg(short, long)]
        interactive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging based on environment variables
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "error".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Server {
            port,
            users_file,
            interactive,
        } => {
            let mode = if interactive {
                ShellMode::Interactive
            } else {
                ShellMode::Pipeline
            };
            run_server(ServerConfig {
                port,
                users_file,
                mode,
            })
            .await
        }
        Commands::Client {
            host,
            port,
            interactive,
        } => {
            let mode = if interactive {
                ClientMode::Interactive
            } else {
                ClientMode::Pipeline
            };
            run_client(&host, port, mode).await
        }
    }
}
