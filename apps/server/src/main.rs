//! Captioner Server - Entry Point
//!
//! Serves the batch HTTP trigger, or runs a single request from a file or stdin.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::info;

use captioner_server::{AppConfig, TriggerResponse, build_dispatcher, handle_request, logging, serve};

#[derive(Parser, Debug)]
#[command(name = "captioner-server", version, about = "Concurrent image-to-text batch dispatcher")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP trigger (default)
    Serve {
        /// Address to bind, overriding configuration
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Run one request body and print the response JSON
    Once {
        /// Request file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,

        /// Use the echoing mock client instead of Vertex AI
        #[arg(long)]
        mock: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_address = bind;
                config.port = None;
            }
            let dispatcher = build_dispatcher(&config, false);
            serve(&config, dispatcher).await.context("Server error")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Once { input, mock } => {
            let body = match input {
                Some(path) => tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin().read_to_end(&mut buf).await.context("Failed to read stdin")?;
                    buf
                }
            };

            let dispatcher = build_dispatcher(&config, mock);
            let response = handle_request(&dispatcher, &body).await;
            println!("{}", serde_json::to_string(&response)?);

            info!(status = %response.status(), "Single request finished");
            Ok(match response {
                TriggerResponse::Replies { .. } => ExitCode::SUCCESS,
                TriggerResponse::Error { .. } => ExitCode::FAILURE,
            })
        }
    }
}
