//! Arachne CLI
//!
//! Command-line entry point for the spider-image labeler.
//!
//! # Commands
//!
//! - `serve` - Serve the post-label log, optionally labeling captured frames
//! - `decode` - Print the operation buckets of one captured frame
//! - `replay` - Decode a directory of captured frames and print counts

mod commands;

use anyhow::Result;
use arachne_labeler::{
    LabelerConfig, DEFAULT_BLOB_SERVICE_URL, DEFAULT_MODERATION_API_URL, DEFAULT_MODERATION_MODEL,
};
use arachne_server::MAX_ALLOWED_LOOKBACK_ENV;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Spider-image labeler for the AT Protocol firehose.
#[derive(Parser)]
#[command(name = "arachne")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the label stream
    Serve {
        /// Listen address
        #[arg(short, long, env = "ARACHNE_BIND", default_value = "127.0.0.1:5001")]
        bind: SocketAddr,

        /// Furthest a cursor may lag behind the tail
        #[arg(long, env = MAX_ALLOWED_LOOKBACK_ENV, default_value = "0")]
        max_lookback: u64,

        /// Directory of captured firehose frames to label
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Moderation API endpoint
        #[arg(long, env = "MODERATION_API_URL", default_value = DEFAULT_MODERATION_API_URL)]
        moderation_url: String,

        /// Moderation API key
        #[arg(long, env = "MODERATION_API_KEY", hide_env_values = true)]
        moderation_key: Option<String>,

        /// Moderation model
        #[arg(long, env = "MODERATION_MODEL", default_value = DEFAULT_MODERATION_MODEL)]
        model: String,

        /// Service answering com.atproto.sync.getBlob
        #[arg(long, env = "BLOB_SERVICE_URL", default_value = DEFAULT_BLOB_SERVICE_URL)]
        blob_service: String,

        /// Timeout for outgoing requests, in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Decode one captured firehose message
    Decode {
        /// File holding the message
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode every captured frame in a directory
    Replay {
        /// Directory of frames, one message per file
        dir: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            max_lookback,
            frames,
            moderation_url,
            moderation_key,
            model,
            blob_service,
            timeout,
        } => {
            let mut labeler = LabelerConfig::new()
                .with_moderation_api_url(moderation_url)
                .with_moderation_model(model)
                .with_blob_service_url(blob_service)
                .with_request_timeout(Duration::from_secs(timeout));
            if let Some(key) = moderation_key {
                labeler = labeler.with_moderation_api_key(key);
            }
            commands::serve::run(commands::serve::ServeOptions {
                bind,
                max_lookback,
                frames,
                labeler,
            })
            .await?;
        }
        Commands::Decode { file, format } => {
            commands::decode::run(&file, &format)?;
        }
        Commands::Replay { dir, format } => {
            commands::replay::run(&dir, &format)?;
        }
    }

    Ok(())
}
