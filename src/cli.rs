use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "framestore")]
#[command(about = "Inspect and operate a framestore queue store", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $FRAMESTORE_CONFIG or config/framestore.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override store.data_dir
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append a frame to a destination
    Enqueue(EnqueueArgs),
    /// Remove and print the oldest frame of a destination
    Dequeue(DestinationArgs),
    /// Print the number of pending frames
    Size(DestinationArgs),
    /// Print per-destination counters and checkpoint state
    Stats,
    /// Drop a destination and all of its pending frames
    Purge(DestinationArgs),
    /// Flush queue metadata now
    Checkpoint,
}

#[derive(clap::Args, Debug)]
pub struct DestinationArgs {
    /// Destination name, e.g. /queue/orders
    pub destination: String,
}

#[derive(clap::Args, Debug)]
pub struct EnqueueArgs {
    /// Destination name, e.g. /queue/orders
    pub destination: String,

    /// Frame body
    pub body: String,

    /// Message id (a random UUID when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Frame header as name=value (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))
}
