use std::path::PathBuf;

use clap::{ArgAction, Parser};
use segfeed_engine::AppendMode;
use segfeed_engine::config::parse_port;

fn parse_port_arg(input: &str) -> Result<u16, String> {
    parse_port(input).map_err(|e| e.to_string())
}

/// Play a live fragmented-MP4 WebSocket stream into a file or pipe.
#[derive(Parser, Debug)]
#[command(name = "segfeed", version, about, long_about = None)]
pub struct Args {
    /// Stream identifier requested from the publisher
    #[arg(short, long)]
    pub stream: Option<String>,

    /// Publisher host
    #[arg(long)]
    pub host: Option<String>,

    /// Publisher port, as `8083` or `:8083`
    #[arg(short, long, value_parser = parse_port_arg)]
    pub port: Option<u16>,

    /// Connect with wss://
    #[arg(long)]
    pub secure: bool,

    /// Scheme of the page embedding the player; `https` selects wss://
    #[arg(long, conflicts_with = "secure")]
    pub page_scheme: Option<String>,

    /// Codecs declared to the sink, e.g. avc1.42C01E
    #[arg(long)]
    pub codecs: Option<String>,

    /// How the sink places appended fragments
    #[arg(long, value_enum)]
    pub mode: Option<AppendMode>,

    /// Fail once more than this many segments are waiting for the sink
    #[arg(long)]
    pub max_queued: Option<usize>,

    /// Connection timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// End the session after this many seconds without a segment (0 disables)
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Output file, `-` for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print a JSON summary of the session to stderr when it ends
    #[arg(long)]
    pub summary: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
