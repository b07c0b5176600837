use std::path::PathBuf;

use clap::Parser;

use crate::handshake::DEFAULT_TIMEOUT_SECS;
use crate::runner::DEFAULT_CONCURRENCY;

/// CCcam C-line tester: checks which pasted C-lines authenticate against
/// their relay server and emits Hadu [Serv] entries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File with C-lines to test; reads stdin when omitted
    pub input: Option<PathBuf>,

    /// Write the rendered Hadu entries to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum number of servers tested at the same time
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Connect/read/write timeout per server, in seconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Shuffle the username/password candidates within each server group
    #[arg(long)]
    pub shuffle: bool,

    /// Leave failed C-lines out of the rendered output instead of
    /// commenting them
    #[arg(long)]
    pub omit_failed: bool,

    /// Print every outcome as it lands
    #[arg(short, long)]
    pub verbose: bool,
}
