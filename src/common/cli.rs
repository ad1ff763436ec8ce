//! CLI argument parsing
//!
//! Uses clap's derive macro; common arguments are shared via composition so
//! further tools can embed `CommonArgs`.

use std::path::PathBuf;

use clap::Parser;

/// Common arguments shared across tools
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to optional TOML configuration file
    #[arg(short = 'f', long = "config", env = "PULSEDATA_CONFIG")]
    pub config_file: Option<PathBuf>,
}

/// Arguments for the block listing tool
#[derive(Parser, Debug, Clone)]
#[command(name = "pulsedata")]
#[command(about = "List the contents of defective fADC250 blocks dumped in a DAQ log")]
#[command(version)]
pub struct ListingArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Print every line instead of collapsing identical consecutive lines
    #[arg(long)]
    pub no_coalesce: bool,

    /// Print samples flagged invalid instead of suppressing them
    #[arg(long)]
    pub show_invalid_samples: bool,

    /// Log files, read in order as one stream ('-' or none for stdin)
    pub inputs: Vec<PathBuf>,
}

impl ListingArgs {
    /// Whether any input is standard input
    pub fn reads_stdin(&self) -> bool {
        self.inputs.is_empty() || self.inputs.iter().any(|p| p.as_os_str() == "-")
    }
}
