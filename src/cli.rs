//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Throttled batch retrieval and integrity hashing.
///
/// Fetches web (http/https), FTP and local file resources with a hard cap on
/// simultaneous retrievals, or computes a SHA-256 digest of one resource.
#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: $XDG_CONFIG_HOME/fetcher/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Connect timeout in seconds for network transports (1-3600)
    #[arg(long, value_name = "SECS", global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds: whole HTTP request, or each FTP read (1-3600)
    #[arg(long, value_name = "SECS", global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve the content of many locators
    Fetch(FetchArgs),
    /// Print the SHA-256 digest of one locator as uppercase hex
    Digest(DigestArgs),
}

/// Arguments for `fetcher fetch`.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Locators (URLs or file paths); read from stdin when omitted
    pub locators: Vec<String>,

    /// Maximum concurrent retrievals (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Retrieve one locator at a time, in order
    #[arg(short, long)]
    pub sequential: bool,

    /// Print retrieved content after each result line
    #[arg(long)]
    pub show_content: bool,

    /// Print the report as JSON
    #[arg(long, conflicts_with = "show_content")]
    pub json: bool,
}

/// Arguments for `fetcher digest`.
#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Locator (URL or file path) to hash
    pub locator: String,
}
