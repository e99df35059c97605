//! CLI entry point for the fetcher tool.

use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fetcher_core::source::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use fetcher_core::{
    CancelHandle, DEFAULT_CONCURRENCY, FetchError, FetchReport, IntegrityHasher, Locator,
    SchemeSource, SequentialFetcher, StreamSource, ThrottledFetcher, TransportSettings,
};
use serde::Serialize;
use tracing::{debug, info, warn};

mod cli;
mod config;

use cli::{Cli, Command, DigestArgs, FetchArgs};
use config::FileConfig;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();
    let file_config = config::load_config(cli.config.as_deref())?;

    init_tracing(&cli, file_config.as_ref());
    debug!(?cli, ?file_config, "CLI arguments parsed");

    let file_config = file_config.unwrap_or_default();
    let settings = TransportSettings {
        connect_timeout_secs: cli
            .connect_timeout
            .or(file_config.connect_timeout_secs)
            .unwrap_or(CONNECT_TIMEOUT_SECS),
        read_timeout_secs: cli
            .read_timeout
            .or(file_config.read_timeout_secs)
            .unwrap_or(READ_TIMEOUT_SECS),
    };
    let source: Arc<dyn StreamSource> = Arc::new(SchemeSource::new(settings)?);

    match cli.command {
        Command::Fetch(args) => run_fetch(args, &file_config, source).await,
        Command::Digest(args) => run_digest(&args, source).await,
    }
}

/// Installs the tracing subscriber on stderr.
///
/// Priority: `RUST_LOG` env var > quiet flag > verbose flag > config verbosity > info.
fn init_tracing(cli: &Cli, file_config: Option<&FileConfig>) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => file_config
                .and_then(|cfg| cfg.verbosity)
                .map_or("info", config::VerbositySetting::level),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run_fetch(
    args: FetchArgs,
    file_config: &FileConfig,
    source: Arc<dyn StreamSource>,
) -> Result<ExitCode> {
    // Read input: from positional args or stdin
    let inputs = if !args.locators.is_empty() {
        args.locators.clone()
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer.lines().map(str::to_string).collect()
    } else {
        info!("No input provided. Pipe locators via stdin or pass them as arguments.");
        info!("Example: echo 'https://example.com/' | fetcher fetch");
        return Ok(ExitCode::SUCCESS);
    };

    let locators = parse_locators(&inputs);
    if locators.is_empty() {
        info!("No valid locators found in input");
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancelHandle::new();
    spawn_interrupt_listener(cancel.clone());

    let sequential = args.sequential || file_config.sequential.unwrap_or(false);
    let report = if sequential {
        SequentialFetcher::new(source)
            .with_cancel_handle(cancel)
            .fetch_all(&locators)
            .await
    } else {
        let concurrency = args
            .concurrency
            .or(file_config.concurrency)
            .map_or(DEFAULT_CONCURRENCY, usize::from);
        ThrottledFetcher::new(source, concurrency)?
            .with_cancel_handle(cancel)
            .fetch_all(&locators)
            .await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&JsonReport::new(&report, &locators))?);
    } else {
        print_report(&report, &locators, args.show_content);
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        not_started = report.not_started().len(),
        "Fetch complete"
    );

    if report.failed() > 0 || report.is_cancelled() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn run_digest(args: &DigestArgs, source: Arc<dyn StreamSource>) -> Result<ExitCode> {
    let locator = parse_locator_arg(&args.locator)?;
    let digest = IntegrityHasher::new(source)
        .digest(&locator)
        .await
        .with_context(|| format!("Failed to compute digest for {locator}"))?;
    println!("{digest}");
    Ok(ExitCode::SUCCESS)
}

/// Parses input lines, skipping blanks and `#` comments.
fn parse_locators(inputs: &[String]) -> Vec<Locator> {
    inputs
        .iter()
        .map(|raw| raw.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match parse_locator_arg(line) {
            Ok(locator) => Some(locator),
            Err(e) => {
                warn!(input = %line, error = %e, "Skipped unrecognized input");
                None
            }
        })
        .collect()
}

/// Accepts an absolute URL, or a filesystem path resolved against the current directory.
fn parse_locator_arg(raw: &str) -> Result<Locator, FetchError> {
    Locator::parse(raw).or_else(|_| {
        let path = std::path::absolute(Path::new(raw))
            .map_err(|_| FetchError::invalid_locator(raw))?;
        Locator::from_path(&path)
    })
}

/// Shell convention for termination by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

fn spawn_interrupt_listener(cancel: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received; finishing in-flight retrievals (press Ctrl-C again to abort)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt received; aborting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
}

fn print_report(report: &FetchReport, locators: &[Locator], show_content: bool) {
    for result in report.results() {
        match &result.outcome {
            Ok(content) => {
                println!(
                    "{}\tOK\t{}\t{} bytes",
                    result.index,
                    result.locator,
                    content.len()
                );
                if show_content {
                    println!("{content}");
                }
            }
            Err(e) => println!("{}\tFAILED\t{}\t{e}", result.index, result.locator),
        }
    }
    for &index in report.not_started() {
        println!("{index}\tSKIPPED\t{}\tnot started (cancelled)", locators[index]);
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    cancelled: bool,
    succeeded: usize,
    failed: usize,
    peak_in_flight: usize,
    elapsed_ms: u64,
    results: Vec<JsonResult<'a>>,
    not_started: Vec<JsonSkipped<'a>>,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    index: usize,
    locator: &'a Locator,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct JsonSkipped<'a> {
    index: usize,
    locator: &'a Locator,
}

impl<'a> JsonReport<'a> {
    fn new(report: &'a FetchReport, locators: &'a [Locator]) -> Self {
        Self {
            cancelled: report.is_cancelled(),
            succeeded: report.succeeded(),
            failed: report.failed(),
            peak_in_flight: report.peak_in_flight(),
            elapsed_ms: u64::try_from(report.elapsed().as_millis()).unwrap_or(u64::MAX),
            results: report
                .results()
                .iter()
                .map(|result| JsonResult {
                    index: result.index,
                    locator: &result.locator,
                    status: if result.is_success() { "ok" } else { "failed" },
                    bytes: result.content().map(str::len),
                    content: result.content(),
                    error_kind: result.error().map(FetchError::kind),
                    error: result.error().map(ToString::to_string),
                })
                .collect(),
            not_started: report
                .not_started()
                .iter()
                .map(|&index| JsonSkipped {
                    index,
                    locator: &locators[index],
                })
                .collect(),
        }
    }
}
