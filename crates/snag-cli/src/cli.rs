//! Flag surface and URL intake for the `snag` binary.

use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use snag_core::batch::{self, BatchOptions};
use snag_core::config;
use snag_core::control::CancelToken;
use snag_core::logging;
use snag_core::ratelimit;
use snag_core::url_model;

const DEFAULT_CHUNKS: usize = 5;

/// Concurrent HTTP(S) download accelerator.
///
/// Fetches each URL with parallel ranged requests when the server permits
/// them, with resume and a shared bandwidth ceiling.
#[derive(Debug, Parser)]
#[command(name = "snag", version)]
pub struct Cli {
    /// HTTP/HTTPS URLs to download; more are read from a piped stdin,
    /// one per line.
    pub urls: Vec<String>,

    /// Parallel chunks per file (1-99).
    #[arg(short, long)]
    pub chunks: Option<usize>,

    /// Global bandwidth limit, e.g. 500K, 5M, 1.5M, 1G. 0 or empty: unlimited.
    #[arg(short, long)]
    pub limit: Option<String>,

    /// Output directory, created if missing.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("snag: log file unavailable ({}), using stderr", e);
        logging::init_stderr(cli.verbose);
    }

    let cfg = config::load_or_init().unwrap_or_else(|e| {
        tracing::warn!("failed to load config: {:#}", e);
        config::SnagConfig::default()
    });

    let chunk_count = cli.chunks.or(cfg.chunks).unwrap_or(DEFAULT_CHUNKS);
    if !(1..=99).contains(&chunk_count) {
        bail!("chunks must be between 1 and 99 (got {})", chunk_count);
    }

    let limit_spec = cli.limit.or(cfg.limit).unwrap_or_default();
    let rate_limit = ratelimit::parse_rate(&limit_spec)?;

    let output_dir = cli
        .output
        .or(cfg.output_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut urls = Vec::new();
    if !std::io::stdin().is_terminal() {
        collect_urls(std::io::stdin().lock(), &mut urls);
        if urls.is_empty() {
            bail!("empty pipe");
        }
    }
    for arg in &cli.urls {
        if let Ok(valid) = url_model::parse_validate_url(arg.trim()) {
            urls.push(valid);
        }
    }
    if urls.is_empty() {
        bail!("empty url");
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling downloads");
                cancel.cancel();
            }
        });
    }

    let options = BatchOptions {
        output_dir,
        chunk_count,
        rate_limit,
    };
    batch::run(urls, options, cancel).await
}

/// Collecting intake: every valid URL on the reader is kept, anything else
/// is silently discarded. Handles LF, CRLF, and bare-CR line endings.
fn collect_urls(reader: impl BufRead, urls: &mut Vec<String>) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        for token in line.split('\r') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if let Ok(valid) = url_model::parse_validate_url(token) {
                urls.push(valid);
            }
        }
    }
}
