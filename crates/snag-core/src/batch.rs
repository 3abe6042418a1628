//! Batch orchestration: probe, dedup, admit, download, aggregate.
//!
//! Probing and downloading both fan out, but filenames are assigned against
//! the probed list in input order so naming stays deterministic regardless
//! of which probe finishes first.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::control::CancelToken;
use crate::diskspace;
use crate::downloader;
use crate::probe;
use crate::progress::ProgressTracker;
use crate::ratelimit::TokenBucket;
use crate::url_model;

/// Knobs for one batch run, already validated by the caller.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    /// Desired chunk count per resource (the planner may emit fewer).
    pub chunk_count: usize,
    /// Shared bandwidth ceiling in bytes per second; 0 is unlimited.
    pub rate_limit: i64,
}

struct DownloadReport {
    length: i64,
    ok: bool,
}

/// Downloads every URL in `urls` into the output directory. Fails when no
/// URL probes successfully, when the batch cannot fit on disk, or when any
/// download ends failed (the successes stay in place).
pub async fn run(urls: Vec<String>, options: BatchOptions, cancel: CancelToken) -> Result<()> {
    ensure_output_dir(&options.output_dir)?;

    let mut probes = Vec::with_capacity(urls.len());
    for url in &urls {
        let url = url.clone();
        let chunk_count = options.chunk_count;
        let cancel = cancel.clone();
        probes.push(tokio::task::spawn_blocking(move || {
            probe::probe_resource(&url, chunk_count, &cancel)
        }));
    }

    let mut resources = Vec::new();
    for (url, handle) in urls.iter().zip(probes) {
        match handle.await.context("probe task join")? {
            Ok(resource) => resources.push(resource),
            Err(e) => tracing::error!(url = %url, "probe failed: {:#}", e),
        }
    }
    if resources.is_empty() {
        bail!("no valid resources found");
    }

    url_model::deduplicate_filenames(
        resources.iter_mut().map(|r| &mut r.filename),
        &options.output_dir,
    );

    let total_bytes: i64 = resources.iter().map(|r| r.length.max(0)).sum();
    if total_bytes > 0 {
        diskspace::check_disk_space(&options.output_dir, total_bytes)?;
    }

    let limiter = Arc::new(TokenBucket::new(options.rate_limit));
    let tracker = ProgressTracker::new();
    let ticker = tracker.start();

    let expected = resources.len();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<DownloadReport>(expected);
    for resource in resources {
        let counter = Arc::new(AtomicI64::new(0));
        tracker.add(&resource.filename, Arc::clone(&counter), resource.length);

        let tx = tx.clone();
        let limiter = Arc::clone(&limiter);
        let cancel = cancel.clone();
        let output_dir = options.output_dir.clone();
        tokio::spawn(async move {
            let length = resource.length;
            let filename = resource.filename.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                downloader::download_resource(&resource, &output_dir, &limiter, &counter, &cancel)
            })
            .await;
            let ok = match outcome {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    tracing::error!(file = %filename, "download failed: {:#}", e);
                    false
                }
                Err(e) => {
                    tracing::error!(file = %filename, "download task panicked: {}", e);
                    false
                }
            };
            let _ = tx.send(DownloadReport { length, ok }).await;
        });
    }
    drop(tx);

    let mut remaining = total_bytes;
    let mut failed = 0usize;
    for _ in 0..expected {
        let Some(report) = rx.recv().await else { break };
        if !report.ok {
            failed += 1;
        }
        remaining -= report.length.max(0);
        // the disk may have tightened under the still-running downloads;
        // warn but let them run
        if remaining > 0 {
            if let Err(e) = diskspace::check_disk_space(&options.output_dir, remaining) {
                tracing::warn!("{:#}", e);
            }
        }
    }

    ticker.finish().await;

    if failed > 0 {
        bail!("{} download(s) failed", failed);
    }
    Ok(())
}

#[cfg(unix)]
fn ensure_output_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o750)
        .create(dir)
        .or_else(|e| {
            if dir.is_dir() {
                Ok(())
            } else {
                Err(e)
            }
        })
        .with_context(|| format!("failed to create output directory {}", dir.display()))
}

#[cfg(not(unix))]
fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))
}
