//! Per-resource download driver.
//!
//! A resource with a chunk plan is fetched by the chunked downloader; when
//! that fails for any reason short of cancellation, the partial file is
//! discarded and the single-stream path takes over. Resources without a plan
//! go straight to single-stream. All of this is blocking work and runs in
//! `spawn_blocking` from the orchestrator.

mod chunked;
mod fetch;
mod single;

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::control::CancelToken;
use crate::probe::Resource;
use crate::progress::format_bytes;
use crate::ratelimit::TokenBucket;
use crate::storage;

/// Error from a single chunk fetch, kept typed so the chunked driver can
/// report precisely what sank the attempt.
#[derive(Debug)]
pub enum FetchError {
    /// libcurl failure (connect, TLS, stalled transfer, ...).
    Curl(curl::Error),
    /// Response status was not 200/206.
    Http(u32),
    /// Transfer finished but the byte count disagrees with the plan.
    SizeMismatch { expected: u64, received: u64 },
    /// Writing the received bytes to the part file failed.
    Storage(anyhow::Error),
    /// The chunk was aborted by cancellation.
    Cancelled,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "http status is not ok: returned {}", code),
            FetchError::SizeMismatch { expected, received } => {
                write!(f, "chunk size mismatch: got {} bytes, want {}", received, expected)
            }
            FetchError::Storage(e) => write!(f, "storage: {}", e),
            FetchError::Cancelled => write!(f, "download cancelled"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            _ => None,
        }
    }
}

/// Downloads one probed resource into `output_dir`, updating `counter` as
/// bytes land. Returns once the final file is in place or every strategy is
/// exhausted.
pub fn download_resource(
    resource: &Resource,
    output_dir: &Path,
    limiter: &Arc<TokenBucket>,
    counter: &Arc<AtomicI64>,
    cancel: &CancelToken,
) -> Result<()> {
    let final_path = output_dir.join(&resource.filename);
    let part_path = storage::part_path(&final_path);

    if let Some(chunks) = &resource.chunks {
        match chunked::download_chunked(
            resource, chunks, &part_path, &final_path, limiter, counter, cancel,
        ) {
            Ok(()) => {
                log_complete(resource);
                return Ok(());
            }
            Err(e) if cancel.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    url = %resource.url,
                    error = %e,
                    "chunked download failed, falling back to single stream"
                );
                // the chunked path removes its .part on failure; clear any
                // straggler so the fallback starts from a clean slate
                let _ = std::fs::remove_file(&part_path);
                counter.store(0, Ordering::Relaxed);
            }
        }
    }

    single::download_single(&resource.url, &part_path, &final_path, limiter, counter, cancel)?;
    log_complete(resource);
    Ok(())
}

fn log_complete(resource: &Resource) {
    tracing::info!(
        file = %resource.filename,
        size = %format_bytes(resource.length.max(0)),
        "download complete"
    );
}
