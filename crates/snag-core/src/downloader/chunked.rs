//! Concurrent chunked download: one fetch task per planned range, all
//! writing into a single preallocated part file.

use std::path::Path;
use std::sync::atomic::AtomicI64;
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};

use crate::control::CancelToken;
use crate::probe::Resource;
use crate::ratelimit::TokenBucket;
use crate::segmenter::Chunk;
use crate::storage::PartFile;

use super::fetch;
use super::FetchError;

/// Runs the chunked strategy for `resource`. On any chunk failure the sibling
/// fetches are cancelled, the part file is deleted, and the first error is
/// returned so the caller can fall back to a single stream.
pub(super) fn download_chunked(
    resource: &Resource,
    chunks: &[Chunk],
    part_path: &Path,
    final_path: &Path,
    limiter: &Arc<TokenBucket>,
    counter: &Arc<AtomicI64>,
    cancel: &CancelToken,
) -> Result<()> {
    let part = PartFile::open(part_path)?;
    // size the file up front so every task can write at its absolute offset
    part.preallocate(resource.length as u64)?;

    // first failing chunk cancels the siblings without touching the batch
    let chunk_cancel = cancel.child();

    let (tx, rx) = mpsc::channel::<(usize, Result<(), FetchError>)>();
    let mut handles = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().copied().enumerate() {
        let tx = tx.clone();
        let url = resource.url.clone();
        let part = part.clone();
        let limiter = Arc::clone(limiter);
        let counter = Arc::clone(counter);
        let chunk_cancel = chunk_cancel.clone();
        handles.push(std::thread::spawn(move || {
            let res = fetch::fetch_chunk(&url, chunk, &part, &limiter, &counter, &chunk_cancel);
            let _ = tx.send((index, res));
        }));
    }
    drop(tx);

    let mut first_error: Option<anyhow::Error> = None;
    for _ in 0..chunks.len() {
        let (index, res) = match rx.recv() {
            Ok(pair) => pair,
            Err(_) => {
                first_error
                    .get_or_insert_with(|| anyhow::anyhow!("chunk worker channel closed early"));
                break;
            }
        };
        match res {
            Ok(()) => {
                tracing::debug!(url = %resource.url, part = index, "chunk downloaded");
            }
            Err(e) => {
                tracing::error!(url = %resource.url, part = index, error = %e, "chunk download failed");
                if first_error.is_none() {
                    chunk_cancel.cancel();
                    first_error = Some(anyhow::Error::new(e).context(format!("chunk {}", index)));
                }
            }
        }
    }

    for handle in handles {
        if handle.join().is_err() && first_error.is_none() {
            first_error = Some(anyhow::anyhow!("chunk worker panicked"));
        }
    }

    if let Some(e) = first_error {
        if let Err(remove_err) = part.remove() {
            tracing::warn!(error = %remove_err, "failed to clean up part file");
        }
        return Err(e);
    }

    part.sync()?;
    part.finalize(final_path)
        .with_context(|| format!("failed to finalize {}", resource.filename))
}
