//! One HTTP Range GET, streamed to the part file at its absolute offset.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::control::CancelToken;
use crate::ratelimit::TokenBucket;
use crate::segmenter::Chunk;
use crate::storage::PartFile;

use super::FetchError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// Abort when throughput drops below 1 KiB/s for a minute: catches dead
// connections without a hard deadline that would kill slow-but-live chunks.
const LOW_SPEED_LIMIT: u32 = 1024;
const LOW_SPEED_TIME: Duration = Duration::from_secs(60);

/// Fetches `chunk` of `url` and writes it at `chunk.start + n` as bytes
/// arrive. The byte count must match the plan exactly.
pub(super) fn fetch_chunk(
    url: &str,
    chunk: Chunk,
    part: &PartFile,
    limiter: &Arc<TokenBucket>,
    counter: &Arc<AtomicI64>,
    cancel: &CancelToken,
) -> Result<(), FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    let written = Arc::new(AtomicU64::new(0));
    let storage_error: Arc<Mutex<Option<anyhow::Error>>> = Arc::new(Mutex::new(None));

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(FetchError::Curl)?;
    easy.follow_location(true).map_err(FetchError::Curl)?;
    easy.max_redirections(10).map_err(FetchError::Curl)?;
    easy.fail_on_error(true).map_err(FetchError::Curl)?;
    easy.connect_timeout(CONNECT_TIMEOUT).map_err(FetchError::Curl)?;
    easy.low_speed_limit(LOW_SPEED_LIMIT).map_err(FetchError::Curl)?;
    easy.low_speed_time(LOW_SPEED_TIME).map_err(FetchError::Curl)?;
    easy.range(&chunk.range_value()).map_err(FetchError::Curl)?;
    if let Some(cap) = limiter.buffer_cap() {
        easy.buffer_size(cap).map_err(FetchError::Curl)?;
    }

    let perform_result = {
        let written = Arc::clone(&written);
        let storage_error = Arc::clone(&storage_error);
        let part = part.clone();
        let limiter = Arc::clone(limiter);
        let counter = Arc::clone(counter);
        let cancel = cancel.clone();

        let mut transfer = easy.transfer();
        transfer
            .write_function(move |data| {
                if cancel.is_cancelled() {
                    return Ok(0);
                }
                let off = written.fetch_add(data.len() as u64, Ordering::Relaxed);
                if let Err(e) = part.write_at(chunk.start + off, data) {
                    let _ = storage_error.lock().unwrap().replace(e);
                    return Ok(0);
                }
                limiter.wait(data.len());
                counter.fetch_add(data.len() as i64, Ordering::Relaxed);
                Ok(data.len())
            })
            .map_err(FetchError::Curl)?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if e.is_write_error() {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if let Some(io_err) = storage_error.lock().unwrap().take() {
                return Err(FetchError::Storage(io_err));
            }
        }
        if e.is_http_returned_error() {
            let code = easy.response_code().unwrap_or(0);
            return Err(FetchError::Http(code));
        }
        return Err(FetchError::Curl(e));
    }

    let code = easy.response_code().map_err(FetchError::Curl)?;
    if code != 200 && code != 206 {
        return Err(FetchError::Http(code));
    }

    let received = written.load(Ordering::Relaxed);
    if received != chunk.len() {
        // a 200 full-body reply from a range-ignoring server lands here too
        return Err(FetchError::SizeMismatch {
            expected: chunk.len(),
            received,
        });
    }

    Ok(())
}
