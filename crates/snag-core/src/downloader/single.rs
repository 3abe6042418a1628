//! Single-stream GET with resume.
//!
//! Primary path for resources without a chunk plan, and the fallback when a
//! chunked attempt fails. Resume state is the existing `.part` size: the
//! request asks for `Range: bytes=<offset>-` and appends on a 206. A 200
//! means the server ignored the range, so the transfer restarts from zero.

use std::path::Path;
use std::str;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::control::{CancelToken, Cancelled};
use crate::progress::format_bytes;
use crate::ratelimit::TokenBucket;
use crate::storage::{self, PartFile};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const LOW_SPEED_LIMIT: u32 = 1024;
const LOW_SPEED_TIME: Duration = Duration::from_secs(60);

/// Downloads `url` sequentially into `part_path`, resuming when a previous
/// `.part` exists, then renames to `final_path`.
pub(super) fn download_single(
    url: &str,
    part_path: &Path,
    final_path: &Path,
    limiter: &Arc<TokenBucket>,
    counter: &Arc<AtomicI64>,
    cancel: &CancelToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Cancelled.into());
    }

    let offset = storage::resume_offset(part_path);
    counter.store(offset as i64, Ordering::Relaxed);

    let part = PartFile::open(part_path)?;
    if offset == 0 {
        part.truncate()?;
    }

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.fail_on_error(true)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.low_speed_limit(LOW_SPEED_LIMIT)?;
    easy.low_speed_time(LOW_SPEED_TIME)?;
    if let Some(cap) = limiter.buffer_cap() {
        easy.buffer_size(cap)?;
    }
    if offset > 0 {
        easy.range(&format!("{}-", offset))?;
        tracing::info!(
            file = %final_path.display(),
            offset = %format_bytes(offset as i64),
            "resuming download"
        );
    }

    // status of the final (post-redirect) response, captured as headers
    // arrive so the first body write can tell 206-continue from 200-restart
    let status = Arc::new(AtomicU32::new(0));
    let storage_error: Arc<Mutex<Option<anyhow::Error>>> = Arc::new(Mutex::new(None));
    let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let perform_result = {
        let status_hdr = Arc::clone(&status);
        let status_body = Arc::clone(&status);
        let storage_error = Arc::clone(&storage_error);
        let cancelled = Arc::clone(&cancelled);
        let cancel = cancel.clone();
        let part_cb = part.clone();
        let counter = Arc::clone(counter);
        let limiter = Arc::clone(limiter);

        let mut pos = offset;
        let mut range_checked = offset == 0;

        let mut transfer = easy.transfer();
        transfer.header_function(move |data| {
            if let Ok(line) = str::from_utf8(data) {
                if let Some(code) = parse_status_line(line.trim_end()) {
                    status_hdr.store(code, Ordering::Relaxed);
                }
            }
            true
        })?;
        transfer.write_function(move |data| {
            if cancel.is_cancelled() {
                cancelled.store(true, Ordering::Relaxed);
                return Ok(0);
            }
            if !range_checked {
                if status_body.load(Ordering::Relaxed) != 206 {
                    tracing::info!(
                        file = %part_cb.path().display(),
                        "server ignored range request, restarting"
                    );
                    if let Err(e) = part_cb.truncate() {
                        let _ = storage_error.lock().unwrap().replace(e);
                        return Ok(0);
                    }
                    pos = 0;
                    counter.store(0, Ordering::Relaxed);
                }
                range_checked = true;
            }
            if let Err(e) = part_cb.write_at(pos, data) {
                let _ = storage_error.lock().unwrap().replace(e);
                return Ok(0);
            }
            pos += data.len() as u64;
            limiter.wait(data.len());
            counter.fetch_add(data.len() as i64, Ordering::Relaxed);
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if e.is_write_error() {
            if cancelled.load(Ordering::Relaxed) || cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
            if let Some(io_err) = storage_error.lock().unwrap().take() {
                return Err(io_err);
            }
        }
        if e.is_http_returned_error() {
            let code = easy.response_code().unwrap_or(0);
            bail!("http status is not ok: GET {} returned {}", url, code);
        }
        return Err(anyhow::Error::new(e).context(format!("GET {} failed", url)));
    }

    let code = easy.response_code().context("no response code")?;
    if code != 200 && code != 206 {
        bail!("http status is not ok: GET {} returned {}", url, code);
    }

    part.sync()?;
    part.finalize(final_path)
}

/// Extracts the status code from an `HTTP/x.y NNN ...` line.
fn parse_status_line(line: &str) -> Option<u32> {
    let line = line.strip_prefix("HTTP/")?;
    line.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status_line("HTTP/1.1 206 Partial Content"), Some(206));
        assert_eq!(parse_status_line("HTTP/2 200"), Some(200));
        assert_eq!(parse_status_line("Content-Length: 5"), None);
        assert_eq!(parse_status_line(""), None);
    }
}
