//! HTTP HEAD probing: turns a URL into a download plan.
//!
//! A probe confirms the resource exists, reads `Content-Length`,
//! `Accept-Ranges`, `Content-Type`, and `Content-Disposition`, derives the
//! local filename, and plans chunks when ranged fetches are permitted.
//! Runs on the current thread; call from `spawn_blocking` in async code.

mod parse;

use std::str;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::control::{CancelToken, Cancelled};
use crate::segmenter::{plan_chunks, Chunk};
use crate::url_model;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REDIRECTS: u32 = 10;

/// The probed description of one URL, immutable once built (except for the
/// filename, which dedup may adjust before downloads start).
#[derive(Debug, Clone)]
pub struct Resource {
    /// Original request URL.
    pub url: String,
    /// Target filename (dedup may rewrite it).
    pub filename: String,
    /// Content-Type reported by the server; empty when absent.
    pub content_type: String,
    /// Content-Length; 0 or negative means unknown.
    pub length: i64,
    /// Planned byte ranges; `None` means single-stream only.
    pub chunks: Option<Vec<Chunk>>,
}

/// Issues a HEAD request (5 s deadline) and builds the `Resource`.
///
/// Fails unless the final status is 200. Chunks are planned only when the
/// server advertises `Accept-Ranges: bytes` and reports a positive length.
pub fn probe_resource(url: &str, chunk_count: usize, cancel: &CancelToken) -> Result<Resource> {
    if cancel.is_cancelled() {
        return Err(Cancelled.into());
    }

    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(MAX_REDIRECTS)?;
    easy.timeout(PROBE_TIMEOUT)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                // Redirects emit one header block per hop; keep only the
                // final response's headers.
                if line.starts_with("HTTP/") {
                    headers.clear();
                }
                headers.push(line.to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if code != 200 {
        bail!("http status is not ok: HEAD {} returned {}", url, code);
    }

    let fields = parse::parse_headers(&headers);
    let content_type = fields.content_type.unwrap_or_default();
    let filename = url_model::derive_filename(url, fields.content_disposition.as_deref(), &content_type);

    let chunks = if fields.accept_ranges && fields.content_length > 0 {
        let plan = plan_chunks(fields.content_length, chunk_count);
        (!plan.is_empty()).then_some(plan)
    } else {
        None
    };

    let resource = Resource {
        url: url.to_string(),
        filename,
        content_type,
        length: fields.content_length,
        chunks,
    };

    tracing::debug!(
        url,
        length = resource.length,
        filename = %resource.filename,
        chunks = resource.chunks.as_ref().map_or(0, Vec::len),
        "probed resource"
    );

    Ok(resource)
}
