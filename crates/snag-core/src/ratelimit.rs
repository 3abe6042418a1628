//! Shared bandwidth ceiling: a token bucket drained by every transfer.
//!
//! One bucket serves the whole process, so the aggregate rate across all
//! concurrent chunk and single-stream transfers stays at the limit. Capacity
//! equals one second of traffic, which bounds burstiness.

use std::sync::Mutex;
use std::time::Instant;

use anyhow::{bail, Result};

const KILO: f64 = 1024.0;
const MEGA: f64 = KILO * KILO;
const GIGA: f64 = KILO * MEGA;

/// How long to back off when the bucket is empty.
const RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

struct BucketState {
    tokens: i64,
    last_refill: Instant,
}

/// Token bucket rate limiter. `wait` blocks the calling worker thread, so it
/// must only be used from blocking transfer code, never on the async runtime.
pub struct TokenBucket {
    rate: i64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a bucket limited to `rate` bytes per second. A rate of 0 means
    /// unlimited. The bucket starts full (one second of burst).
    pub fn new(rate: i64) -> Self {
        Self {
            rate,
            state: Mutex::new(BucketState {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Configured rate in bytes per second (0 = unlimited).
    pub fn rate(&self) -> i64 {
        self.rate
    }

    /// Receive-buffer cap for transfers: one burst's worth of bytes, so a
    /// single read can never outrun the bucket. None when unlimited.
    pub fn buffer_cap(&self) -> Option<usize> {
        if self.rate <= 0 {
            return None;
        }
        // libcurl clamps CURLOPT_BUFFERSIZE to [1024, 512KiB] on its own;
        // wait() slices oversized requests, so the low clamp is safe.
        Some(self.rate.clamp(1024, 512 * 1024) as usize)
    }

    /// Debits `n` bytes, sleeping until the bucket can cover them. Requests
    /// larger than one burst are consumed in rate-sized slices.
    pub fn wait(&self, n: usize) {
        if self.rate <= 0 {
            return;
        }

        let mut remaining = n as i64;
        while remaining > 0 {
            let request = remaining.min(self.rate);
            self.wait_for_tokens(request);
            remaining -= request;
        }
    }

    fn wait_for_tokens(&self, n: i64) {
        loop {
            {
                let mut state = self.state.lock().unwrap();

                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill);
                let refill = (elapsed.as_secs_f64() * self.rate as f64) as i64;
                if refill > 0 {
                    state.tokens = (state.tokens + refill).min(self.rate);
                    state.last_refill = now;
                }

                if state.tokens >= n {
                    state.tokens -= n;
                    return;
                }
            }
            std::thread::sleep(RETRY_INTERVAL);
        }
    }
}

/// Parses a bandwidth spec like `5M`, `500K`, `1.5M`, `1G` into bytes per
/// second. Empty or `0` means unlimited. Suffixes are powers of 1024.
pub fn parse_rate(s: &str) -> Result<i64> {
    let s = s.trim();
    if s.is_empty() || s == "0" {
        return Ok(0);
    }

    let upper = s.to_ascii_uppercase();
    let (num_str, multiplier) = match upper.as_bytes().last().copied() {
        Some(b'G') => (&upper[..upper.len() - 1], GIGA),
        Some(b'M') => (&upper[..upper.len() - 1], MEGA),
        Some(b'K') => (&upper[..upper.len() - 1], KILO),
        _ => (upper.as_str(), 1.0),
    };

    let num: f64 = match num_str.parse() {
        Ok(n) => n,
        Err(_) => bail!("invalid rate: {}", s),
    };
    if num < 0.0 || num.is_nan() || num.is_infinite() {
        bail!("invalid rate value: {}", s);
    }

    let result = num * multiplier;
    if result >= i64::MAX as f64 {
        bail!("rate value too large: {}", s);
    }

    Ok(result as i64)
}
