//! Minimal HTTP/1.1 server for integration tests: HEAD probes and
//! (optionally) ranged GETs over a single static body.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` even when ranges work.
    pub advertise_ranges: bool,
    /// If true, any ranged GET is refused with 416 (plain GETs still work).
    pub reject_ranges: bool,
    /// If true, HEAD returns 404.
    pub fail_heads: bool,
    /// If true, every GET returns 500.
    pub fail_gets: bool,
    /// Extra Content-Type header on HEAD responses.
    pub content_type: Option<&'static str>,
    /// Extra Content-Disposition header on HEAD responses.
    pub content_disposition: Option<&'static str>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            advertise_ranges: true,
            reject_ranges: false,
            fail_heads: false,
            fail_gets: false,
            content_type: None,
            content_disposition: None,
        }
    }
}

/// Starts a server thread serving `body` and returns its base URL
/// (e.g. `http://127.0.0.1:12345/`). Runs until the process exits.
pub fn start(body: Vec<u8>) -> String {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, opts));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));

    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if method.eq_ignore_ascii_case("HEAD") {
        if opts.fail_heads {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n");
            return;
        }
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n",
            total
        );
        if opts.advertise_ranges && opts.support_ranges {
            response.push_str("Accept-Ranges: bytes\r\n");
        }
        if let Some(ct) = opts.content_type {
            response.push_str(&format!("Content-Type: {}\r\n", ct));
        }
        if let Some(cd) = opts.content_disposition {
            response.push_str(&format!("Content-Disposition: {}\r\n", cd));
        }
        response.push_str("\r\n");
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    if method.eq_ignore_ascii_case("GET") {
        if opts.fail_gets {
            let _ = stream.write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
            return;
        }

        let (status, slice) = match range {
            Some(_) if opts.reject_ranges => {
                let _ = stream.write_all(
                    b"HTTP/1.1 416 Range Not Satisfiable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
                return;
            }
            Some((start, end_incl)) if opts.support_ranges => {
                let start = start.min(total) as usize;
                let end_excl = (end_incl.saturating_add(1)).min(total) as usize;
                ("206 Partial Content", &body[start.min(end_excl)..end_excl])
            }
            _ => ("200 OK", body),
        };

        let mut response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            status,
            slice.len()
        );
        if let Some((start, _)) = range.filter(|_| status.starts_with("206") && !slice.is_empty()) {
            response.push_str(&format!(
                "Content-Range: bytes {}-{}/{}\r\n",
                start,
                start + slice.len() as u64 - 1,
                total
            ));
        }
        response.push_str("\r\n");
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(slice);
        return;
    }

    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
}

/// Returns (method, optional (start, inclusive end) from `Range: bytes=A-B`).
/// An open-ended `bytes=A-` maps the end to `u64::MAX`.
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");

    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        let value = value.trim().to_ascii_lowercase();
        if let Some(spec) = value.strip_prefix("bytes=") {
            if let Some((a, b)) = spec.split_once('-') {
                let start = a.trim().parse::<u64>().unwrap_or(0);
                let end = b.trim();
                let end_incl = if end.is_empty() {
                    u64::MAX
                } else {
                    end.parse::<u64>().unwrap_or(0)
                };
                range = Some((start, end_incl));
            }
        }
    }
    (method, range)
}
