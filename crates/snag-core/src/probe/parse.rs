//! Raw response-header parsing for the probe.

/// Headers the engine cares about, pulled from a HEAD response.
#[derive(Debug, Default)]
pub(super) struct HeadFields {
    /// Content-Length, or 0 when absent/unparseable (treated as unknown).
    pub content_length: i64,
    /// True when the server sent exactly `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// First Content-Type value, verbatim (parameters included).
    pub content_type: Option<String>,
    /// Content-Disposition value, verbatim.
    pub content_disposition: Option<String>,
}

/// Parses collected `Name: value` lines. Header names are case-insensitive;
/// the first occurrence of each interesting header wins.
pub(super) fn parse_headers(lines: &[String]) -> HeadFields {
    let mut out = HeadFields::default();

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-length") {
            if out.content_length == 0 {
                out.content_length = value.parse().unwrap_or(0);
            }
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            out.accept_ranges = out.accept_ranges || value == "bytes";
        } else if name.eq_ignore_ascii_case("content-type") {
            if out.content_type.is_none() {
                out.content_type = Some(value.to_string());
            }
        } else if name.eq_ignore_ascii_case("content-disposition") {
            if out.content_disposition.is_none() {
                out.content_disposition = Some(value.to_string());
            }
        }
    }

    out
}
