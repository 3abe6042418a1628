//! Content-Disposition filename extraction (`filename` and `filename*`).

/// Pulls the filename out of a Content-Disposition header value.
///
/// Handles the quoted and bare-token forms of `filename=`, plus the RFC 5987
/// `filename*=UTF-8''percent-encoded` form, which takes precedence when both
/// are present.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in header_value.split(';') {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key.eq_ignore_ascii_case("filename*") {
            let rest = value
                .strip_prefix("UTF-8''")
                .or_else(|| value.strip_prefix("utf-8''"));
            if let Some(rest) = rest {
                let decoded = percent_decode(rest);
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        } else if key.eq_ignore_ascii_case("filename") {
            let unquoted = unquote(value);
            if !unquoted.is_empty() {
                plain = Some(unquoted);
            }
        }
    }

    plain
}

fn unquote(value: &str) -> String {
    let inner = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => return value.to_string(),
    };

    // undo backslash escapes of quotes and backslashes
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push(c);
                    out.push(next);
                }
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn percent_decode(input: &str) -> String {
    let mut out = Vec::with_capacity(input.len());
    let mut bytes = input.bytes();
    while let Some(b) = bytes.next() {
        if b != b'%' {
            out.push(b);
            continue;
        }
        let hi = bytes.next().and_then(hex_value);
        let lo = bytes.next().and_then(hex_value);
        match (hi, lo) {
            (Some(hi), Some(lo)) => out.push(hi << 4 | lo),
            _ => out.push(b'%'),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_filename() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"report.pdf\"").as_deref(),
            Some("report.pdf")
        );
    }

    #[test]
    fn bare_token_filename() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=simple.bin").as_deref(),
            Some("simple.bin")
        );
    }

    #[test]
    fn escaped_quotes() {
        assert_eq!(
            parse_content_disposition_filename(r#"attachment; filename="a \"b\".txt""#).as_deref(),
            Some("a \"b\".txt")
        );
    }

    #[test]
    fn rfc5987_form() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename*=UTF-8''caf%C3%A9.txt")
                .as_deref(),
            Some("café.txt")
        );
    }

    #[test]
    fn rfc5987_takes_precedence() {
        assert_eq!(
            parse_content_disposition_filename(
                "attachment; filename=\"fallback.bin\"; filename*=UTF-8''real%20name.dat",
            )
            .as_deref(),
            Some("real name.dat")
        );
    }

    #[test]
    fn missing_filename() {
        assert_eq!(parse_content_disposition_filename("inline"), None);
        assert_eq!(parse_content_disposition_filename("attachment; size=42"), None);
    }
}
