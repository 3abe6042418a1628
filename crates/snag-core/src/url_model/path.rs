//! Path helpers for filename derivation and dedup.

use url::Url;

/// Last segment of the URL path, with query and fragment stripped. `None`
/// when the path has no usable final segment (e.g. `https://host/`).
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Final path component of a slash-separated name, mirroring `basename(1)`:
/// trailing slashes are dropped, `""` maps to `"."` and `"/"` stays `"/"`.
pub fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Splits `name` into stem and extension, where the extension is the suffix
/// starting at the last interior `.` (so `archive.tar.gz` splits at `.gz`,
/// and a leading dot is not an extension).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_basename() {
        assert_eq!(
            filename_from_url_path("https://example.com/a/b/file.zip").as_deref(),
            Some("file.zip")
        );
        assert_eq!(
            filename_from_url_path("https://example.com/file.zip?sig=abc#frag").as_deref(),
            Some("file.zip")
        );
        assert_eq!(filename_from_url_path("https://example.com/"), None);
        assert_eq!(filename_from_url_path("https://example.com"), None);
        // trailing slash: last non-empty segment wins
        assert_eq!(
            filename_from_url_path("https://example.com/dir/").as_deref(),
            Some("dir")
        );
    }

    #[test]
    fn base_name_cases() {
        assert_eq!(base_name("report.pdf"), "report.pdf");
        assert_eq!(base_name("dir/report.pdf"), "report.pdf");
        assert_eq!(base_name("/etc/passwd"), "passwd");
        assert_eq!(base_name("dir/"), "dir");
        assert_eq!(base_name("/"), "/");
        assert_eq!(base_name(""), ".");
    }

    #[test]
    fn split_extension_cases() {
        assert_eq!(split_extension("file.zip"), ("file", ".zip"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
    }
}
