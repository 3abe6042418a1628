//! MIME type to file extension lookup.
//!
//! Only consulted when a derived filename has no extension of its own.

/// Well-known media types. First match wins; parameters after `;` are ignored.
const EXTENSIONS: &[(&str, &str)] = &[
    ("application/gzip", "gz"),
    ("application/json", "json"),
    ("application/octet-stream", "bin"),
    ("application/pdf", "pdf"),
    ("application/vnd.debian.binary-package", "deb"),
    ("application/x-bzip2", "bz2"),
    ("application/x-iso9660-image", "iso"),
    ("application/x-tar", "tar"),
    ("application/x-xz", "xz"),
    ("application/xml", "xml"),
    ("application/zip", "zip"),
    ("audio/mpeg", "mp3"),
    ("audio/ogg", "ogg"),
    ("image/gif", "gif"),
    ("image/png", "png"),
    ("image/svg+xml", "svg"),
    ("image/webp", "webp"),
    ("text/css", "css"),
    ("text/csv", "csv"),
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("video/webm", "webm"),
];

/// Maps a Content-Type value to a filename extension (without the dot), or
/// `"unknown"` when the type is not recognized.
pub fn find_extension(mime_type: &str) -> &'static str {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" => "jpg",
        "video/mp4" => "mp4",
        other => EXTENSIONS
            .iter()
            .find(|(mime, _)| *mime == other)
            .map(|(_, ext)| *ext)
            .unwrap_or("unknown"),
    }
}
