//! URL validation, filename derivation, and in-batch filename dedup.

mod content_disposition;
mod path;

pub use content_disposition::parse_content_disposition_filename;
pub use path::{base_name, filename_from_url_path, split_extension};

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::mime_ext;

/// Filename of last resort when neither Content-Disposition nor the URL path
/// yields a usable name.
const DEFAULT_FILENAME: &str = "download";

/// Accepts only absolute `http`/`https` URLs; returns the normalized form.
pub fn parse_validate_url(input: &str) -> Result<String> {
    let parsed = Url::parse(input).with_context(|| format!("invalid url: {}", input))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => bail!("invalid url: unsupported scheme {:?} in {}", other, input),
    }
}

/// Picks the local filename for a probed resource.
///
/// Priority: the `filename` parameter of Content-Disposition (basename,
/// rejected when it resolves to `.` or `/`), then the basename of the URL
/// path, then `"download"`. URL-derived names with no extension get one
/// synthesized from the Content-Type when the type is recognized.
pub fn derive_filename(url: &str, content_disposition: Option<&str>, content_type: &str) -> String {
    if let Some(cd) = content_disposition {
        if let Some(raw) = parse_content_disposition_filename(cd) {
            let name = base_name(&raw);
            if !name.is_empty() && name != "." && name != "/" {
                return name.to_string();
            }
        }
    }

    let name = filename_from_url_path(url).unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    if !name.contains('.') && !content_type.is_empty() {
        let ext = mime_ext::find_extension(content_type);
        if ext != "unknown" {
            return format!("{}.{}", name, ext);
        }
    }

    name
}

/// Rewrites colliding filenames to `base_1.ext`, `base_2.ext`, … so every
/// name in the batch is unique and none clashes with a file already present
/// in `output_dir`. An empty `output_dir` skips the on-disk seeding.
pub fn deduplicate_filenames<'a>(
    names: impl IntoIterator<Item = &'a mut String>,
    output_dir: &Path,
) {
    let mut used: HashSet<String> = HashSet::new();

    if !output_dir.as_os_str().is_empty() {
        if let Ok(entries) = std::fs::read_dir(output_dir) {
            for entry in entries.flatten() {
                if entry.file_type().map(|t| !t.is_dir()).unwrap_or(false) {
                    used.insert(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
    }

    for name in names {
        if used.insert(name.clone()) {
            continue;
        }

        let (base, ext) = split_extension(name);
        let (base, ext) = (base.to_string(), ext.to_string());
        let mut counter = 1u32;
        loop {
            let candidate = format!("{}_{}{}", base, counter, ext);
            if !used.contains(&candidate) {
                used.insert(candidate.clone());
                *name = candidate;
                break;
            }
            counter += 1;
        }
    }
}
