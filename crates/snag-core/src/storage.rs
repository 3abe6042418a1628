//! Disk I/O for one download target.
//!
//! A `PartFile` wraps the `.part` file written during a download. It is safe
//! to clone across chunk tasks; every write targets an explicit offset
//! (pwrite), so concurrent writers never share a cursor. The `.part` is the
//! only on-disk intermediate state; success renames it to the final path.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

#[cfg(unix)]
use std::os::unix::fs::{FileExt, OpenOptionsExt};

/// Suffix of the in-progress file: `file.iso` downloads as `file.iso.part`.
pub const PART_SUFFIX: &str = ".part";

/// Path of the temp file next to `final_path`.
pub fn part_path(final_path: &Path) -> PathBuf {
    let mut os = final_path.as_os_str().to_owned();
    os.push(PART_SUFFIX);
    PathBuf::from(os)
}

/// Size of an existing `.part`, or 0 when there is none. This is the resume
/// offset for single-stream downloads.
pub fn resume_offset(part: &Path) -> u64 {
    std::fs::metadata(part).map(|m| m.len()).unwrap_or(0)
}

/// Shared handle to a `.part` file supporting concurrent positional writes.
#[derive(Clone)]
pub struct PartFile {
    file: Arc<File>,
    path: PathBuf,
}

impl PartFile {
    /// Opens (creating if absent) the `.part` at `path` for writing, keeping
    /// any existing content. Mode 0o600 on unix.
    pub fn open(path: &Path) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true).write(true);
        #[cfg(unix)]
        options.mode(0o600);
        let file = options
            .open(path)
            .with_context(|| format!("failed to open part file {}", path.display()))?;
        Ok(Self {
            file: Arc::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata().context("failed to stat part file")?.len())
    }

    /// Sizes the file to exactly `len` bytes so chunk tasks can write at
    /// absolute offsets. No-op when the size already matches.
    pub fn preallocate(&self, len: u64) -> Result<()> {
        if self.len()? != len {
            self.file
                .set_len(len)
                .with_context(|| format!("failed to allocate part file {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Drops all content (single-stream restart after an ignored range).
    pub fn truncate(&self) -> Result<()> {
        self.file
            .set_len(0)
            .with_context(|| format!("failed to truncate part file {}", self.path.display()))
    }

    /// Writes `data` at `offset` without moving any shared cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.file
            .write_all_at(data, offset)
            .with_context(|| format!("write failed at offset {} in {}", offset, self.path.display()))
    }

    /// Non-unix fallback: seek + write on a cloned descriptor. The clone
    /// keeps the shared handle's cursor untouched.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone().context("failed to clone part file handle")?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
            .with_context(|| format!("write failed at offset {} in {}", offset, self.path.display()))
    }

    /// Flushes file data to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().context("part file sync failed")
    }

    /// Atomically renames the `.part` to `final_path`, consuming the handle.
    pub fn finalize(self, final_path: &Path) -> Result<()> {
        let path = self.path;
        drop(self.file);
        std::fs::rename(&path, final_path).with_context(|| {
            format!(
                "failed to finalize {} as {}",
                path.display(),
                final_path.display()
            )
        })
    }

    /// Deletes the `.part`, consuming the handle. Used when a chunked
    /// download aborts and the partial content is unusable.
    pub fn remove(self) -> Result<()> {
        let path = self.path;
        drop(self.file);
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to remove part file {}", path.display()))
    }
}
