//! Free-space probing for the batch admission gate.

use std::path::Path;

use anyhow::{Context, Result};

use crate::progress::format_bytes;

/// Error raised when the filesystem cannot hold the planned batch.
#[derive(Debug)]
pub struct NotEnoughDiskSpace {
    pub needed: i64,
    pub available: i64,
}

impl std::fmt::Display for NotEnoughDiskSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "not enough disk space: need {}, available {}",
            format_bytes(self.needed),
            format_bytes(self.available)
        )
    }
}

impl std::error::Error for NotEnoughDiskSpace {}

/// Available bytes on the filesystem containing `path`, saturating at
/// `i64::MAX`. Fails when the path cannot be statted.
#[cfg(unix)]
pub fn available_disk_space(path: &Path) -> Result<i64> {
    use std::os::unix::ffi::OsStrExt;

    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .context("path contains NUL byte")?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(cpath.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("failed to check disk space for {}", path.display()));
    }

    let available = (stat.f_bavail as u128) * (stat.f_frsize as u128);
    Ok(available.min(i64::MAX as u128) as i64)
}

/// Free-space probing is not implemented off unix; the gate always admits.
#[cfg(not(unix))]
pub fn available_disk_space(_path: &Path) -> Result<i64> {
    Ok(i64::MAX)
}

/// Verifies that the filesystem containing `path` has at least `needed`
/// bytes free.
pub fn check_disk_space(path: &Path, needed: i64) -> Result<()> {
    let available = available_disk_space(path)?;
    if available < needed {
        return Err(NotEnoughDiskSpace { needed, available }.into());
    }
    Ok(())
}
