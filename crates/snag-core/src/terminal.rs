//! Terminal width lookup for the progress repaint.

const DEFAULT_WIDTH: usize = 80;

/// Current terminal width in columns, probed on stderr (where progress is
/// drawn). Falls back to 80 when stderr is not a terminal.
#[cfg(unix)]
pub fn width() -> usize {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(libc::STDERR_FILENO, libc::TIOCGWINSZ, &mut ws) };
    if rc != 0 || ws.ws_col == 0 {
        return DEFAULT_WIDTH;
    }
    ws.ws_col as usize
}

#[cfg(not(unix))]
pub fn width() -> usize {
    DEFAULT_WIDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_sane() {
        let w = width();
        assert!(w >= 10);
    }
}
