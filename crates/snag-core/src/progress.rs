//! Multi-line terminal progress for concurrent downloads.
//!
//! Downloaders bump shared atomic byte counters; a tokio task repaints one
//! line per file every 200 ms by moving the cursor back up over the previous
//! frame. The tracker only ever loads the counters, so there is no locking
//! against the transfer threads.

use std::io::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::terminal;

const UPDATE_INTERVAL: Duration = Duration::from_millis(200);
const BAR_WIDTH: usize = 30;
const SEPARATOR_LEN: usize = 2; // ": "
const MIN_NAME_WIDTH: usize = 10;

const KILO: i64 = 1024;
const MEGA: i64 = KILO * KILO;
const GIGA: i64 = KILO * MEGA;

/// One tracked download: display name, live byte counter, expected total
/// (&le; 0 when the server did not report a length).
struct ProgressEntry {
    filename: String,
    current: Arc<AtomicI64>,
    total: i64,
}

/// Registry of downloads to render. Entries may be added while the ticker is
/// already running.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    entries: Arc<Mutex<Vec<ProgressEntry>>>,
}

/// Handle to the running render loop; `finish` paints a final frame and
/// releases the terminal.
pub struct ProgressTicker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a download. `current` is shared with the transfer that
    /// updates it; `total <= 0` renders as an indeterminate bar.
    pub fn add(&self, filename: &str, current: Arc<AtomicI64>, total: i64) {
        self.entries.lock().unwrap().push(ProgressEntry {
            filename: filename.to_string(),
            current,
            total,
        });
    }

    /// Spawns the render loop on the current tokio runtime.
    pub fn start(&self) -> ProgressTicker {
        let (stop, mut stopped) = watch::channel(false);
        let entries = Arc::clone(&self.entries);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(UPDATE_INTERVAL);
            let mut lines = 0usize;
            loop {
                tokio::select! {
                    _ = interval.tick() => render(&entries, &mut lines),
                    _ = stopped.changed() => {
                        render(&entries, &mut lines);
                        eprintln!();
                        break;
                    }
                }
            }
        });

        ProgressTicker { stop, handle }
    }
}

impl ProgressTicker {
    /// Stops the loop after one last repaint and waits for it to drain.
    pub async fn finish(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}

fn render(entries: &Arc<Mutex<Vec<ProgressEntry>>>, lines: &mut usize) {
    let entries = entries.lock().unwrap();

    let mut frame = String::new();
    if *lines > 0 {
        // overwrite the previous frame in place
        frame.push_str(&format!("\x1b[{}A", lines));
    }

    let bars: Vec<String> = entries
        .iter()
        .map(|e| format_progress_bar(e.current.load(Ordering::Relaxed), e.total))
        .collect();

    let max_bar = bars.iter().map(|b| b.chars().count()).max().unwrap_or(0);
    let max_name = entries
        .iter()
        .map(|e| e.filename.chars().count())
        .max()
        .unwrap_or(0);

    let available = terminal::width()
        .saturating_sub(max_bar + SEPARATOR_LEN)
        .max(MIN_NAME_WIDTH);
    let name_width = max_name.min(available);

    for (entry, bar) in entries.iter().zip(&bars) {
        let name = truncate_name(&entry.filename, name_width);
        frame.push_str(&format!("\r\x1b[K{:>width$}: {}\n", name, bar, width = name_width));
    }

    *lines = entries.len();

    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(frame.as_bytes());
    let _ = stderr.flush();
}

/// Renders `[████░░] 42% 4.2MB/10.0MB`; unknown totals render a `?` bar with
/// only the current byte count.
pub fn format_progress_bar(current: i64, total: i64) -> String {
    if total <= 0 {
        return format!("[{}] {}", "?".repeat(BAR_WIDTH), format_bytes(current));
    }

    let pct = (current as f64 / total as f64).clamp(0.0, 1.0);
    let filled = ((pct * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let bar = "█".repeat(filled) + &"░".repeat(BAR_WIDTH - filled);

    format!(
        "[{}] {:>3}% {}/{}",
        bar,
        (pct * 100.0).round() as i64,
        format_bytes(current),
        format_bytes(total)
    )
}

/// Shortens `name` to `max_width` display characters, ellipsizing unless the
/// budget is too small to fit one.
pub fn truncate_name(name: &str, max_width: usize) -> String {
    const ELLIPSIS: &str = "...";

    if name.chars().count() <= max_width {
        return name.to_string();
    }
    if max_width <= ELLIPSIS.len() {
        return name.chars().take(max_width).collect();
    }
    let kept: String = name.chars().take(max_width - ELLIPSIS.len()).collect();
    kept + ELLIPSIS
}

/// Human-readable byte count: `500B`, `1.5KB`, `2.0MB`, `1.0GB`.
pub fn format_bytes(bytes: i64) -> String {
    match bytes {
        b if b >= GIGA => format!("{:.1}GB", b as f64 / GIGA as f64),
        b if b >= MEGA => format!("{:.1}MB", b as f64 / MEGA as f64),
        b if b >= KILO => format!("{:.1}KB", b as f64 / KILO as f64),
        b => format!("{}B", b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_contains_percentage() {
        assert!(format_progress_bar(50, 100).contains("50%"));
        assert!(format_progress_bar(100, 100).contains("100%"));
        assert!(format_progress_bar(0, 100).contains(" 0%"));
    }

    #[test]
    fn bar_clamps_overflow() {
        assert!(format_progress_bar(200, 100).contains("100%"));
    }

    #[test]
    fn bar_unknown_total() {
        let bar = format_progress_bar(500, 0);
        assert!(bar.contains('?'));
        assert!(bar.contains("500B"));

        let bar = format_progress_bar(2048, -1);
        assert!(bar.contains('?'));
        assert!(bar.contains("2.0KB"));
    }

    #[test]
    fn bar_fill_is_proportional() {
        let bar = format_progress_bar(50, 100);
        assert_eq!(bar.matches('█').count(), 15);
        assert_eq!(bar.matches('░').count(), 15);
    }

    #[test]
    fn truncate_cases() {
        assert_eq!(truncate_name("file.zip", 20), "file.zip");
        assert_eq!(truncate_name("file.zip", 8), "file.zip");
        assert_eq!(truncate_name("very-long-filename.zip", 12), "very-long...");
        assert_eq!(truncate_name("abcdef", 3), "abc");
        assert_eq!(truncate_name("abcdef", 4), "a...");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(500), "500B");
        assert_eq!(format_bytes(1024), "1.0KB");
        assert_eq!(format_bytes(1024 * 1024), "1.0MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0GB");
        assert_eq!(format_bytes(1536 * 1024), "1.5MB");
    }

    #[tokio::test]
    async fn ticker_starts_and_finishes() {
        let tracker = ProgressTracker::new();
        let counter = Arc::new(AtomicI64::new(50));
        tracker.add("test-file.bin", Arc::clone(&counter), 100);

        let ticker = tracker.start();
        counter.store(80, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(450)).await;
        ticker.finish().await;
    }
}
