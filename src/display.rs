//! Presentation adapter for the countdown and debug surfaces.
//!
//! The scheduler never talks to a UI toolkit directly; it drives the
//! `SleepDisplay` trait. The shipped implementation, `RuntimeDisplay`,
//! publishes small text files under `$XDG_RUNTIME_DIR/slumbr/` which status
//! bars or scripts can render, and consumes a marker file as the cancel
//! signal (`slumbr snooze` creates it). Every operation tolerates the files
//! being absent or removed out from under us; failures are logged and
//! swallowed so a broken surface can never stall a tick.

use std::fs;
use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;

/// Countdown status file, one line meant for direct display.
pub const COUNTDOWN_FILE: &str = "countdown";
/// Debug report file, `key: value` lines.
pub const DEBUG_FILE: &str = "debug";
/// Marker whose presence cancels the running countdown into a snooze.
///
/// The marker only has meaning while a countdown is visibly running: one
/// dropped at any other time (including during an already-active snooze)
/// is discarded when the next countdown opens rather than stacking a
/// second deferral. Snoozes extend by cancelling the next countdown, not
/// by repeating the request early.
pub const SNOOZE_MARKER: &str = "snooze";

/// Diagnostic mirror of the scheduler's view of the world, refreshed every
/// tick while debug mode is on.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugReport {
    pub active: bool,
    pub current_time: String,
    pub start_time: String,
    pub end_time: String,
    pub countdown_remaining: String,
    pub snooze_remaining: String,
    pub next_trigger: String,
    pub reason: String,
}

/// Display collaborator the scheduler drives once per tick.
///
/// Implementations must be idempotent: repeated opens/closes with nothing to
/// do are no-ops, and updates against a closed surface recreate it.
#[cfg_attr(test, automock)]
pub trait SleepDisplay {
    /// Make the countdown surface visible (created on demand).
    fn open_countdown(&mut self);
    /// Push the current countdown text, percent complete, and whole minutes
    /// remaining (rounded up).
    fn update_countdown(&mut self, text: &str, percent: u8, minutes_left: u64);
    /// Poll for a user cancel since the last tick. Consumes the signal.
    fn countdown_cancelled(&mut self) -> bool;
    /// Tear down the countdown surface. Safe when never opened.
    fn close_countdown(&mut self);
    /// Refresh the debug surface (created on demand).
    fn update_debug(&mut self, report: &DebugReport);
    /// Tear down the debug surface, independent of the countdown lifecycle.
    fn close_debug(&mut self);
}

/// Directory holding the runtime surfaces.
pub fn runtime_dir() -> PathBuf {
    let base = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(base).join("slumbr")
}

/// File-backed display publishing to the runtime directory.
pub struct RuntimeDisplay {
    dir: PathBuf,
    countdown_open: bool,
}

impl RuntimeDisplay {
    pub fn new() -> Self {
        Self::at(runtime_dir())
    }

    /// Root the surfaces at an explicit directory (tests).
    pub fn at(dir: PathBuf) -> Self {
        Self {
            dir,
            countdown_open: false,
        }
    }

    fn write_file(&self, name: &str, content: &str) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            log_pipe!();
            log_warning!("Failed to create runtime directory: {}", e);
            return;
        }
        if let Err(e) = fs::write(self.dir.join(name), content) {
            log_pipe!();
            log_warning!("Failed to update {} surface: {}", name, e);
        }
    }

    fn remove_file(&self, name: &str) {
        let path = self.dir.join(name);
        if path.exists()
            && let Err(e) = fs::remove_file(&path)
        {
            log_pipe!();
            log_warning!("Failed to remove {} surface: {}", name, e);
        }
    }
}

impl Default for RuntimeDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepDisplay for RuntimeDisplay {
    fn open_countdown(&mut self) {
        if self.countdown_open {
            return;
        }
        // A marker left over from before the countdown opened is not a
        // cancel of this countdown
        self.remove_file(SNOOZE_MARKER);
        self.write_file(COUNTDOWN_FILE, "--:--\n");
        self.countdown_open = true;
    }

    fn update_countdown(&mut self, text: &str, percent: u8, minutes_left: u64) {
        if !self.countdown_open {
            self.open_countdown();
        }
        self.write_file(
            COUNTDOWN_FILE,
            &format!("{text} ({percent}%, {minutes_left} min left)\n"),
        );
    }

    fn countdown_cancelled(&mut self) -> bool {
        let marker = self.dir.join(SNOOZE_MARKER);
        if marker.exists() {
            self.remove_file(SNOOZE_MARKER);
            return true;
        }
        false
    }

    fn close_countdown(&mut self) {
        self.remove_file(COUNTDOWN_FILE);
        self.countdown_open = false;
    }

    fn update_debug(&mut self, report: &DebugReport) {
        self.write_file(
            DEBUG_FILE,
            &format!(
                "active: {}\ncurrent_time: {}\nstart_time: {}\nend_time: {}\n\
                 countdown_remaining: {}\nsnooze_remaining: {}\nnext_trigger: {}\nreason: {}\n",
                if report.active { "yes" } else { "no" },
                report.current_time,
                report.start_time,
                report.end_time,
                report.countdown_remaining,
                report.snooze_remaining,
                report.next_trigger,
                report.reason,
            ),
        );
    }

    fn close_debug(&mut self) {
        self.remove_file(DEBUG_FILE);
    }
}

/// Format a duration in whole seconds as `MM:SS`, or `HH:MM:SS` once past
/// an hour.
pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Whole minutes remaining, rounded up.
pub fn minutes_remaining(total_seconds: i64) -> u64 {
    let total_seconds = total_seconds.max(0) as u64;
    total_seconds.div_ceil(60)
}

/// Percent of the countdown already elapsed, saturating at 100.
pub fn percent_complete(total_seconds: i64, remaining_seconds: i64) -> u8 {
    if total_seconds <= 0 {
        return 100;
    }
    let elapsed = (total_seconds - remaining_seconds.clamp(0, total_seconds)).max(0);
    ((elapsed * 100) / total_seconds).clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(-5), "00:00");
        assert_eq!(format_duration(599), "09:59");
        assert_eq!(format_duration(3600), "01:00:00");
        assert_eq!(format_duration(3661), "01:01:01");
    }

    #[test]
    fn minutes_round_up() {
        assert_eq!(minutes_remaining(0), 0);
        assert_eq!(minutes_remaining(1), 1);
        assert_eq!(minutes_remaining(60), 1);
        assert_eq!(minutes_remaining(61), 2);
    }

    #[test]
    fn percent_complete_bounds() {
        assert_eq!(percent_complete(600, 600), 0);
        assert_eq!(percent_complete(600, 300), 50);
        assert_eq!(percent_complete(600, 0), 100);
        assert_eq!(percent_complete(600, -10), 100);
        assert_eq!(percent_complete(0, 0), 100);
    }

    #[test]
    fn runtime_display_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut display = RuntimeDisplay::at(dir.path().to_path_buf());

        display.open_countdown();
        assert!(dir.path().join(COUNTDOWN_FILE).exists());

        display.update_countdown("09:58", 1, 10);
        let content = fs::read_to_string(dir.path().join(COUNTDOWN_FILE)).unwrap();
        assert!(content.contains("09:58"));
        assert!(content.contains("10 min left"));

        display.close_countdown();
        assert!(!dir.path().join(COUNTDOWN_FILE).exists());
        // Idempotent re-close
        display.close_countdown();
    }

    #[test]
    fn cancel_marker_is_consumed_once() {
        let dir = TempDir::new().unwrap();
        let mut display = RuntimeDisplay::at(dir.path().to_path_buf());
        display.open_countdown();

        fs::write(dir.path().join(SNOOZE_MARKER), "").unwrap();
        assert!(display.countdown_cancelled());
        assert!(!display.countdown_cancelled(), "marker consumed");
    }

    #[test]
    fn stale_marker_cleared_on_open() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(SNOOZE_MARKER), "").unwrap();

        let mut display = RuntimeDisplay::at(dir.path().to_path_buf());
        display.open_countdown();
        assert!(!display.countdown_cancelled());
    }
}
