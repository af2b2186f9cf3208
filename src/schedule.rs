//! Daily sleep-window computation.
//!
//! This module decides whether the current wall-clock instant falls inside
//! the configured daily window, handling three shapes of schedule:
//!
//! - **Single-instant**: only a start time is configured. The "window" is
//!   the instant `start` each day; once it passes, the schedule counts as
//!   active for the rest of the day. Only the persisted snooze prevents the
//!   countdown from re-arming after a completed shutdown within the same
//!   day. That is deliberate, inherited behavior; there is no separate
//!   "already fired" flag.
//! - **Non-wrapping**: `start <= end`, active iff `start_today <= now < end_today`.
//! - **Wrapping**: `start > end`, the window spans midnight. Before the
//!   start time the relevant occurrence may still be *yesterday's* window,
//!   running until `end_today`.
//!
//! All computation uses local wall-clock `NaiveDateTime` at minute
//! resolution. The `next_trigger` field is a display/scheduling hint only;
//! it never gates behavior by itself.

use chrono::{Days, NaiveDateTime, NaiveTime};

/// Derived state of the daily window, recomputed every tick and never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowState {
    /// Whether `now` is inside the window (start-inclusive, end-exclusive).
    pub active: bool,
    /// End of the occurrence the current tick is evaluated against. Snooze
    /// deadlines at or past this instant are stale.
    pub window_end: NaiveDateTime,
    /// The next instant the window will open. Display hint only.
    pub next_trigger: NaiveDateTime,
}

/// Parse a `"HH:MM"` clock value at minute resolution.
///
/// Malformed input is logged at warning level and treated as absent, per
/// the unattended-operation error policy: a bad schedule must never crash
/// the polling loop.
pub fn parse_clock(label: &str, value: &str) -> Option<NaiveTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match NaiveTime::parse_from_str(trimmed, "%H:%M") {
        Ok(time) => Some(time),
        Err(_) => {
            log_pipe!();
            log_warning!("Invalid {} time '{}', expected HH:MM", label, trimmed);
            None
        }
    }
}

fn at_time(now: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    now.date().and_time(time)
}

fn plus_day(instant: NaiveDateTime) -> NaiveDateTime {
    instant
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Compute the window state for the current tick.
///
/// With `end` absent the schedule runs in single-instant mode: active from
/// `start_today` onward, with `window_end` defined as tomorrow's occurrence
/// so a snooze set against this trigger can never outlive it.
pub fn compute_window(
    now: NaiveDateTime,
    start: NaiveTime,
    end: Option<NaiveTime>,
) -> WindowState {
    let start_today = at_time(now, start);

    let Some(end) = end else {
        // Single-instant mode
        return WindowState {
            active: now >= start_today,
            window_end: plus_day(start_today),
            next_trigger: if now < start_today {
                start_today
            } else {
                plus_day(start_today)
            },
        };
    };

    let end_today = at_time(now, end);

    if start <= end {
        // Non-wrapping window. start == end degenerates to a zero-width
        // window that is never active past the boundary instant.
        if now < start_today {
            return WindowState {
                active: false,
                window_end: end_today,
                next_trigger: start_today,
            };
        }
        if now >= end_today {
            return WindowState {
                active: false,
                window_end: end_today,
                next_trigger: plus_day(start_today),
            };
        }
        return WindowState {
            active: true,
            window_end: end_today,
            next_trigger: plus_day(start_today),
        };
    }

    // Wrapping window (spans midnight)
    if now >= start_today {
        // Today's occurrence runs until tomorrow's end time
        let window_end = plus_day(end_today);
        return WindowState {
            active: now < window_end,
            window_end,
            next_trigger: plus_day(start_today),
        };
    }

    // Before today's start: the relevant occurrence is yesterday's window,
    // which runs until end_today
    WindowState {
        active: now < end_today,
        window_end: end_today,
        next_trigger: start_today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parse_clock_accepts_hh_mm() {
        assert_eq!(parse_clock("start", "23:05"), Some(hm(23, 5)));
        assert_eq!(parse_clock("start", " 06:30 "), Some(hm(6, 30)));
    }

    #[test]
    fn parse_clock_rejects_garbage() {
        assert_eq!(parse_clock("start", ""), None);
        assert_eq!(parse_clock("start", "25:00"), None);
        assert_eq!(parse_clock("start", "7pm"), None);
        assert_eq!(parse_clock("start", "12"), None);
    }

    #[test]
    fn non_wrapping_window_boundaries() {
        let start = hm(22, 0);
        let end = hm(23, 30);

        let before = compute_window(at(21, 59), start, Some(end));
        assert!(!before.active);
        assert_eq!(before.next_trigger, at(22, 0));

        let at_start = compute_window(at(22, 0), start, Some(end));
        assert!(at_start.active, "start boundary is inclusive");
        assert_eq!(at_start.next_trigger, plus_day(at(22, 0)));

        let at_end = compute_window(at(23, 30), start, Some(end));
        assert!(!at_end.active, "end boundary is exclusive");
        assert_eq!(at_end.next_trigger, plus_day(at(22, 0)));
        assert_eq!(at_end.window_end, at(23, 30));
    }

    #[test]
    fn wrapping_window_before_midnight() {
        // start=23:00, end=06:00, now=23:30
        let state = compute_window(at(23, 30), hm(23, 0), Some(hm(6, 0)));
        assert!(state.active);
        assert_eq!(state.next_trigger, plus_day(at(23, 0)));
        assert_eq!(state.window_end, plus_day(at(6, 0)));
    }

    #[test]
    fn wrapping_window_after_midnight() {
        // Early morning tick against yesterday's 23:00 start
        let state = compute_window(at(5, 59), hm(23, 0), Some(hm(6, 0)));
        assert!(state.active);
        assert_eq!(state.window_end, at(6, 0));
        assert_eq!(state.next_trigger, at(23, 0));

        let done = compute_window(at(6, 0), hm(23, 0), Some(hm(6, 0)));
        assert!(!done.active);
        assert_eq!(done.next_trigger, at(23, 0));
    }

    #[test]
    fn wrapping_window_daytime_gap() {
        let state = compute_window(at(12, 0), hm(23, 0), Some(hm(6, 0)));
        assert!(!state.active);
        assert_eq!(state.next_trigger, at(23, 0));
    }

    #[test]
    fn zero_width_window_never_active() {
        let state = compute_window(at(22, 0), hm(22, 0), Some(hm(22, 0)));
        assert!(!state.active);

        let before = compute_window(at(21, 0), hm(22, 0), Some(hm(22, 0)));
        assert!(!before.active);
        assert_eq!(before.next_trigger, at(22, 0));
    }

    #[test]
    fn single_instant_mode() {
        let before = compute_window(at(21, 59), hm(22, 0), None);
        assert!(!before.active);
        assert_eq!(before.next_trigger, at(22, 0));

        let after = compute_window(at(22, 1), hm(22, 0), None);
        assert!(after.active, "active for the rest of the day");
        assert_eq!(after.next_trigger, plus_day(at(22, 0)));
        assert_eq!(after.window_end, plus_day(at(22, 0)));
    }
}
