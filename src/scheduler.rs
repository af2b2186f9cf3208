//! The smart sleep state machine, evaluated once per polling tick.
//!
//! `SleepScheduler` owns no thread and sets no timer; all work happens
//! synchronously inside `tick()`, driven by the outer polling loop. Each
//! tick it re-reads the settings snapshot, recomputes the daily window,
//! evaluates the persisted snooze deadline, advances the in-memory
//! countdown state, and drives the display and power collaborators.
//!
//! Two ownership tiers of state are kept deliberately separate:
//!
//! - the snooze deadline is durable (settings store) and survives restarts;
//! - the countdown `{deadline, total_seconds, armed_at}` is in-memory only
//!   and lost on restart, so a restart can never resurrect a stale
//!   countdown.
//!
//! A countdown completing at its deadline is detected up to one polling
//! interval late; that latency is an accepted trade-off of the cooperative
//! model, not a bug.

use chrono::{Duration, NaiveDateTime};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::display::{self, DebugReport, SleepDisplay};
use crate::power::PowerControl;
use crate::schedule::{self, WindowState};
use crate::settings::{Settings, SettingsStore};

/// Result of evaluating the persisted snooze deadline against the current
/// window occurrence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnoozeOutcome {
    /// No snooze on record (missing, malformed, or stale-and-cleared).
    None,
    /// Snooze in effect until the given instant; suppress the countdown.
    Active(NaiveDateTime),
    /// Deadline passed this window; cleared, proceed as if never snoozed.
    Expired,
}

/// Which pieces of state a reset should tear down. The in-memory countdown
/// deadline is always cleared.
#[derive(Debug, Default, Clone, Copy)]
struct Teardown {
    clear_snooze: bool,
    close_countdown: bool,
    close_debug: bool,
    clear_arming: bool,
}

/// Stateful scheduler polled by the outer loop.
pub struct SleepScheduler {
    store: SettingsStore,
    display: Box<dyn SleepDisplay>,
    power: Box<dyn PowerControl>,
    countdown_deadline: Option<NaiveDateTime>,
    countdown_total_seconds: Option<i64>,
    countdown_armed_at: Option<NaiveDateTime>,
    next_trigger: Option<NaiveDateTime>,
}

impl SleepScheduler {
    pub fn new(
        store: SettingsStore,
        display: Box<dyn SleepDisplay>,
        power: Box<dyn PowerControl>,
    ) -> Self {
        Self {
            store,
            display,
            power,
            countdown_deadline: None,
            countdown_total_seconds: None,
            countdown_armed_at: None,
            next_trigger: None,
        }
    }

    /// The next instant the window opens, as of the last tick. Hint only.
    pub fn next_trigger(&self) -> Option<NaiveDateTime> {
        self.next_trigger
    }

    /// Evaluate one polling tick.
    ///
    /// `running` is the cooperative abort flag owned by the signal handler;
    /// once it drops, the tick performs teardown instead of evaluation.
    pub fn tick(&mut self, running: &AtomicBool) {
        if !running.load(Ordering::SeqCst) {
            self.close();
            return;
        }

        let settings = self.store.load();
        let debug_mode = settings.debug_mode;
        let enabled = settings.enabled;
        if !enabled && !debug_mode {
            self.reset_state(Teardown {
                clear_snooze: true,
                close_countdown: true,
                close_debug: true,
                clear_arming: true,
            });
            return;
        }

        let start = settings
            .start_time
            .as_deref()
            .and_then(|s| schedule::parse_clock("start", s));
        let end = settings
            .end_time
            .as_deref()
            .and_then(|s| schedule::parse_clock("end", s));
        let now = crate::time_source::now().naive_local();

        // No usable start time: the feature silently disables itself. Debug
        // mode keeps the surfaces up so the misconfiguration is visible.
        let Some(start) = start else {
            self.reset_state(Teardown {
                clear_snooze: true,
                close_countdown: !debug_mode,
                close_debug: !debug_mode,
                clear_arming: true,
            });
            if debug_mode {
                self.display.update_countdown("--:--", 0, 0);
                self.update_debug(
                    now,
                    None,
                    None,
                    None,
                    SnoozeOutcome::None,
                    "invalid schedule",
                    enabled,
                );
            }
            return;
        };

        let window = schedule::compute_window(now, start, end);
        self.next_trigger = Some(window.next_trigger);

        let snooze = self.evaluate_snooze(now, &window);

        let in_window = window.active && enabled;
        let mut reason = "waiting for window";

        if in_window {
            if let SnoozeOutcome::Active(_) = snooze {
                reason = "snoozed";
                if !debug_mode {
                    self.reset_state(Teardown {
                        close_countdown: true,
                        clear_arming: true,
                        ..Teardown::default()
                    });
                    return;
                }
                self.countdown_armed_at = None;
                self.clear_countdown();
            } else {
                if self.countdown_armed_at.is_none() {
                    self.countdown_armed_at = Some(now);
                    log_debug!("Smart sleep countdown delay armed");
                }
                let delay = Duration::seconds(settings.arming_delay_seconds as i64);
                let delay_deadline = self.countdown_armed_at.unwrap_or(now) + delay;
                if settings.arming_delay_seconds > 0 && now < delay_deadline {
                    reason = "arming delay";
                    self.clear_countdown();
                    self.display.close_countdown();
                    if !debug_mode {
                        return;
                    }
                } else {
                    if self.countdown_deadline.is_none() {
                        log_debug!("Smart sleep countdown delay elapsed");
                        self.start_countdown(now, &settings);
                    }
                    self.display.open_countdown();
                    self.update_countdown_surface(now);
                    if self.display.countdown_cancelled() {
                        self.snooze(now, &settings);
                        return;
                    }
                    if let Some(deadline) = self.countdown_deadline
                        && now >= deadline
                    {
                        self.complete_shutdown();
                        return;
                    }
                    reason = "counting down";
                }
            }
        } else {
            reason = if !enabled { "disabled" } else { "waiting for window" };
            if !debug_mode {
                self.reset_state(Teardown {
                    clear_snooze: true,
                    close_countdown: true,
                    clear_arming: true,
                    ..Teardown::default()
                });
                return;
            }
            self.clear_snooze_until();
            self.countdown_armed_at = None;
            self.clear_countdown();
            self.display.update_countdown("--:--", 0, 0);
        }

        if debug_mode {
            self.update_debug(
                now,
                Some(&start.format("%H:%M").to_string()),
                end.map(|e| e.format("%H:%M").to_string()).as_deref(),
                Some(&window),
                snooze,
                reason,
                enabled,
            );
        } else {
            self.display.close_debug();
        }
    }

    /// Final teardown: closes both surfaces and drops in-memory countdown
    /// state without executing the power action. The persisted snooze is
    /// kept; it must survive a restart.
    pub fn close(&mut self) {
        self.reset_state(Teardown {
            close_countdown: true,
            close_debug: true,
            clear_arming: true,
            ..Teardown::default()
        });
    }

    /// Evaluate the persisted snooze deadline against the current window.
    ///
    /// Malformed timestamps self-heal (warn, clear, treat as absent). A
    /// deadline at or past the window end is stale: a snooze must never
    /// leak into the next day's window.
    fn evaluate_snooze(&mut self, now: NaiveDateTime, window: &WindowState) -> SnoozeOutcome {
        let Some(raw) = self.store.snooze_until() else {
            return SnoozeOutcome::None;
        };
        let Some(deadline) = parse_snooze_timestamp(&raw) else {
            log_pipe!();
            log_warning!("Invalid snooze timestamp '{}', clearing", raw);
            self.clear_snooze_until();
            return SnoozeOutcome::None;
        };
        if deadline >= window.window_end {
            self.clear_snooze_until();
            return SnoozeOutcome::None;
        }
        if now < deadline {
            return SnoozeOutcome::Active(deadline);
        }
        self.clear_snooze_until();
        SnoozeOutcome::Expired
    }

    fn start_countdown(&mut self, now: NaiveDateTime, settings: &Settings) {
        let total_seconds = (settings.countdown_minutes.max(1) * 60) as i64;
        self.countdown_total_seconds = Some(total_seconds);
        self.countdown_deadline = Some(now + Duration::seconds(total_seconds));
        log_block_start!(
            "Smart sleep countdown started for {} minutes",
            settings.countdown_minutes
        );
    }

    fn clear_countdown(&mut self) {
        self.countdown_deadline = None;
        self.countdown_total_seconds = None;
    }

    fn update_countdown_surface(&mut self, now: NaiveDateTime) {
        let Some(deadline) = self.countdown_deadline else {
            self.display.update_countdown("--:--", 0, 0);
            return;
        };
        // Deadline without a recorded total breaks an internal invariant;
        // fail safe by dropping the countdown instead of the polling loop
        let Some(total) = self.countdown_total_seconds else {
            log_pipe!();
            log_warning!("Countdown deadline without total; clearing countdown");
            self.clear_countdown();
            self.display.update_countdown("--:--", 0, 0);
            return;
        };
        let remaining = (deadline - now).num_seconds().max(0);
        self.display.update_countdown(
            &display::format_duration(remaining),
            display::percent_complete(total, remaining),
            display::minutes_remaining(remaining),
        );
    }

    /// User cancel during counting: persist a fresh snooze deadline and
    /// return to idle, leaving the deadline as the only durable trace.
    fn snooze(&mut self, now: NaiveDateTime, settings: &Settings) {
        let until = now + Duration::minutes(settings.snooze_minutes.max(1) as i64);
        if let Err(e) = self
            .store
            .set_snooze_until(&until.format(SNOOZE_TIMESTAMP_FORMAT).to_string())
        {
            log_pipe!();
            log_warning!("Failed to persist snooze deadline: {}", e);
        }
        log_block_start!("Smart sleep snoozed until {}", until.format("%H:%M:%S"));
        self.reset_state(Teardown {
            close_countdown: true,
            clear_arming: true,
            ..Teardown::default()
        });
    }

    /// Terminal action of a countdown cycle: reset everything first, then
    /// walk the best-effort power chain. State is reset regardless of
    /// whether the power actions succeed, avoiding a retry storm on every
    /// subsequent tick. No error escapes this call.
    fn complete_shutdown(&mut self) {
        self.reset_state(Teardown {
            clear_snooze: true,
            close_countdown: true,
            close_debug: true,
            clear_arming: true,
        });
        log_block_start!("Smart sleep countdown completed, powering down");
        if let Err(e) = self.power.standby() {
            log_warning!("Display standby failed: {}", e);
        }
        if let Err(e) = self.power.power_off() {
            log_warning!("Power-off failed, trying shutdown fallback: {}", e);
            if let Err(e) = self.power.shutdown() {
                log_warning!("Shutdown fallback failed: {}", e);
            }
        }
    }

    fn clear_snooze_until(&mut self) {
        if let Err(e) = self.store.clear_snooze_until() {
            log_pipe!();
            log_warning!("Failed to clear snooze deadline: {}", e);
        }
    }

    fn reset_state(&mut self, teardown: Teardown) {
        if teardown.clear_snooze {
            self.clear_snooze_until();
        }
        if teardown.close_countdown {
            self.display.close_countdown();
        }
        if teardown.close_debug {
            self.display.close_debug();
        }
        if teardown.clear_arming {
            self.countdown_armed_at = None;
        }
        self.clear_countdown();
    }

    #[allow(clippy::too_many_arguments)]
    fn update_debug(
        &mut self,
        now: NaiveDateTime,
        start: Option<&str>,
        end: Option<&str>,
        window: Option<&WindowState>,
        snooze: SnoozeOutcome,
        reason: &str,
        enabled: bool,
    ) {
        let countdown_remaining = match self.countdown_deadline {
            Some(deadline) => display::format_duration((deadline - now).num_seconds()),
            None => "--:--".to_string(),
        };
        let snooze_remaining = match snooze {
            SnoozeOutcome::Active(until) if now < until => {
                display::format_duration((until - now).num_seconds())
            }
            _ => "--".to_string(),
        };
        let report = DebugReport {
            active: enabled && window.is_some_and(|w| w.active),
            current_time: now.format("%H:%M:%S").to_string(),
            start_time: start.unwrap_or("--").to_string(),
            end_time: end.unwrap_or("--").to_string(),
            countdown_remaining,
            snooze_remaining,
            next_trigger: window
                .map(|w| w.next_trigger.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "--".to_string()),
            reason: reason.to_string(),
        };
        self.display.update_debug(&report);
    }
}

/// On-disk snooze timestamp format (ISO-8601, local wall clock).
pub const SNOOZE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a persisted snooze timestamp. Accepts the native naive local
/// format and RFC 3339 strings carried over from other writers.
pub fn parse_snooze_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, SNOOZE_TIMESTAMP_FORMAT) {
        return Some(naive);
    }
    chrono::DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Local).naive_local())
}
