//! End-to-end scheduler tests against the real file-backed surfaces.
//!
//! These drive `SleepScheduler` with a frozen clock, a real `SettingsStore`
//! and `RuntimeDisplay` rooted in temp directories, and a recording
//! `PowerControl`, exercising the same wiring the daemon runs with.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serial_test::serial;
use slumbr::display::{COUNTDOWN_FILE, RuntimeDisplay, SNOOZE_MARKER};
use slumbr::power::PowerControl;
use slumbr::scheduler::{SleepScheduler, parse_snooze_timestamp};
use slumbr::settings::SettingsStore;
use slumbr::time_source;
use tempfile::TempDir;

static RUNNING: AtomicBool = AtomicBool::new(true);

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 14)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

/// Counts invocations of each power primitive; `fail_power_off` simulates
/// a refused primary power-down.
#[derive(Default)]
struct RecordingPower {
    standby_calls: Arc<AtomicUsize>,
    power_off_calls: Arc<AtomicUsize>,
    shutdown_calls: Arc<AtomicUsize>,
    fail_power_off: bool,
}

impl RecordingPower {
    fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (
            Arc::clone(&self.standby_calls),
            Arc::clone(&self.power_off_calls),
            Arc::clone(&self.shutdown_calls),
        )
    }
}

impl PowerControl for RecordingPower {
    fn standby(&mut self) -> Result<()> {
        self.standby_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn power_off(&mut self) -> Result<()> {
        self.power_off_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_power_off {
            Err(anyhow!("power-off refused"))
        } else {
            Ok(())
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    scheduler: SleepScheduler,
    store: SettingsStore,
    _config_dir: TempDir,
    runtime_dir: TempDir,
}

fn harness(settings_body: &str, fail_power_off: bool) -> (Harness, (Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicUsize>)) {
    slumbr::logger::Log::set_enabled(false);

    let config_dir = TempDir::new().unwrap();
    let store = SettingsStore::open_at(config_dir.path().to_path_buf()).unwrap();
    fs::write(store.settings_path(), settings_body).unwrap();

    let runtime_dir = TempDir::new().unwrap();
    let display = RuntimeDisplay::at(runtime_dir.path().to_path_buf());

    let power = RecordingPower {
        fail_power_off,
        ..RecordingPower::default()
    };
    let counters = power.counters();

    let scheduler = SleepScheduler::new(store.clone(), Box::new(display), Box::new(power));
    (
        Harness {
            scheduler,
            store,
            _config_dir: config_dir,
            runtime_dir,
        },
        counters,
    )
}

const ACTIVE_WINDOW: &str = "\
enabled = true
start_time = \"22:00\"
end_time = \"02:00\"
countdown_minutes = 10
snooze_minutes = 15
arming_delay_seconds = 0
";

#[test]
#[serial]
fn countdown_publishes_the_surface_file() {
    let clock = time_source::frozen();
    clock.set_naive(at(22, 30, 0));

    let (mut h, _) = harness(ACTIVE_WINDOW, false);
    h.scheduler.tick(&RUNNING);

    let countdown = h.runtime_dir.path().join(COUNTDOWN_FILE);
    let content = fs::read_to_string(&countdown).unwrap();
    assert!(content.starts_with("10:00"), "got: {content}");

    clock.set_naive(at(22, 33, 0));
    h.scheduler.tick(&RUNNING);
    let content = fs::read_to_string(&countdown).unwrap();
    assert!(content.starts_with("07:00"), "got: {content}");
    assert!(content.contains("30%"), "got: {content}");
    assert!(content.contains("7 min left"), "got: {content}");
}

#[test]
#[serial]
fn huge_configured_durations_count_down_instead_of_firing() {
    let clock = time_source::frozen();
    clock.set_naive(at(22, 30, 0));

    // Parseable but absurd values must behave like a capped countdown, not
    // wrap into a past deadline and power off on the first tick
    let (mut h, (_, power_off, _)) = harness(
        "enabled = true\n\
         start_time = \"22:00\"\n\
         end_time = \"02:00\"\n\
         countdown_minutes = 9223372036854775807\n\
         snooze_minutes = 9223372036854775807\n\
         arming_delay_seconds = 0\n",
        false,
    );
    h.scheduler.tick(&RUNNING);

    assert_eq!(power_off.load(Ordering::SeqCst), 0, "no immediate power-off");
    let content = fs::read_to_string(h.runtime_dir.path().join(COUNTDOWN_FILE)).unwrap();
    assert!(content.starts_with("24:00:00"), "got: {content}");

    clock.set_naive(at(22, 30, 30));
    h.scheduler.tick(&RUNNING);
    assert_eq!(power_off.load(Ordering::SeqCst), 0);
}

#[test]
#[serial]
fn marker_file_cancels_into_a_persisted_snooze() {
    let clock = time_source::frozen();
    clock.set_naive(at(22, 30, 0));

    let (mut h, counters) = harness(ACTIVE_WINDOW, false);
    h.scheduler.tick(&RUNNING);
    assert!(h.runtime_dir.path().join(COUNTDOWN_FILE).exists());

    // The snooze subcommand drops this marker; the next tick consumes it
    fs::write(h.runtime_dir.path().join(SNOOZE_MARKER), "").unwrap();
    clock.set_naive(at(22, 30, 30));
    h.scheduler.tick(&RUNNING);

    assert!(
        !h.runtime_dir.path().join(COUNTDOWN_FILE).exists(),
        "countdown surface torn down on cancel"
    );
    let persisted = h.store.snooze_until().expect("snooze persisted");
    assert_eq!(parse_snooze_timestamp(&persisted), Some(at(22, 45, 30)));
    assert_eq!(counters.1.load(Ordering::SeqCst), 0, "no power action");

    // While the snooze holds, ticks stay quiet
    clock.set_naive(at(22, 40, 0));
    h.scheduler.tick(&RUNNING);
    assert!(!h.runtime_dir.path().join(COUNTDOWN_FILE).exists());
    assert!(h.store.snooze_until().is_some());
}

#[test]
#[serial]
fn completion_runs_the_power_chain_and_clears_everything() {
    let clock = time_source::frozen();
    clock.set_naive(at(22, 30, 0));

    let (mut h, (standby, power_off, shutdown)) = harness(ACTIVE_WINDOW, false);
    h.scheduler.tick(&RUNNING);

    clock.set_naive(at(22, 40, 1));
    h.scheduler.tick(&RUNNING);

    assert_eq!(standby.load(Ordering::SeqCst), 1);
    assert_eq!(power_off.load(Ordering::SeqCst), 1);
    assert_eq!(shutdown.load(Ordering::SeqCst), 0);
    assert!(
        !h.runtime_dir.path().join(COUNTDOWN_FILE).exists(),
        "surfaces cleared before the power chain runs"
    );
    assert_eq!(h.store.snooze_until(), None);
}

#[test]
#[serial]
fn refused_power_off_falls_back_to_shutdown() {
    let clock = time_source::frozen();
    clock.set_naive(at(22, 30, 0));

    let (mut h, (_, power_off, shutdown)) = harness(ACTIVE_WINDOW, true);
    h.scheduler.tick(&RUNNING);
    clock.set_naive(at(22, 40, 1));
    h.scheduler.tick(&RUNNING);

    assert_eq!(power_off.load(Ordering::SeqCst), 1);
    assert_eq!(shutdown.load(Ordering::SeqCst), 1, "fallback invoked");
}

#[test]
#[serial]
fn snooze_survives_a_restart() {
    let clock = time_source::frozen();
    clock.set_naive(at(22, 30, 0));

    let (mut h, _) = harness(ACTIVE_WINDOW, false);
    h.scheduler.tick(&RUNNING);
    fs::write(h.runtime_dir.path().join(SNOOZE_MARKER), "").unwrap();
    h.scheduler.tick(&RUNNING);
    let persisted = h.store.snooze_until().expect("snooze persisted");

    // A fresh scheduler over the same store (a restart) honors the deadline
    let display = RuntimeDisplay::at(h.runtime_dir.path().to_path_buf());
    let mut restarted = SleepScheduler::new(
        h.store.clone(),
        Box::new(display),
        Box::new(RecordingPower::default()),
    );
    clock.set_naive(at(22, 35, 0));
    restarted.tick(&RUNNING);
    assert_eq!(h.store.snooze_until(), Some(persisted));
    assert!(!h.runtime_dir.path().join(COUNTDOWN_FILE).exists());
}
