//! Settings store for slumbr.
//!
//! Two tiers of persistence live side by side in the config directory:
//!
//! - `slumbr.toml` — user-owned schedule settings, re-read on every tick so
//!   edits take effect without a reload mechanism. Malformed files degrade
//!   to a disabled schedule with a warning; the polling loop never dies over
//!   configuration.
//! - `state.toml` — daemon-owned durable state, currently just the snooze
//!   deadline (ISO-8601 local timestamp, absent/empty = no snooze). Written
//!   atomically via a sibling temp file and rename. Countdown state is
//!   deliberately *not* persisted here: a restart must never resurrect a
//!   stale countdown.
//!
//! The default configuration file is generated with a commented template
//! when missing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const DEFAULT_COUNTDOWN_MINUTES: u64 = 10;
pub const MAX_COUNTDOWN_MINUTES: u64 = 24 * 60;
pub const DEFAULT_SNOOZE_MINUTES: u64 = 15;
pub const MAX_SNOOZE_MINUTES: u64 = 24 * 60;
pub const DEFAULT_ARMING_DELAY_SECS: u64 = 10;
pub const MAX_ARMING_DELAY_SECS: u64 = 3600;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;
pub const MAX_POLL_INTERVAL_SECS: u64 = 300;

pub const DEFAULT_POWER_OFF_COMMAND: &str = "systemctl poweroff";
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "shutdown -h now";

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the custom configuration directory if one was set.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Raw on-disk shape of `slumbr.toml`. Every field is optional; resolution
/// into a `Settings` snapshot applies defaults and floors.
#[derive(Debug, Deserialize, Default)]
struct RawSettings {
    enabled: Option<bool>,
    start_time: Option<String>,
    end_time: Option<String>,
    countdown_minutes: Option<u64>,
    snooze_minutes: Option<u64>,
    arming_delay_seconds: Option<u64>,
    poll_interval: Option<u64>,
    debug_mode: Option<bool>,
    standby_command: Option<String>,
    power_off_command: Option<String>,
    shutdown_command: Option<String>,
}

/// Resolved settings snapshot for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub enabled: bool,
    /// `"HH:MM"`, parsed per tick by the scheduler. Absent disables the schedule.
    pub start_time: Option<String>,
    /// `"HH:MM"`, optional. Absent selects single-instant mode.
    pub end_time: Option<String>,
    /// Countdown length in minutes, clamped 1 to a full day.
    pub countdown_minutes: u64,
    /// Snooze length in minutes, clamped 1 to a full day.
    pub snooze_minutes: u64,
    /// Grace period before the visible countdown starts, capped at an
    /// hour. 0 disables arming.
    pub arming_delay_seconds: u64,
    /// Polling cadence of the outer loop in seconds, clamped 5-300.
    pub poll_interval: u64,
    pub debug_mode: bool,
    pub standby_command: Option<String>,
    pub power_off_command: String,
    pub shutdown_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        RawSettings::default().resolve()
    }
}

impl RawSettings {
    fn resolve(self) -> Settings {
        Settings {
            enabled: self.enabled.unwrap_or(false),
            start_time: self.start_time.filter(|s| !s.trim().is_empty()),
            end_time: self.end_time.filter(|s| !s.trim().is_empty()),
            // Clamped so downstream second arithmetic can never overflow
            countdown_minutes: self
                .countdown_minutes
                .unwrap_or(DEFAULT_COUNTDOWN_MINUTES)
                .clamp(1, MAX_COUNTDOWN_MINUTES),
            snooze_minutes: self
                .snooze_minutes
                .unwrap_or(DEFAULT_SNOOZE_MINUTES)
                .clamp(1, MAX_SNOOZE_MINUTES),
            arming_delay_seconds: self
                .arming_delay_seconds
                .unwrap_or(DEFAULT_ARMING_DELAY_SECS)
                .min(MAX_ARMING_DELAY_SECS),
            poll_interval: self
                .poll_interval
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                .clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS),
            debug_mode: self.debug_mode.unwrap_or(false),
            standby_command: self.standby_command.filter(|s| !s.trim().is_empty()),
            power_off_command: self
                .power_off_command
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_POWER_OFF_COMMAND.to_string()),
            shutdown_command: self
                .shutdown_command
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SHUTDOWN_COMMAND.to_string()),
        }
    }
}

/// Durable daemon-owned state, separate from user settings.
#[derive(Debug, Deserialize, Default)]
struct StateFile {
    snooze_until: Option<String>,
}

/// Handle to the settings and state files in one config directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    /// Open the store in the default (or overridden) config directory,
    /// creating the directory and a default `slumbr.toml` when missing.
    pub fn open() -> Result<Self> {
        let dir = match get_custom_config_dir() {
            Some(dir) => dir,
            None => dirs::config_dir()
                .context("Could not determine config directory")?
                .join("slumbr"),
        };
        Self::open_at(dir)
    }

    /// Open the store rooted at an explicit directory.
    pub fn open_at(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        let store = Self { dir };
        if !store.settings_path().exists() {
            store.write_default_settings()?;
            log_block_start!("Created default configuration");
            log_indented!("{}", store.settings_path().display());
        }
        Ok(store)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join("slumbr.toml")
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join("state.toml")
    }

    /// Read the current settings snapshot. Malformed files disable the
    /// schedule rather than crash the tick.
    pub fn load(&self) -> Settings {
        let path = self.settings_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to read {}: {}", path.display(), e);
                return Settings::default();
            }
        };
        match toml::from_str::<RawSettings>(&content) {
            Ok(raw) => raw.resolve(),
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse {}: {}", path.display(), e);
                log_indented!("Smart sleep is disabled until the file parses");
                Settings::default()
            }
        }
    }

    /// Read the persisted snooze deadline string, if any.
    pub fn snooze_until(&self) -> Option<String> {
        let content = fs::read_to_string(self.state_path()).ok()?;
        match toml::from_str::<StateFile>(&content) {
            Ok(state) => state.snooze_until.filter(|s| !s.is_empty()),
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse state file: {}", e);
                None
            }
        }
    }

    /// Persist a snooze deadline with a single atomic replace.
    pub fn set_snooze_until(&self, deadline: &str) -> Result<()> {
        self.write_state(&format!("snooze_until = {:?}\n", deadline))
    }

    /// Clear the persisted snooze deadline.
    pub fn clear_snooze_until(&self) -> Result<()> {
        if self.state_path().exists() {
            self.write_state("snooze_until = \"\"\n")?;
        }
        Ok(())
    }

    fn write_state(&self, content: &str) -> Result<()> {
        let path = self.state_path();
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn write_default_settings(&self) -> Result<()> {
        let template = format!(
            "\
#[Smart sleep schedule]
enabled = false            # Master switch for the nightly power-off
start_time = \"23:00\"       # Daily window start (HH:MM, local time)
end_time = \"06:00\"         # Daily window end (HH:MM). Remove for single-instant mode
countdown_minutes = {DEFAULT_COUNTDOWN_MINUTES}      # Visible countdown before power-off (>= 1)
snooze_minutes = {DEFAULT_SNOOZE_MINUTES}         # Deferral applied when the countdown is cancelled (>= 1)
arming_delay_seconds = {DEFAULT_ARMING_DELAY_SECS}   # Grace period before the countdown starts (0 = none)
poll_interval = {DEFAULT_POLL_INTERVAL_SECS}         # Seconds between scheduler ticks ({MIN_POLL_INTERVAL_SECS}-{MAX_POLL_INTERVAL_SECS})
debug_mode = false         # Keep diagnostic surfaces visible outside the window

#[Power commands]
#standby_command = \"cec-ctl --to 0 --standby\"  # Optional display standby, tried first
#power_off_command = \"{DEFAULT_POWER_OFF_COMMAND}\"
#shutdown_command = \"{DEFAULT_SHUTDOWN_COMMAND}\"   # Fallback when power-off fails
"
        );
        fs::write(self.settings_path(), template)
            .with_context(|| format!("Failed to write {}", self.settings_path().display()))
    }
}

impl Settings {
    /// Log the loaded schedule at startup.
    pub fn log_settings(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Enabled: {}", if self.enabled { "yes" } else { "no" });
        match (&self.start_time, &self.end_time) {
            (Some(start), Some(end)) => log_indented!("Window: {} - {}", start, end),
            (Some(start), None) => log_indented!("Trigger: {} (single-instant)", start),
            (None, _) => log_indented!("Window: not configured"),
        }
        log_indented!("Countdown: {} minutes", self.countdown_minutes);
        log_indented!("Snooze: {} minutes", self.snooze_minutes);
        if self.arming_delay_seconds > 0 {
            log_indented!("Arming delay: {} seconds", self.arming_delay_seconds);
        }
        log_indented!("Poll interval: {} seconds", self.poll_interval);
        if self.debug_mode {
            log_indented!("Debug mode: on");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(content: &str) -> (TempDir, SettingsStore) {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open_at(dir.path().to_path_buf()).unwrap();
        fs::write(store.settings_path(), content).unwrap();
        (dir, store)
    }

    #[test]
    fn default_template_is_created_and_parses() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open_at(dir.path().to_path_buf()).unwrap();
        let settings = store.load();
        assert!(!settings.enabled);
        assert_eq!(settings.start_time.as_deref(), Some("23:00"));
        assert_eq!(settings.end_time.as_deref(), Some("06:00"));
        assert_eq!(settings.countdown_minutes, DEFAULT_COUNTDOWN_MINUTES);
    }

    #[test]
    fn floors_and_clamps_apply() {
        let (_dir, store) = store_with(
            "enabled = true\nstart_time = \"22:00\"\ncountdown_minutes = 0\nsnooze_minutes = 0\npoll_interval = 1\n",
        );
        let settings = store.load();
        assert_eq!(settings.countdown_minutes, 1);
        assert_eq!(settings.snooze_minutes, 1);
        assert_eq!(settings.poll_interval, MIN_POLL_INTERVAL_SECS);
        assert_eq!(settings.end_time, None);
    }

    #[test]
    fn absurd_durations_are_capped() {
        // u64::MAX here would overflow second arithmetic downstream if it
        // survived resolution
        let (_dir, store) = store_with(
            "enabled = true\nstart_time = \"22:00\"\n\
             countdown_minutes = 9223372036854775807\n\
             snooze_minutes = 9223372036854775807\n\
             arming_delay_seconds = 99999999\n",
        );
        let settings = store.load();
        assert_eq!(settings.countdown_minutes, MAX_COUNTDOWN_MINUTES);
        assert_eq!(settings.snooze_minutes, MAX_SNOOZE_MINUTES);
        assert_eq!(settings.arming_delay_seconds, MAX_ARMING_DELAY_SECS);
    }

    #[test]
    fn malformed_file_disables_schedule() {
        let (_dir, store) = store_with("enabled = \"definitely\"\n");
        let settings = store.load();
        assert!(!settings.enabled);
    }

    #[test]
    fn snooze_roundtrip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open_at(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.snooze_until(), None);

        store.set_snooze_until("2025-06-14T23:45:00").unwrap();
        assert_eq!(store.snooze_until().as_deref(), Some("2025-06-14T23:45:00"));

        store.clear_snooze_until().unwrap();
        assert_eq!(store.snooze_until(), None);
    }
}
