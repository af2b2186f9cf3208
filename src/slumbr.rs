//! Application coordinator that manages the complete lifecycle of slumbr.
//!
//! This module handles resource acquisition, initialization, and
//! orchestration of the core polling loop:
//! - Settings store opening (with default template creation)
//! - Lock file management for single-instance enforcement
//! - Signal handler setup
//! - Collaborator construction (display and power control)
//!
//! The `Slumbr` struct uses a builder pattern so different startup contexts
//! can opt out of parts of that setup (tests skip the lock, for example).

use anyhow::Result;

use crate::{
    core::{Core, CoreParams},
    display::RuntimeDisplay,
    lock,
    power::SystemPower,
    scheduler::SleepScheduler,
    settings::SettingsStore,
    signals::setup_signal_handler,
};

/// Builder for configuring and running the slumbr daemon.
pub struct Slumbr {
    debug_enabled: bool,
    create_lock: bool,
    show_headers: bool,
}

impl Slumbr {
    /// Create a new runner with defaults matching a normal run
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            show_headers: true,
        }
    }

    /// Skip lock file creation (tests and simulations)
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip the version header (when embedding in another flow)
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Execute the daemon with the configured settings.
    ///
    /// Handles the complete lifecycle: settings store, lock file, signal
    /// handlers, collaborator construction, the polling loop, and cleanup.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
        }

        let store = match SettingsStore::open() {
            Ok(store) => store,
            Err(e) => {
                log_error_exit!("Configuration failed");
                eprintln!("{e:?}");
                std::process::exit(1);
            }
        };

        let lock_info = if self.create_lock {
            match lock::acquire_lock()? {
                Some(info) => Some(info),
                None => {
                    // Another live instance holds the lock; already reported
                    log_end!();
                    return Ok(());
                }
            }
        } else {
            None
        };

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        let settings = store.load();
        settings.log_settings();

        let power = SystemPower::new(
            settings.standby_command.clone(),
            settings.power_off_command.clone(),
            settings.shutdown_command.clone(),
        );
        let scheduler = SleepScheduler::new(
            store.clone(),
            Box::new(RuntimeDisplay::new()),
            Box::new(power),
        );

        let core = Core::new(CoreParams {
            scheduler,
            store,
            signal_state,
            debug_enabled: self.debug_enabled,
        });
        core.execute()?;

        if let Some((lock_file, lock_path)) = lock_info {
            lock::release_lock(lock_file, &lock_path);
        }
        log_end!();

        Ok(())
    }
}
