//! Core polling loop.
//!
//! The loop owns no timing logic of its own beyond cadence: it sleeps on
//! the signal channel for the configured poll interval, runs one scheduler
//! tick per wake, and tears the scheduler down on shutdown without
//! executing the power action. All scheduling decisions live in
//! `SleepScheduler::tick`.

use anyhow::Result;
use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::scheduler::SleepScheduler;
use crate::settings::SettingsStore;
use crate::signals::{SignalMessage, SignalState};

/// Parameters for creating a Core instance.
pub(crate) struct CoreParams {
    pub scheduler: SleepScheduler,
    pub store: SettingsStore,
    pub signal_state: SignalState,
    pub debug_enabled: bool,
}

/// Runs the polling loop around the scheduler.
pub(crate) struct Core {
    scheduler: SleepScheduler,
    store: SettingsStore,
    signal_state: SignalState,
    debug_enabled: bool,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        Self {
            scheduler: params.scheduler,
            store: params.store,
            signal_state: params.signal_state,
            debug_enabled: params.debug_enabled,
        }
    }

    /// Execute the polling loop until a shutdown signal arrives, then
    /// perform the final teardown tick.
    pub fn execute(mut self) -> Result<()> {
        log_block_start!("Entering scheduling loop");

        while self.signal_state.running.load(Ordering::SeqCst) {
            self.scheduler.tick(&self.signal_state.running);

            if self.debug_enabled
                && let Some(next) = self.scheduler.next_trigger()
            {
                log_debug!("Next window trigger: {}", next.format("%Y-%m-%d %H:%M"));
            }

            // Poll interval is re-read each cycle so edits take effect
            // without a restart
            let poll_interval = Duration::from_secs(self.store.load().poll_interval);

            match self.signal_state.signal_receiver.recv_timeout(poll_interval) {
                Ok(SignalMessage::Shutdown) => break,
                Ok(SignalMessage::Poke) => {
                    // Loop around immediately for a fresh tick
                }
                Err(RecvTimeoutError::Timeout) => {
                    // Normal cadence - next tick
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if self.signal_state.running.load(Ordering::SeqCst) {
                        log_pipe!();
                        log_error!("Signal handler disconnected unexpectedly");
                        log_indented!("Signals will no longer be processed");
                    }
                    break;
                }
            }
        }

        // Final close: teardown without the power action
        log_block_start!("Shutting down slumbr...");
        self.scheduler.close();

        Ok(())
    }
}
