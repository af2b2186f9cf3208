//! Signal handling for slumbr.
//!
//! Termination signals (SIGINT, SIGTERM, SIGHUP) flip the shared `running`
//! flag and wake the polling loop; SIGUSR1 forces an immediate tick without
//! waiting out the poll interval (useful right after editing the settings
//! file). Signals are delivered to the main loop over an mpsc channel so
//! the loop can sleep in `recv_timeout` and still react promptly.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    sync::mpsc::{Receiver, Sender},
    thread,
};

/// Unified signal message type for all signal-based communication
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalMessage {
    /// Shutdown signal (SIGTERM, SIGINT, SIGHUP)
    Shutdown,
    /// Run a tick immediately (SIGUSR1)
    Poke,
}

/// Signal handling state shared between the handler thread and the main loop
pub struct SignalState {
    /// Atomic flag indicating if the application should keep running
    pub running: Arc<AtomicBool>,
    /// Channel receiver for unified signal messages
    pub signal_receiver: Receiver<SignalMessage>,
    /// Channel sender, kept so other components can wake the loop
    pub signal_sender: Sender<SignalMessage>,
}

/// Install the signal handler thread and return the shared state.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = std::sync::mpsc::channel();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1])
        .context("failed to register signal handlers")?;

    let thread_running = running.clone();
    let thread_sender = signal_sender.clone();
    thread::spawn(move || {
        for signal in signals.forever() {
            match signal {
                SIGINT | SIGTERM | SIGHUP => {
                    if debug_enabled {
                        log_pipe!();
                        log_debug!("Received termination signal {}", signal);
                    }
                    thread_running.store(false, Ordering::SeqCst);
                    let _ = thread_sender.send(SignalMessage::Shutdown);
                    break;
                }
                SIGUSR1 => {
                    if debug_enabled {
                        log_pipe!();
                        log_debug!("Received SIGUSR1, forcing an immediate tick");
                    }
                    let _ = thread_sender.send(SignalMessage::Poke);
                }
                _ => {}
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}
