//! Power-control collaborator.
//!
//! Three independent best-effort commands sit behind the `PowerControl`
//! trait: display standby, primary power-off, and a shutdown fallback. Each
//! may fail on its own; sequencing and failure policy live in the
//! scheduler, which never lets a power failure escape the tick.

use anyhow::{Result, anyhow};
use std::process::Command;

#[cfg(test)]
use mockall::automock;

/// Best-effort power primitives. Every call is independently fallible.
#[cfg_attr(test, automock)]
pub trait PowerControl {
    /// Put a connected display into standby (e.g. CEC). Optional.
    fn standby(&mut self) -> Result<()>;
    /// Primary power-down of the machine.
    fn power_off(&mut self) -> Result<()>;
    /// Secondary shutdown fallback when power-down fails.
    fn shutdown(&mut self) -> Result<()>;
}

/// Shell-command implementation of `PowerControl`.
///
/// Commands come from the settings file so deployments can map them onto
/// whatever init system or CEC tooling the box has.
pub struct SystemPower {
    standby_command: Option<String>,
    power_off_command: String,
    shutdown_command: String,
}

impl SystemPower {
    pub fn new(
        standby_command: Option<String>,
        power_off_command: String,
        shutdown_command: String,
    ) -> Self {
        Self {
            standby_command,
            power_off_command,
            shutdown_command,
        }
    }

    fn run(command: &str) -> Result<()> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .map_err(|e| anyhow!("failed to spawn '{command}': {e}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("'{command}' exited with {status}"))
        }
    }
}

impl PowerControl for SystemPower {
    fn standby(&mut self) -> Result<()> {
        match &self.standby_command {
            Some(command) => Self::run(command),
            // No standby command configured; nothing to do
            None => Ok(()),
        }
    }

    fn power_off(&mut self) -> Result<()> {
        Self::run(&self.power_off_command)
    }

    fn shutdown(&mut self) -> Result<()> {
        Self::run(&self.shutdown_command)
    }
}
