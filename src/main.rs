//! Main application entry point and high-level flow coordination.
//!
//! This binary stays thin: it parses arguments, handles the one-shot
//! `snooze`/`status` subcommands, and otherwise hands control to the
//! [`Slumbr`] coordinator, which owns the lock file, signal handling,
//! and the polling loop.

use std::fs;
use std::io::ErrorKind;

use slumbr::args::{CliAction, ParsedArgs, display_help, display_version};
use slumbr::display::{self, COUNTDOWN_FILE, DEBUG_FILE, SNOOZE_MARKER};
use slumbr::{Slumbr, log_end, log_error, log_indented, log_pipe, log_version, settings};

fn main() {
    let parsed = ParsedArgs::parse(std::env::args().skip(1));

    match parsed.action {
        CliAction::ShowHelp => display_help(),
        CliAction::ShowVersion => display_version(),
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(1);
        }
        CliAction::SnoozeCommand => {
            if let Err(e) = request_snooze() {
                log_error!("Failed to request snooze: {e}");
                std::process::exit(1);
            }
        }
        CliAction::StatusCommand => show_status(),
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => {
            if config_dir.is_some()
                && let Err(e) = settings::set_config_dir(config_dir)
            {
                log_version!();
                log_pipe!();
                log_error!("{e}");
                log_end!();
                std::process::exit(1);
            }
            if let Err(e) = Slumbr::new(debug_enabled).run() {
                log_pipe!();
                log_error!("{e:#}");
                log_end!();
                std::process::exit(1);
            }
        }
    }
}

/// Drop the snooze marker for a running instance to pick up on its next poll.
fn request_snooze() -> std::io::Result<()> {
    let dir = display::runtime_dir();
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(SNOOZE_MARKER), b"")?;
    println!("Snooze requested. It takes effect on the next poll.");
    Ok(())
}

/// Print whatever surfaces a running instance has published.
fn show_status() {
    log_version!();
    let dir = display::runtime_dir();
    let mut printed = false;
    for (label, file) in [("Countdown", COUNTDOWN_FILE), ("Debug", DEBUG_FILE)] {
        match fs::read_to_string(dir.join(file)) {
            Ok(contents) => {
                log_pipe!();
                log_indented!("{label}:");
                for line in contents.lines() {
                    log_indented!("  {line}");
                }
                printed = true;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                log_pipe!();
                log_error!("Failed to read {label} surface: {e}");
                printed = true;
            }
        }
    }
    if !printed {
        log_pipe!();
        log_indented!("No running instance is publishing status right now.");
    }
    log_end!();
}
