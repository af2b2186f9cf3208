//! Command-line argument parsing and processing.
//!
//! This module handles parsing of command-line arguments and provides a
//! clean interface for the main application logic. It supports the standard
//! help, version, and debug flags, a config-directory override, and the
//! `snooze`/`status` subcommands, while gracefully handling unknown options.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon with these settings
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Defer a running countdown (creates the snooze marker)
    SnoozeCommand,
    /// Print the countdown and debug surfaces of a running instance
    StatusCommand,
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// # Arguments
    /// * `args` - Iterator over command-line arguments (without the program
    ///   name, typically `std::env::args().skip(1)`)
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut config_dir: Option<String> = None;
        let mut subcommand: Option<String> = None;
        let mut parse_error = false;

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_ref() {
                "-h" | "--help" => return ParsedArgs { action: CliAction::ShowHelp },
                "-V" | "--version" => {
                    return ParsedArgs {
                        action: CliAction::ShowVersion,
                    };
                }
                "-d" | "--debug" => debug_enabled = true,
                "-c" | "--config" => match iter.next() {
                    Some(dir) => config_dir = Some(dir.as_ref().to_string()),
                    None => parse_error = true,
                },
                "snooze" | "status" if subcommand.is_none() => {
                    subcommand = Some(arg.as_ref().to_string());
                }
                _ => parse_error = true,
            }
        }

        if parse_error {
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }

        let action = match subcommand.as_deref() {
            Some("snooze") => CliAction::SnoozeCommand,
            Some("status") => CliAction::StatusCommand,
            _ => CliAction::Run {
                debug_enabled,
                config_dir,
            },
        };
        ParsedArgs { action }
    }
}

/// Display help information for the application.
pub fn display_help() {
    log_version!();
    println!("Smart sleep scheduler: powers the box down inside a daily window.");
    println!();
    println!("Usage: slumbr [OPTIONS] [COMMAND]");
    println!();
    println!("Commands:");
    println!("  snooze              Defer the running countdown by the configured snooze");
    println!("  status              Print the countdown/debug surfaces of a running instance");
    println!();
    println!("Options:");
    println!("  -d, --debug         Enable debug logging");
    println!("  -c, --config <DIR>  Use an alternate configuration directory");
    println!("  -h, --help          Print help");
    println!("  -V, --version       Print version");
    log_end!();
}

/// Display version information.
pub fn display_version() {
    log_version!();
    println!("slumbr {}", env!("CARGO_PKG_VERSION"));
    log_end!();
}
