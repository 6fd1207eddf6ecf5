// Command-line interface definitions for micgate
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "micgate")]
#[command(author, version, about = "Microphone routing and push-to-talk gate")]
#[command(long_about = "
Micgate routes a physical microphone into a virtual bridge output and gates
the signal with a global hotkey (push-to-talk, toggle or hybrid).

Settings edits are applied to the audio backend after a short quiet period,
so rapid changes collapse into a single apply.

USAGE:
  1. List endpoints: micgate devices
  2. Start the daemon: micgate
  3. Type commands on stdin, e.g.:
       input mic-usb
       bridge bridge-out
       capture        (then: press KeyK k ctrl+shift)
  4. Check from elsewhere: micgate status
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override the settings store path
    #[arg(long, value_name = "FILE")]
    pub store: Option<std::path::PathBuf>,

    /// Override the debounce quiet period in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Show daemon status (for status bar integration)
    Status {
        /// Output format: "text" (default) or "json"
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show current configuration
    Config {
        /// Print the default config file template instead
        #[arg(long)]
        default: bool,
    },

    /// List audio endpoints offered by the backend
    Devices,

    /// Build the accelerator string for a key or pointer press
    Accel {
        /// DOM-style physical key code (e.g. KeyK, Digit1, F5)
        #[arg(long, value_name = "CODE")]
        code: Option<String>,

        /// Logical key value (e.g. k, ArrowUp, Enter)
        #[arg(long, value_name = "KEY")]
        key: Option<String>,

        /// Pointer button index (0 = left, 1 = middle, 2 = right, 3 = back, 4 = forward)
        #[arg(long, value_name = "N", conflicts_with_all = ["code", "key"])]
        button: Option<u16>,

        #[arg(long)]
        ctrl: bool,

        #[arg(long)]
        alt: bool,

        #[arg(long)]
        shift: bool,

        /// Super / Meta / Command modifier
        #[arg(long = "super")]
        super_key: bool,
    },
}
