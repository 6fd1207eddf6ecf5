//! Micgate - hotkey-gated microphone routing
//!
//! Run with `micgate` or `micgate daemon` to start the daemon.
//! Use `micgate status` to inspect a running daemon.
//! Use `micgate accel` to see how a key or button press is normalized.

use clap::Parser;
use micgate::accelerator::{self, KeyPress, Modifiers, PointerPress};
use micgate::cli::{Cli, Commands};
use micgate::config::{self, Config};
use micgate::daemon::{self, Daemon};
use micgate::status::{DeviceDirection, DeviceList};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("micgate={},warn", log_level))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(store) = cli.store {
        config.backend.store = store.to_string_lossy().into_owned();
    }
    if let Some(ms) = cli.debounce_ms {
        config.engine.debounce_ms = ms;
    }

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }

        Commands::Status { format } => {
            run_status(&config, &format)?;
        }

        Commands::Config { default } => {
            if default {
                print!("{}", config::DEFAULT_CONFIG);
            } else {
                show_config(&config)?;
            }
        }

        Commands::Devices => {
            show_devices(&config);
        }

        Commands::Accel {
            code,
            key,
            button,
            ctrl,
            alt,
            shift,
            super_key,
        } => {
            let modifiers = Modifiers {
                ctrl,
                alt,
                shift,
                super_key,
            };
            run_accel(modifiers, code, key, button)?;
        }
    }

    Ok(())
}

/// Run the status command - show current daemon state
fn run_status(config: &Config, format: &str) -> anyhow::Result<()> {
    let Some(state_path) = config.resolve_state_file() else {
        eprintln!("Error: state_file is not configured.");
        eprintln!();
        eprintln!("To enable status monitoring, add to your config.toml:");
        eprintln!();
        eprintln!("  state_file = \"auto\"");
        std::process::exit(1);
    };

    let state = daemon::read_state_file(&state_path);

    match (format, state) {
        ("json", Some(state)) => println!("{}", serde_json::to_string(&state)?),
        ("json", None) => println!(r#"{{"stopped": true}}"#),
        (_, Some(state)) => println!("{}", state.summary()),
        (_, None) => println!("stopped"),
    }

    Ok(())
}

/// Show current configuration
fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Current Configuration\n");
    println!("=====================\n");

    println!("[engine]");
    println!("  debounce_ms = {}", config.engine.debounce_ms);
    println!("  poll_interval_ms = {}", config.engine.poll_interval_ms);
    println!("  click_guard_ms = {}", config.engine.click_guard_ms);
    match config.engine.call_timeout_ms {
        Some(ms) => println!("  call_timeout_ms = {}", ms),
        None => println!("  call_timeout_ms = (none)"),
    }

    let store = config.backend.resolve_store();
    println!("\n[backend]");
    println!("  store = {:?}", config.backend.store);
    println!("  (resolves to: {:?})", store);
    println!("  devices = {}", config.backend.devices.len());

    println!("\n[notification]");
    println!("  on_save_failure = {}", config.notification.on_save_failure);

    if let Some(ref state_file) = config.state_file {
        println!("\n[integration]");
        println!("  state_file = {:?}", state_file);
        if let Some(resolved) = config.resolve_state_file() {
            println!("  (resolves to: {:?})", resolved);
        }
    }

    let settings = config::load_app_config(&store)?;
    println!("\n[settings]");
    println!("  input_device_id = {:?}", settings.route.input_device_id);
    println!(
        "  bridge_output_device_id = {:?}",
        settings.route.bridge_output_device_id
    );
    println!("  hotkey = {}", settings.hotkey.accelerator);
    println!("  mode = {:?}", settings.hotkey.mode);
    println!("  launch_on_startup = {}", settings.launch_on_startup);
    println!("  minimize_to_tray = {}", settings.minimize_to_tray);

    println!("\n---");
    println!(
        "Config file: {:?}",
        Config::default_path().unwrap_or_else(|| PathBuf::from("(not found)"))
    );

    Ok(())
}

/// List configured audio endpoints
fn show_devices(config: &Config) {
    let devices = DeviceList::from_devices(config.backend.devices.clone());
    if devices.inputs.is_empty() && devices.outputs.is_empty() {
        println!("No audio endpoints configured. Add [[backend.devices]] entries to config.toml");
        println!("(see `micgate config --default`).");
        return;
    }

    for (title, list) in [("Inputs", &devices.inputs), ("Outputs", &devices.outputs)] {
        println!("{}:", title);
        for device in list {
            let mut tags = Vec::new();
            if device.is_default {
                tags.push("default");
            }
            if device.direction == DeviceDirection::Output && device.is_virtual_candidate {
                tags.push("bridge");
            }
            let tags = if tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", tags.join(", "))
            };
            println!("  {:<24} {}{}", device.id, device.name, tags);
        }
    }
}

/// Print the accelerator a single press would record
fn run_accel(
    modifiers: Modifiers,
    code: Option<String>,
    key: Option<String>,
    button: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(button) = button {
        let token = accelerator::pointer_accelerator(&PointerPress::new(modifiers, button));
        println!("{}", token);
        return Ok(());
    }

    let code = code.unwrap_or_default();
    let key = key.unwrap_or_default();
    if code.is_empty() && key.is_empty() {
        anyhow::bail!("pass --code/--key for a key press or --button for a pointer press");
    }

    match accelerator::keyboard_accelerator(&KeyPress::new(modifiers, code, key)) {
        Some(token) => {
            println!("{}", token);
            Ok(())
        }
        None => anyhow::bail!("not a usable hotkey: press a non-modifier key"),
    }
}
