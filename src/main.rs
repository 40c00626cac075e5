//! Device entry point.
//!
//! Wires the controller to its production collaborators (MQTT session,
//! host link, terminal panel), runs the control loop, and maps console
//! lines onto the command surface the way the original device mapped
//! serial-shell verbs.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

use iotoggle::controller::{Controller, DeviceCommand};
use iotoggle::observability::init_default_logging;
use iotoggle::url::BrokerUrl;
use iotoggle::{HostLink, MqttSession, SettingsStore, TerminalPanel};

/// MQTT toggle-switch device controller.
#[derive(Parser)]
#[command(name = "iotoggle")]
#[command(about = "MQTT toggle-switch device controller")]
#[command(version)]
struct Cli {
    /// Settings file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the device control loop
    Run,
    /// Validate the persisted settings
    Config {
        /// Show the current settings
        #[arg(long)]
        show: bool,
    },
}

/// Console lines understood by the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleInput {
    Press,
    Command(DeviceCommand),
    Quit,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_default_logging();

    info!("iotoggle v{}", env!("CARGO_PKG_VERSION"));

    let store = settings_store(cli.config.as_deref());
    let result = match cli.command {
        Commands::Run => run_device(store).await,
        Commands::Config { show } => handle_config_command(&store, show),
    };

    if let Err(err) = result {
        warn!(error = %err, "command failed");
        std::process::exit(1);
    }
}

fn settings_store(path: Option<&Path>) -> SettingsStore {
    if let Some(path) = path {
        return SettingsStore::new(path);
    }
    for candidate in ["device.toml", "config/device.toml"] {
        if Path::new(candidate).exists() {
            return SettingsStore::new(candidate);
        }
    }
    SettingsStore::new("device.toml")
}

async fn run_device(store: SettingsStore) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = Controller::new(
        MqttSession::new(),
        HostLink::new(),
        TerminalPanel::new(),
        store,
    );

    // Missing or broken settings are not fatal: the device runs
    // unconfigured and shows a "check settings" status instead.
    if let Err(err) = controller.reload_config() {
        warn!(error = %err, "starting without a valid broker configuration");
    }

    let (input_tx, mut input_rx) = mpsc::channel::<ConsoleInput>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(input) = parse_console_line(&line) {
                if input_tx.send(input).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("device loop running; 'press' activates, 'quit' exits");
    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            input = input_rx.recv() => match input {
                Some(ConsoleInput::Press) => controller.press(),
                Some(ConsoleInput::Command(command)) => {
                    if let Err(err) = controller.dispatch(command).await {
                        warn!(error = %err, "command failed");
                    }
                }
                Some(ConsoleInput::Quit) | None => break,
            },
            _ = sleep(controller.holdoff()) => controller.tick().await,
        }
    }

    controller.shutdown().await;
    Ok(())
}

fn handle_config_command(
    store: &SettingsStore,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = store.load()?;
    if show {
        println!("{}", toml::to_string_pretty(&settings)?);
    }
    match &settings.url {
        Some(url) => {
            let parsed = BrokerUrl::parse(url)
                .map_err(|err| format!("broker url rejected (code {}): {err}", err.code()))?;
            info!(host = %parsed.host, topic = %parsed.topic, tls = parsed.use_tls, "broker url ok");
        }
        None => warn!("no broker url configured"),
    }
    info!("settings check complete");
    Ok(())
}

fn parse_console_line(line: &str) -> Option<ConsoleInput> {
    match line.trim() {
        "" => None,
        "press" | "p" => Some(ConsoleInput::Press),
        "link up" => Some(ConsoleInput::Command(DeviceCommand::LinkUp)),
        "link dn" | "link down" => Some(ConsoleInput::Command(DeviceCommand::LinkDown)),
        "up" => Some(ConsoleInput::Command(DeviceCommand::SessionUp)),
        "dn" | "down" => Some(ConsoleInput::Command(DeviceCommand::SessionDown)),
        "reload" => Some(ConsoleInput::Command(DeviceCommand::ReloadConfig)),
        "quit" | "exit" => Some(ConsoleInput::Quit),
        other => {
            eprintln!("unknown command: {other}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_lines_map_to_inputs() {
        assert_eq!(parse_console_line("press"), Some(ConsoleInput::Press));
        assert_eq!(parse_console_line("  p  "), Some(ConsoleInput::Press));
        assert_eq!(
            parse_console_line("link up"),
            Some(ConsoleInput::Command(DeviceCommand::LinkUp))
        );
        assert_eq!(
            parse_console_line("reload"),
            Some(ConsoleInput::Command(DeviceCommand::ReloadConfig))
        );
        assert_eq!(parse_console_line("quit"), Some(ConsoleInput::Quit));
        assert_eq!(parse_console_line(""), None);
        assert_eq!(parse_console_line("bogus"), None);
    }
}
