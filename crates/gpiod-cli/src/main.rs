#![deny(unsafe_code)]

//! gpiod CLI — runs the daemon and talks to it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gpiod_config::{AppConfig, DEFAULT_CONFIG_PATH};
use gpiod_core::init_file::{self, InitReport};
use gpiod_core::pin::{PinController, PinNumbering, SimulatedController};
use gpiod_core::{Daemon, GpioClient, ProtocolParser, Response, build_info};

/// gpiod — GPIO access for unprivileged processes over a Unix socket.
#[derive(Parser, Debug)]
#[command(
    name = "gpiod",
    version = build_info::VERSION,
    long_version = build_info::long_version(),
    about,
    long_about = None
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the daemon in the foreground.
    Start {
        /// Override the pin backend from the config file.
        #[arg(long)]
        backend: Option<String>,
    },

    /// Send one command to a running daemon and print the response.
    Send {
        /// Command words, e.g. `SETUP 16 OUT`.
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Check an init file against a simulated controller.
    Check {
        /// Init file to check.
        file: PathBuf,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)
        .await
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { backend } => cmd_start(config, backend).await?,
        Commands::Send { command } => {
            let response = cmd_send(&config, &command.join(" ")).await?;
            println!("{response}");
            if response.is_error() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Check { file } => {
            let report = cmd_check(&config, &file).await?;
            print_report(&file, &report);
            if report.failed() > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config { show } => cmd_config(&config, &cli.config, show)?,
    }

    Ok(ExitCode::SUCCESS)
}

async fn cmd_start(mut config: AppConfig, backend: Option<String>) -> Result<()> {
    if let Some(backend) = backend {
        config.gpio.backend = backend;
        config.validate()?;
    }
    info!(backend = %config.gpio.backend, "Starting gpiod daemon");

    let mut daemon = Daemon::new(config)?;
    daemon.run().await?;
    Ok(())
}

async fn cmd_send(config: &AppConfig, command: &str) -> Result<Response> {
    let client = GpioClient::new(&config.daemon.socket_path);
    let response = client.send(command).await?;
    Ok(response)
}

/// Replay `file` into a simulated controller using the configured numbering.
async fn cmd_check(config: &AppConfig, file: &Path) -> Result<InitReport> {
    if !file.exists() {
        bail!("init file not found: {}", file.display());
    }

    let numbering: PinNumbering = config.gpio.numbering.parse()?;
    let mut controller = SimulatedController::new();
    controller.init(numbering)?;

    let mut parser = ProtocolParser::new(controller);
    Ok(init_file::run_init_file(file, &mut parser).await)
}

fn print_report(file: &Path, report: &InitReport) {
    for failure in &report.failures {
        println!(
            "{}:{}: {} ({})",
            file.display(),
            failure.line_no,
            failure.message,
            failure.line
        );
    }
    println!(
        "{} applied, {} failed, {} skipped",
        report.applied,
        report.failed(),
        report.skipped
    );
}

fn cmd_config(config: &AppConfig, config_path: &Path, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("serializing configuration")?;
        println!("{toml_str}");
    } else if config_path.exists() {
        println!("Configuration at '{}' is valid.", config_path.display());
    } else {
        println!(
            "No configuration at '{}', using defaults.",
            config_path.display()
        );
    }
    Ok(())
}
