//! # cardlock
//!
//! Removes the carrier SIM lock on Huawei USB modems that speak
//! `AT^CARDLOCK`.
//!
//! ## Usage
//!
//! ```bash
//! # Full unlock: find the control port, check the IMEI and lock status,
//! # confirm, send the code, verify
//! sudo cardlock unlock
//!
//! # Only report the lock status
//! sudo cardlock status --port /dev/ttyUSB2
//!
//! # Compute the code offline
//! cardlock code 490154203237518
//! ```

mod prompt;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cardlock_core::events::{EventSink, Tee, TracingSink};
use cardlock_core::{
    Controller, Imei, Outcome, SerialPortTransport, UnlockCode, UnlockConfig, UnlockPrompt,
};

use crate::prompt::ConsoleOperator;
use crate::render::JsonSink;

/// SIM lock removal for Huawei USB modems.
#[derive(Parser, Debug)]
#[command(name = "cardlock", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Candidate serial port, tried in the order given (repeatable).
    #[arg(long = "port", global = true)]
    ports: Vec<String>,

    /// Line speed.
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Seconds to wait for the modem to answer each command.
    #[arg(long, global = true)]
    settle: Option<u64>,

    /// Emit session events as JSON lines on stdout.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full unlock sequence (default).
    Unlock,
    /// Report IMEI and lock status without sending anything destructive.
    Status,
    /// Compute the unlock code for an IMEI without touching the modem.
    Code {
        /// 15-digit IMEI.
        imei: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging ─────────────────────────────────────────────────
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if let Some(Command::Code { imei }) = &cli.command {
        return compute_code(imei);
    }

    let config = load_config(&cli)?;
    tracing::info!(
        candidates = ?config.candidates.iter().map(|c| c.path()).collect::<Vec<_>>(),
        baud = config.baud_rate,
        settle_s = config.settle.as_secs(),
        "cardlock starting"
    );

    let transport = SerialPortTransport::from_config(&config);
    let events: Box<dyn EventSink> = if cli.json {
        Box::new(Tee(TracingSink, JsonSink::stdout()))
    } else {
        Box::new(TracingSink)
    };

    match cli.command {
        Some(Command::Status) => interrogate(config, transport, events, cli.json),
        _ => unlock(config, transport, events, cli.json),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<UnlockConfig> {
    let mut config = match &cli.config {
        Some(path) => UnlockConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => UnlockConfig::default(),
    };
    if !cli.ports.is_empty() {
        config = config.with_candidates(cli.ports.iter().cloned())?;
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    if let Some(settle) = cli.settle {
        config.settle = std::time::Duration::from_secs(settle);
    }
    Ok(config)
}

fn unlock(
    config: UnlockConfig,
    transport: SerialPortTransport,
    events: Box<dyn EventSink>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let mut operator = ConsoleOperator::stdin();
    if !operator.confirm_disclaimer()? {
        tracing::info!("aborted before touching the modem");
        return Ok(exit_code(&Outcome::Aborted));
    }

    let mut controller = Controller::new(config, transport, operator, events);
    let outcome = controller.run();
    if !json {
        render::outcome(&outcome);
    }
    Ok(exit_code(&outcome))
}

fn interrogate(
    config: UnlockConfig,
    transport: SerialPortTransport,
    events: Box<dyn EventSink>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    // Interrogation never reaches the confirmation step.
    let operator = |_: &UnlockPrompt| false;
    let mut controller = Controller::new(config, transport, operator, events);
    let session = controller.interrogate()?;
    render::session(&session, json)?;
    Ok(ExitCode::SUCCESS)
}

fn compute_code(imei: &str) -> anyhow::Result<ExitCode> {
    let imei = Imei::parse(imei.trim()).context("refusing to derive a code")?;
    let code = UnlockCode::derive(&imei);
    tracing::info!(%imei, %code, "unlock code computed");
    println!("{code}");
    Ok(ExitCode::SUCCESS)
}

fn exit_code(outcome: &Outcome) -> ExitCode {
    ExitCode::from(exit_status(outcome))
}

fn exit_status(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Success | Outcome::AlreadyUnlocked => 0,
        Outcome::Aborted => 3,
        Outcome::Failure(_) => 1,
    }
}
