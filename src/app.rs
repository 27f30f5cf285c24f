//! Core application runner (business logic) for `ble-advert-data`.
//!
//! This module is intentionally decoupled from CLI parsing, config loading and
//! process exit codes so it can be tested deterministically.

use crate::config::{Config, parse_duration};
use crate::event::Event;
use crate::liveness::{DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT};
use crate::orchestrator::{Orchestrator, SessionError};
use crate::output::{Format, OutputFormatter};
use crate::source::{AdvertisementSource, SourceError};
use clap::Parser;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

/// Configuration for the core run loop.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Device and rule configuration (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Read advertisements from this file instead of stdin, one JSON object
    /// per line.
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value_t, value_enum)]
    pub format: Format,

    /// The name of the measurement in InfluxDB line protocol.
    #[arg(long, default_value = "ble_advert_data")]
    pub influxdb_measurement: String,

    /// Mark a device offline after this long without advertisements.
    /// Accepts duration with suffix: 30s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// How often to check for offline devices.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub check_interval: Duration,

    /// Verbose output, print errors for unparseable advertisements
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Options {
    /// Options for `config` with every other setting at its default.
    pub fn new(config: PathBuf) -> Self {
        Self {
            config,
            input: None,
            format: Format::default(),
            influxdb_measurement: "ble_advert_data".to_string(),
            timeout: DEFAULT_TIMEOUT,
            check_interval: DEFAULT_CHECK_INTERVAL,
            verbose: false,
        }
    }
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("check interval must be greater than zero")]
    InvalidInterval,
}

fn write_events(
    formatter: &dyn OutputFormatter,
    events: Vec<Event>,
    out: &mut dyn Write,
) -> io::Result<()> {
    for event in events {
        writeln!(out, "{}", formatter.format(&event))?;
    }
    Ok(())
}

/// Run the core processing loop, writing formatted events to `out` and
/// verbose errors to `err`.
///
/// - Already discovered advertisements are applied first.
/// - Each advertisement from a configured device produces its advertisement,
///   rule and (on change) liveness events.
/// - Every `check_interval` the liveness timeouts are checked.
/// - Ingestion errors are written to `err` only when `options.verbose` is true.
///
/// Returns once the source closes its subscription.
pub async fn run_with_io(
    options: Options,
    config: Config,
    source: &dyn AdvertisementSource,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    if options.check_interval.is_zero() {
        return Err(RunError::InvalidInterval);
    }

    let formatter = options.format.formatter(&options.influxdb_measurement);
    let mut orchestrator = Orchestrator::new(config, options.timeout)?;
    let clock = source.clock();

    write_events(formatter.as_ref(), orchestrator.seed(&source.discovered()), out)?;

    let mut snapshots = source.subscribe().await?;
    let mut ticks = tokio::time::interval(options.check_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
    // The first tick completes immediately.
    ticks.tick().await;

    loop {
        tokio::select! {
            received = snapshots.recv() => match received {
                Some(Ok(snapshot)) => {
                    let events = orchestrator.handle_advertisement(&snapshot);
                    write_events(formatter.as_ref(), events, out)?;
                }
                Some(Err(ingest_err)) => {
                    if options.verbose {
                        writeln!(err, "{ingest_err}")?;
                    }
                }
                None => break,
            },
            _ = ticks.tick() => {
                let events = orchestrator.handle_tick(clock.now());
                write_events(formatter.as_ref(), events, out)?;
            }
        }
    }

    Ok(())
}
