//! Output formatters for published events.
//!
//! This module provides a trait for turning an [`Event`] into one line of
//! output, with JSON and InfluxDB line protocol implementations.

pub mod influxdb;
pub mod json;

use crate::event::Event;

/// Trait for formatting events into output lines.
pub trait OutputFormatter: Send + Sync {
    /// Format one event as a single line, without the trailing newline.
    fn format(&self, event: &Event) -> String;
}

/// Selectable output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    /// One JSON object per line
    #[default]
    Json,
    /// InfluxDB line protocol
    Influxdb,
}

impl Format {
    /// Build the formatter for this format.
    pub fn formatter(&self, influxdb_measurement: &str) -> Box<dyn OutputFormatter> {
        match self {
            Format::Json => Box::new(json::JsonFormatter),
            Format::Influxdb => Box::new(influxdb::InfluxDbFormatter::new(
                influxdb_measurement.to_string(),
            )),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Influxdb => write!(f, "influxdb"),
        }
    }
}
