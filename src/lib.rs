//! `ble-advert-data` library.
//!
//! Decodes configurable byte fields out of BLE advertisements and tracks
//! whether each configured device is still advertising.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, config loading
//! and process exit codes. The core “business logic” lives in [`crate::app`]
//! where it can be tested deterministically with an injected source and
//! injected output streams.

pub mod app;
pub mod config;
pub mod decode;
pub mod event;
pub mod extract;
pub mod hex;
pub mod liveness;
pub mod logging;
pub mod mac_address;
pub mod orchestrator;
pub mod output;
pub mod rule;
pub mod rule_set;
pub mod snapshot;
pub mod source;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types at the crate root
pub use config::{Config, ConfigError, parse_duration};
pub use decode::{DecodedField, decode};
pub use event::Event;
pub use extract::{extract, parse_company_id};
pub use liveness::{DeviceLivenessTracker, LivenessRegistry, Transition};
pub use mac_address::MacAddress;
pub use orchestrator::{EntityRegistry, InMemoryEntityRegistry, Orchestrator, SessionError};
pub use output::{Format, OutputFormatter};
pub use rule::{ConfigurationError, DecodeRule, Endian, RuleId, RuleSpec, SourceType};
pub use rule_set::{ResourceCleanup, RuleSet, RuleSetError, SharedRuleSet};
pub use snapshot::{AdvertisementRecord, AdvertisementSnapshot, IngestError};
pub use source::{AdvertisementSource, Clock, JsonLinesSource, SnapshotResult, SourceError};
