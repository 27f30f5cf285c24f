//! Configuration file loading.
//!
//! The file is TOML:
//!
//! ```toml
//! version = 1
//!
//! [[devices]]
//! address = "AA:BB:CC:DD:EE:FF"
//! name = "Sauna"
//!
//! [[devices.rules]]
//! name = "Temperature"
//! source_type = "manufacturer_data"
//! source_key = "0x0499"
//! offset = 1
//! length = 2
//! signed = true
//! scale = 0.005
//! unit = "°C"
//! ```
//!
//! Rules are validated here, once, so the rest of the program only ever sees
//! [`DecodeRule`]s.

use crate::mac_address::MacAddress;
use crate::rule::{DecodeRule, Endian, RuleId, RuleSpec, SourceType};
use crate::rule_set::{RuleSet, RuleSetError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Major version of the file format this build understands.
pub const CONFIG_VERSION: u32 = 1;
/// Minor version written by this build; older minors load unchanged.
pub const CONFIG_MINOR_VERSION: u32 = 1;

/// Errors loading or validating a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unsupported config version {found}")]
    UnsupportedVersion { found: u32 },
    #[error("device {0} is configured more than once")]
    DuplicateDevice(MacAddress),
    #[error("device {address}, rule #{index}: {source}")]
    Rule {
        address: MacAddress,
        index: usize,
        #[source]
        source: RuleSetError,
    },
}

/// On-disk shape of the whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub minor_version: u32,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// On-disk shape of one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub address: MacAddress,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

/// On-disk shape of one rule, loosely typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub source_type: SourceType,
    #[serde(default)]
    pub source_key: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub length: i64,
    #[serde(default)]
    pub endian: Endian,
    #[serde(default)]
    pub signed: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

fn default_scale() -> f64 {
    1.0
}

impl RuleEntry {
    /// Validate into a rule; `index` supplies the fallback id and name.
    fn into_rule(self, index: usize) -> Result<DecodeRule, RuleSetError> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .map(RuleId::from)
            .unwrap_or_else(|| RuleId::from(format!("rule_{index}")));
        let spec = RuleSpec {
            name: self.name.unwrap_or_else(|| RuleSet::default_name(index)),
            source_type: self.source_type,
            source_key: self.source_key,
            offset: self.offset,
            length: self.length,
            endian: self.endian,
            signed: self.signed,
            scale: self.scale,
            unit: self.unit,
        };
        Ok(DecodeRule::new(id, spec)?)
    }
}

impl From<&DecodeRule> for RuleEntry {
    fn from(rule: &DecodeRule) -> Self {
        let spec = rule.to_spec();
        Self {
            id: Some(rule.id().to_string()),
            name: Some(spec.name),
            source_type: spec.source_type,
            source_key: spec.source_key,
            offset: spec.offset,
            length: spec.length,
            endian: spec.endian,
            signed: spec.signed,
            scale: spec.scale,
            unit: spec.unit,
        }
    }
}

/// A validated device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub address: MacAddress,
    /// Configured name, never empty.
    pub name: Option<String>,
    pub rules: RuleSet,
}

impl DeviceConfig {
    pub fn new(address: MacAddress, rules: RuleSet) -> Self {
        Self {
            address,
            name: None,
            rules,
        }
    }

    /// Display name; the address when none was configured.
    pub fn title(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

/// A validated configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Read and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Self::try_from(file)
    }

    /// Serializable form, e.g. for writing back after rule edits.
    pub fn to_file(&self) -> ConfigFile {
        ConfigFile {
            version: CONFIG_VERSION,
            minor_version: CONFIG_MINOR_VERSION,
            devices: self
                .devices
                .iter()
                .map(|device| DeviceEntry {
                    address: device.address,
                    name: device.name.clone(),
                    rules: device.rules.iter().map(RuleEntry::from).collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<ConfigFile> for Config {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        if file.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: file.version,
            });
        }

        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(file.devices.len());
        for entry in file.devices {
            let address = entry.address;
            if !seen.insert(address) {
                return Err(ConfigError::DuplicateDevice(address));
            }

            let mut rules = RuleSet::new();
            for (index, rule) in entry.rules.into_iter().enumerate() {
                rule.into_rule(index)
                    .and_then(|rule| rules.insert(rule))
                    .map_err(|source| ConfigError::Rule {
                        address,
                        index,
                        source,
                    })?;
            }

            devices.push(DeviceConfig {
                address,
                name: entry.name.filter(|name| !name.is_empty()),
                rules,
            });
        }

        Ok(Config { devices })
    }
}

/// Parse a duration such as `30s`, `1m`, `500ms` or `2h`; bare numbers are
/// seconds.
///
/// ```
/// use ble_advert_data::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    // "ms" before "m" and "s".
    const UNITS: [(&str, u64); 4] = [("ms", 1), ("h", 3_600_000), ("m", 60_000), ("s", 1_000)];
    let (number, millis_per_unit) = UNITS
        .iter()
        .find_map(|(suffix, millis)| src.strip_suffix(suffix).map(|n| (n, *millis)))
        .unwrap_or((src, 1_000));

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;
    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration out of range: {src}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
version = 1
minor_version = 1

[[devices]]
address = "AA:BB:CC:DD:EE:FF"
name = "Sauna"

[[devices.rules]]
id = "temp"
name = "Temperature"
source_type = "manufacturer_data"
source_key = "0x0499"
offset = 1
length = 2
signed = true
scale = 0.005
unit = "°C"

[[devices.rules]]
source_type = "service_data"
source_key = "0000FCD2-0000-1000-8000-00805F9B34FB"
offset = 3
length = 1

[[devices]]
address = "11:22:33:44:55:66"
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.devices.len(), 2);

        let sauna = &config.devices[0];
        assert_eq!(sauna.title(), "Sauna");
        assert_eq!(sauna.rules.len(), 2);

        let rules: Vec<_> = sauna.rules.iter().collect();
        assert_eq!(rules[0].id().as_str(), "temp");
        assert!(rules[0].signed());
        assert_eq!(rules[0].scale(), 0.005);
        assert_eq!(rules[1].id().as_str(), "rule_1");
        assert_eq!(rules[1].name(), "Rule 2");
        assert_eq!(rules[1].endian(), Endian::Big);
        assert_eq!(rules[1].scale(), 1.0);

        let bare = &config.devices[1];
        assert!(bare.name.is_none());
        assert_eq!(bare.title(), "11:22:33:44:55:66");
        assert!(bare.rules.is_empty());
    }

    #[test]
    fn test_invalid_rule_rejects_file() {
        let content = r#"
[[devices]]
address = "AA:BB:CC:DD:EE:FF"

[[devices.rules]]
source_type = "manufacturer_data"
source_key = "apple"
length = 1
"#;
        let err = Config::from_toml_str(content).unwrap_err();
        assert!(matches!(err, ConfigError::Rule { index: 0, .. }));
        assert!(err.to_string().contains("apple"));
    }

    #[test]
    fn test_missing_length_is_invalid() {
        let content = r#"
[[devices]]
address = "AA:BB:CC:DD:EE:FF"

[[devices.rules]]
source_type = "raw"
"#;
        let err = Config::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("length must be >= 1"));
    }

    #[test]
    fn test_unknown_source_type_is_parse_error() {
        let content = r#"
[[devices]]
address = "AA:BB:CC:DD:EE:FF"

[[devices.rules]]
source_type = "gatt"
length = 1
"#;
        assert!(matches!(
            Config::from_toml_str(content),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_duplicate_device_and_rule_ids() {
        let dup_device = r#"
[[devices]]
address = "AA:BB:CC:DD:EE:FF"
[[devices]]
address = "aa:bb:cc:dd:ee:ff"
"#;
        assert!(matches!(
            Config::from_toml_str(dup_device),
            Err(ConfigError::DuplicateDevice(_))
        ));

        let dup_rule = r#"
[[devices]]
address = "AA:BB:CC:DD:EE:FF"
[[devices.rules]]
id = "x"
source_type = "raw"
length = 1
[[devices.rules]]
id = "x"
source_type = "raw"
length = 2
"#;
        assert!(matches!(
            Config::from_toml_str(dup_rule),
            Err(ConfigError::Rule {
                index: 1,
                source: RuleSetError::DuplicateId(_),
                ..
            })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        assert!(matches!(
            Config::from_toml_str("version = 2"),
            Err(ConfigError::UnsupportedVersion { found: 2 })
        ));
    }

    #[test]
    fn test_to_file_round_trip() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let text = toml::to_string(&config.to_file()).unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.devices.len(), 2);

        let missing = Config::load(Path::new("/nonexistent/ble-advert-data.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 3 s ").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("1.5s").is_err());
    }
}
