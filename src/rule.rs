//! Decode rules: where to find a field in an advertisement and how to read it.
//!
//! A [`RuleSpec`] is the loosely typed shape a rule arrives in (offsets may be
//! negative, keys may be garbage). [`DecodeRule`] can only be obtained through
//! validation, so every rule reaching the decoder has `offset >= 0`,
//! `length >= 1` and a source key that makes sense for its source type.

use crate::extract::parse_company_id;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which block of the advertisement a rule reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Manufacturer specific data, keyed by company id.
    #[serde(rename = "manufacturer_data")]
    Manufacturer,
    /// Service data, keyed by service UUID.
    #[serde(rename = "service_data")]
    Service,
    /// The raw advertisement payload.
    #[serde(rename = "raw")]
    Raw,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Manufacturer => "manufacturer_data",
            SourceType::Service => "service_data",
            SourceType::Raw => "raw",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte order of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Big,
    Little,
}

impl Endian {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endian::Big => "big",
            Endian::Little => "little",
        }
    }
}

/// Opaque, stable identifier of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// A fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RuleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Invalid rule shape, reported when a rule is created or edited.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("offset must be >= 0, got {0}")]
    NegativeOffset(i64),
    #[error("length must be >= 1, got {0}")]
    InvalidLength(i64),
    #[error("{0} rules require a source key")]
    MissingSourceKey(SourceType),
    #[error("manufacturer key '{0}' is not a 16-bit integer (decimal or 0x hex)")]
    InvalidManufacturerKey(String),
    #[error("scale must be a finite number, got {0}")]
    NonFiniteScale(f64),
}

/// A rule as supplied by a caller, before validation and without an id.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    pub name: String,
    pub source_type: SourceType,
    pub source_key: Option<String>,
    pub offset: i64,
    pub length: i64,
    pub endian: Endian,
    pub signed: bool,
    pub scale: f64,
    pub unit: Option<String>,
}

impl RuleSpec {
    /// One unsigned big-endian byte at offset 0 with scale 1.
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
            source_key: None,
            offset: 0,
            length: 1,
            endian: Endian::Big,
            signed: false,
            scale: 1.0,
            unit: None,
        }
    }

    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn length(mut self, length: i64) -> Self {
        self.length = length;
        self
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// A validated decode rule.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRule {
    id: RuleId,
    name: String,
    source_type: SourceType,
    source_key: Option<String>,
    offset: usize,
    length: usize,
    endian: Endian,
    signed: bool,
    scale: f64,
    unit: Option<String>,
}

impl DecodeRule {
    /// Validate `spec` and attach `id`.
    pub fn new(id: RuleId, spec: RuleSpec) -> Result<Self, ConfigurationError> {
        let offset =
            usize::try_from(spec.offset).map_err(|_| ConfigurationError::NegativeOffset(spec.offset))?;
        let length = usize::try_from(spec.length)
            .ok()
            .filter(|&len| len >= 1)
            .ok_or(ConfigurationError::InvalidLength(spec.length))?;

        let key = spec.source_key.as_deref().map(str::trim).unwrap_or("");
        match spec.source_type {
            SourceType::Manufacturer if key.is_empty() => {
                return Err(ConfigurationError::MissingSourceKey(spec.source_type));
            }
            SourceType::Manufacturer if parse_company_id(key).is_none() => {
                return Err(ConfigurationError::InvalidManufacturerKey(key.to_string()));
            }
            SourceType::Service if key.is_empty() => {
                return Err(ConfigurationError::MissingSourceKey(spec.source_type));
            }
            _ => {}
        }

        if !spec.scale.is_finite() {
            return Err(ConfigurationError::NonFiniteScale(spec.scale));
        }

        Ok(Self {
            id,
            name: spec.name,
            source_type: spec.source_type,
            source_key: spec.source_key,
            offset,
            length,
            endian: spec.endian,
            signed: spec.signed,
            scale: spec.scale,
            unit: spec.unit,
        })
    }

    /// The loose form of this rule, e.g. as a starting point for an edit.
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            name: self.name.clone(),
            source_type: self.source_type,
            source_key: self.source_key.clone(),
            offset: self.offset as i64,
            length: self.length as i64,
            endian: self.endian,
            signed: self.signed,
            scale: self.scale,
            unit: self.unit.clone(),
        }
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn source_key(&self) -> Option<&str> {
        self.source_key.as_deref()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn signed(&self) -> bool {
        self.signed
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(spec: RuleSpec) -> Result<DecodeRule, ConfigurationError> {
        DecodeRule::new(RuleId::from("r1"), spec)
    }

    #[test]
    fn test_valid_rules() {
        let r = rule(
            RuleSpec::new("Temperature", SourceType::Manufacturer)
                .source_key("0x0499")
                .offset(1)
                .length(2)
                .signed(true)
                .scale(0.005)
                .unit("°C"),
        )
        .unwrap();
        assert_eq!(r.id().as_str(), "r1");
        assert_eq!(r.offset(), 1);
        assert_eq!(r.length(), 2);
        assert_eq!(r.unit(), Some("°C"));

        // Raw rules ignore the key entirely.
        assert!(rule(RuleSpec::new("Flags", SourceType::Raw)).is_ok());
        assert!(rule(RuleSpec::new("Svc", SourceType::Service).source_key("FEAA")).is_ok());
    }

    #[test]
    fn test_offset_and_length_bounds() {
        assert_eq!(
            rule(RuleSpec::new("x", SourceType::Raw).offset(-1)),
            Err(ConfigurationError::NegativeOffset(-1))
        );
        assert_eq!(
            rule(RuleSpec::new("x", SourceType::Raw).length(0)),
            Err(ConfigurationError::InvalidLength(0))
        );
        assert_eq!(
            rule(RuleSpec::new("x", SourceType::Raw).length(-4)),
            Err(ConfigurationError::InvalidLength(-4))
        );
        // Offsets far past any real payload are a runtime condition, not an error.
        assert!(rule(RuleSpec::new("x", SourceType::Raw).offset(1000).length(64)).is_ok());
    }

    #[test]
    fn test_source_key_validation() {
        assert_eq!(
            rule(RuleSpec::new("x", SourceType::Manufacturer)),
            Err(ConfigurationError::MissingSourceKey(SourceType::Manufacturer))
        );
        assert_eq!(
            rule(RuleSpec::new("x", SourceType::Manufacturer).source_key("apple")),
            Err(ConfigurationError::InvalidManufacturerKey("apple".to_string()))
        );
        assert_eq!(
            rule(RuleSpec::new("x", SourceType::Service).source_key("  ")),
            Err(ConfigurationError::MissingSourceKey(SourceType::Service))
        );
    }

    #[test]
    fn test_non_finite_scale_rejected() {
        assert!(matches!(
            rule(RuleSpec::new("x", SourceType::Raw).scale(f64::NAN)),
            Err(ConfigurationError::NonFiniteScale(_))
        ));
    }

    #[test]
    fn test_to_spec_round_trips_through_new() {
        let spec = RuleSpec::new("Battery", SourceType::Service)
            .source_key("180f")
            .offset(2)
            .length(2)
            .endian(Endian::Little)
            .scale(0.001)
            .unit("V");
        let r = rule(spec.clone()).unwrap();
        assert_eq!(r.to_spec(), spec);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RuleId::generate(), RuleId::generate());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&SourceType::Manufacturer).unwrap(),
            "\"manufacturer_data\""
        );
        assert_eq!(serde_json::to_string(&Endian::Little).unwrap(), "\"little\"");
        assert_eq!(SourceType::Service.to_string(), "service_data");
    }
}
