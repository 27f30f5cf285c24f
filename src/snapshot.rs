//! Normalized advertisement snapshots and their JSON record shape.
//!
//! Everything downstream of ingestion consumes [`AdvertisementSnapshot`] only.
//! [`AdvertisementRecord`] is the loosely typed shape seen on the wire: byte
//! blocks as hex strings, company ids as strings, the raw payload under either
//! `raw` or `raw_data`. The same record is published back out as the
//! attributes of the advertisement view.

use crate::extract::parse_company_id;
use crate::hex::{self, HexError};
use crate::mac_address::{MacAddress, ParseMacError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// One observed advertisement from one device. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertisementSnapshot {
    pub address: MacAddress,
    pub rssi: i16,
    pub name: Option<String>,
    /// Company id -> manufacturer specific bytes (company id prefix stripped).
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
    /// Service UUID -> service data bytes.
    pub service_data: BTreeMap<String, Vec<u8>>,
    pub service_uuids: BTreeSet<String>,
    pub raw_payload: Option<Vec<u8>>,
    /// Monotonic seconds on the run's clock, taken when the advertisement
    /// was received. Liveness is measured on this clock only.
    pub timestamp: f64,
    /// Time reported by the scanner, on its own clock. Passed through as an
    /// attribute and never compared with `timestamp`.
    pub reported_time: Option<f64>,
    pub source: Option<String>,
    pub connectable: Option<bool>,
    pub tx_power: Option<i16>,
}

impl AdvertisementSnapshot {
    /// A snapshot with no payload blocks, as seen for a bare advertisement.
    pub fn new(address: MacAddress, rssi: i16, timestamp: f64) -> Self {
        Self {
            address,
            rssi,
            name: None,
            manufacturer_data: BTreeMap::new(),
            service_data: BTreeMap::new(),
            service_uuids: BTreeSet::new(),
            raw_payload: None,
            timestamp,
            reported_time: None,
            source: None,
            connectable: None,
            tx_power: None,
        }
    }
}

/// Errors turning a wire record into a snapshot.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid address: {0}")]
    Address(#[from] ParseMacError),
    #[error("Invalid company id '{0}'")]
    CompanyId(String),
    #[error("Invalid hex in {field}: {source}")]
    Hex {
        field: String,
        #[source]
        source: HexError,
    },
}

/// Wire/attribute form of an advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvertisementRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
    pub rssi: i16,
    #[serde(default)]
    pub manufacturer_data: BTreeMap<String, String>,
    #[serde(default)]
    pub service_data: BTreeMap<String, String>,
    #[serde(default)]
    pub service_uuids: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub connectable: Option<bool>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub tx_power: Option<i16>,
    #[serde(default, alias = "raw_data")]
    pub raw: Option<String>,
}

impl AdvertisementRecord {
    /// Parse a single JSON line.
    pub fn from_json(line: &str) -> Result<Self, IngestError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Normalize into a snapshot received at `received_at` (run clock). The
    /// record's own `time` is kept as `reported_time`.
    pub fn into_snapshot(self, received_at: f64) -> Result<AdvertisementSnapshot, IngestError> {
        let address: MacAddress = self.address.parse()?;

        let mut manufacturer_data = BTreeMap::new();
        for (key, value) in &self.manufacturer_data {
            let company =
                parse_company_id(key).ok_or_else(|| IngestError::CompanyId(key.clone()))?;
            let field = format!("manufacturer_data[{key}]");
            manufacturer_data.insert(company, decode_hex(&field, value)?);
        }

        let mut service_data = BTreeMap::new();
        for (uuid, value) in self.service_data {
            let field = format!("service_data[{uuid}]");
            let bytes = decode_hex(&field, &value)?;
            service_data.insert(uuid, bytes);
        }

        let raw_payload = self
            .raw
            .as_deref()
            .map(|raw| decode_hex("raw", raw))
            .transpose()?;

        Ok(AdvertisementSnapshot {
            address,
            rssi: self.rssi,
            name: self.name,
            manufacturer_data,
            service_data,
            service_uuids: self.service_uuids.into_iter().collect(),
            raw_payload,
            timestamp: received_at,
            reported_time: self.time,
            source: self.source,
            connectable: self.connectable,
            tx_power: self.tx_power,
        })
    }
}

impl From<&AdvertisementSnapshot> for AdvertisementRecord {
    fn from(snapshot: &AdvertisementSnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            address: snapshot.address.to_string(),
            rssi: snapshot.rssi,
            manufacturer_data: snapshot
                .manufacturer_data
                .iter()
                .map(|(company, bytes)| (company.to_string(), hex::encode(bytes)))
                .collect(),
            service_data: snapshot
                .service_data
                .iter()
                .map(|(uuid, bytes)| (uuid.clone(), hex::encode(bytes)))
                .collect(),
            service_uuids: snapshot.service_uuids.iter().cloned().collect(),
            source: snapshot.source.clone(),
            connectable: snapshot.connectable,
            time: snapshot.reported_time.or(Some(snapshot.timestamp)),
            tx_power: snapshot.tx_power,
            raw: snapshot.raw_payload.as_deref().map(hex::encode),
        }
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, IngestError> {
    hex::decode(value).map_err(|source| IngestError::Hex {
        field: field.to_string(),
        source,
    })
}
