//! Published views of a device: the whole advertisement, one decoded rule,
//! or the device's liveness.

use crate::decode::DecodedField;
use crate::mac_address::MacAddress;
use crate::rule::{DecodeRule, RuleId};
use crate::snapshot::{AdvertisementRecord, AdvertisementSnapshot};
use serde::Serialize;

/// Unique id of a device's advertisement view.
pub fn advertisement_unique_id(address: &MacAddress) -> String {
    format!("{}_advertisement", address.formatted())
}

/// Unique id of a rule's view.
pub fn rule_unique_id(address: &MacAddress, rule: &RuleId) -> String {
    format!("{}_rule_{}", address.formatted(), rule)
}

/// Unique id of a device's liveness view.
pub fn connectivity_unique_id(address: &MacAddress) -> String {
    format!("{}_connectivity", address.formatted())
}

/// Something to publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Advertisement(AdvertisementView),
    Rule(RuleView),
    Liveness(LivenessView),
}

impl Event {
    pub fn unique_id(&self) -> &str {
        match self {
            Event::Advertisement(view) => &view.unique_id,
            Event::Rule(view) => &view.unique_id,
            Event::Liveness(view) => &view.unique_id,
        }
    }

    /// Title of the device the event belongs to.
    pub fn device(&self) -> &str {
        match self {
            Event::Advertisement(view) => &view.device,
            Event::Rule(view) => &view.device,
            Event::Liveness(view) => &view.device,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvertisementView {
    pub unique_id: String,
    /// Configured device title.
    pub device: String,
    pub rssi: i16,
    pub attributes: AdvertisementRecord,
}

impl AdvertisementView {
    pub fn new(device: &str, snapshot: &AdvertisementSnapshot) -> Self {
        Self {
            unique_id: advertisement_unique_id(&snapshot.address),
            device: device.to_string(),
            rssi: snapshot.rssi,
            attributes: AdvertisementRecord::from(snapshot),
        }
    }
}

/// Diagnostic attributes of a rule view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleAttributes {
    /// Advertised local name.
    pub name: Option<String>,
    pub address: String,
    pub source_type: String,
    pub source_key: Option<String>,
    pub offset: usize,
    pub length: usize,
    pub endian: String,
    pub signed: bool,
    pub scale: f64,
    pub unit: Option<String>,
    pub raw_bytes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleView {
    pub unique_id: String,
    pub device: String,
    pub rule_id: RuleId,
    pub name: String,
    pub unit: Option<String>,
    #[serde(flatten)]
    pub field: DecodedField,
    pub attributes: RuleAttributes,
}

impl RuleView {
    pub fn new(
        device: &str,
        snapshot: &AdvertisementSnapshot,
        rule: &DecodeRule,
        field: DecodedField,
    ) -> Self {
        let attributes = RuleAttributes {
            name: snapshot.name.clone(),
            address: snapshot.address.to_string(),
            source_type: rule.source_type().to_string(),
            source_key: rule.source_key().map(str::to_string),
            offset: rule.offset(),
            length: rule.length(),
            endian: rule.endian().as_str().to_string(),
            signed: rule.signed(),
            scale: rule.scale(),
            unit: rule.unit().map(str::to_string),
            raw_bytes: field.raw_hex.clone(),
        };
        Self {
            unique_id: rule_unique_id(&snapshot.address, rule.id()),
            device: device.to_string(),
            rule_id: rule.id().clone(),
            name: rule.name().to_string(),
            unit: rule.unit().map(str::to_string),
            field,
            attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivenessView {
    pub unique_id: String,
    pub device: String,
    pub address: MacAddress,
    pub online: bool,
}

impl LivenessView {
    pub fn new(device: &str, address: MacAddress, online: bool) -> Self {
        Self {
            unique_id: connectivity_unique_id(&address),
            device: device.to_string(),
            address,
            online,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::extract::extract;
    use crate::rule::{RuleSpec, SourceType};
    use crate::test_utils::{TEST_MAC, manufacturer_snapshot};

    #[test]
    fn test_unique_ids() {
        assert_eq!(
            advertisement_unique_id(&TEST_MAC),
            "aa:bb:cc:dd:ee:ff_advertisement"
        );
        assert_eq!(
            rule_unique_id(&TEST_MAC, &RuleId::from("temp")),
            "aa:bb:cc:dd:ee:ff_rule_temp"
        );
        assert_eq!(
            connectivity_unique_id(&TEST_MAC),
            "aa:bb:cc:dd:ee:ff_connectivity"
        );
    }

    #[test]
    fn test_rule_view_json_shape() {
        let snapshot = manufacturer_snapshot(76, &[0x01, 0xAB, 0xCD], 5.0);
        let rule = DecodeRule::new(
            RuleId::from("r"),
            RuleSpec::new("Counter", SourceType::Manufacturer)
                .source_key("0x004C")
                .offset(1)
                .length(2)
                .unit("n"),
        )
        .unwrap();
        let field = decode(extract(&snapshot, &rule), &rule);
        let event = Event::Rule(RuleView::new("Desk", &snapshot, &rule, field));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "rule");
        assert_eq!(json["unique_id"], "aa:bb:cc:dd:ee:ff_rule_r");
        assert_eq!(json["available"], true);
        assert_eq!(json["value"], 43981.0);
        assert_eq!(json["raw_hex"], "abcd");
        assert_eq!(json["attributes"]["raw_bytes"], "abcd");
        assert_eq!(json["attributes"]["source_type"], "manufacturer_data");
        assert_eq!(json["attributes"]["source_key"], "0x004C");
        assert_eq!(json["attributes"]["endian"], "big");
    }

    #[test]
    fn test_advertisement_view_json_shape() {
        let mut snapshot = manufacturer_snapshot(76, &[0x02, 0x15], 9.5);
        snapshot.name = Some("Beacon".into());
        let event = Event::Advertisement(AdvertisementView::new("Desk", &snapshot));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "advertisement");
        assert_eq!(json["rssi"], -60);
        assert_eq!(json["attributes"]["manufacturer_data"]["76"], "0215");
        assert_eq!(json["attributes"]["raw"], serde_json::Value::Null);
        assert_eq!(json["attributes"]["time"], 9.5);
        assert_eq!(json["attributes"]["name"], "Beacon");
    }
}
