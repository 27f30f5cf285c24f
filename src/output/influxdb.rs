//! InfluxDB line protocol output formatter.
//!
//! Points carry no timestamp; the receiving server assigns one.

use crate::event::Event;
use crate::output::OutputFormatter;
use std::collections::BTreeMap;
use std::fmt;

/// Field values for InfluxDB line protocol
#[derive(Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Float(num) => write!(f, "{num}"),
            FieldValue::Integer(num) => write!(f, "{num}i"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::String(s) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
        }
    }
}

/// Data point in InfluxDB line protocol
#[derive(Debug)]
pub struct DataPoint {
    pub measurement: String,
    pub tag_set: BTreeMap<String, String>,
    pub field_set: BTreeMap<String, FieldValue>,
}

/// Escape commas, equals signs and spaces in measurement names, tag keys
/// and tag values.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn fmt_tags(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    for (key, value) in data_point.tag_set.iter() {
        write!(fmt, ",{}={}", escape(key), escape(value))?;
    }
    Ok(())
}

fn fmt_fields(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    let mut first = true;
    for (key, value) in data_point.field_set.iter() {
        if first {
            first = false;
        } else {
            write!(fmt, ",")?;
        }
        write!(fmt, "{}={}", escape(key), value)?;
    }
    Ok(())
}

impl fmt::Display for DataPoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", escape(&self.measurement))?;
        fmt_tags(self, fmt)?;
        write!(fmt, " ")?;
        fmt_fields(self, fmt)
    }
}

/// InfluxDB line protocol formatter.
///
/// Every point is tagged with the device `mac` and `name`; rule points also
/// carry a `rule` tag.
pub struct InfluxDbFormatter {
    /// The measurement name in InfluxDB
    measurement_name: String,
}

impl InfluxDbFormatter {
    /// Create a new InfluxDB formatter.
    ///
    /// # Arguments
    /// * `measurement_name` - The measurement name to use in the line protocol
    pub fn new(measurement_name: String) -> Self {
        Self { measurement_name }
    }

    fn to_data_point(&self, event: &Event) -> DataPoint {
        let mut tags = BTreeMap::new();
        let mut fields = BTreeMap::new();

        match event {
            Event::Advertisement(view) => {
                tags.insert("mac".to_string(), view.attributes.address.clone());
                tags.insert("name".to_string(), view.device.clone());
                fields.insert("rssi".to_string(), FieldValue::Integer(view.rssi.into()));
                if let Some(tx_power) = view.attributes.tx_power {
                    fields.insert("tx_power".to_string(), FieldValue::Integer(tx_power.into()));
                }
            }
            Event::Rule(view) => {
                tags.insert("mac".to_string(), view.attributes.address.clone());
                tags.insert("name".to_string(), view.device.clone());
                tags.insert("rule".to_string(), view.name.clone());
                fields.insert(
                    "available".to_string(),
                    FieldValue::Boolean(view.field.available),
                );
                if let Some(value) = view.field.value {
                    fields.insert("value".to_string(), FieldValue::Float(value));
                }
                if let Some(raw) = &view.field.raw_hex {
                    fields.insert("raw_bytes".to_string(), FieldValue::String(raw.clone()));
                }
            }
            Event::Liveness(view) => {
                tags.insert("mac".to_string(), view.address.to_string());
                tags.insert("name".to_string(), view.device.clone());
                fields.insert("online".to_string(), FieldValue::Boolean(view.online));
            }
        }

        DataPoint {
            measurement: self.measurement_name.clone(),
            tag_set: tags,
            field_set: fields,
        }
    }
}

impl OutputFormatter for InfluxDbFormatter {
    fn format(&self, event: &Event) -> String {
        self.to_data_point(event).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedField;
    use crate::event::{AdvertisementView, LivenessView, RuleView};
    use crate::rule::{DecodeRule, RuleId, RuleSpec, SourceType};
    use crate::test_utils::{TEST_MAC, manufacturer_snapshot};

    #[test]
    fn test_field_value_display() {
        assert_eq!(format!("{}", FieldValue::Float(3.25)), "3.25");
        assert_eq!(format!("{}", FieldValue::Integer(-60)), "-60i");
        assert_eq!(format!("{}", FieldValue::Boolean(true)), "true");
        assert_eq!(
            format!("{}", FieldValue::String("a \"b\"".to_string())),
            "\"a \\\"b\\\"\""
        );
    }

    #[test]
    fn test_data_point_format() {
        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), "Living Room".to_string());
        tags.insert("mac".to_string(), "AA:BB".to_string());

        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), FieldValue::Float(32.0));
        fields.insert("available".to_string(), FieldValue::Boolean(true));

        let data_point = DataPoint {
            measurement: "test".to_string(),
            tag_set: tags,
            field_set: fields,
        };

        assert_eq!(
            data_point.to_string(),
            "test,mac=AA:BB,name=Living\\ Room available=true,value=32"
        );
    }

    #[test]
    fn test_format_advertisement() {
        let mut snapshot = manufacturer_snapshot(76, &[0x00], 1.0);
        snapshot.tx_power = Some(4);
        let formatter = InfluxDbFormatter::new("ble".to_string());
        let line = formatter.format(&Event::Advertisement(AdvertisementView::new(
            "Sauna", &snapshot,
        )));
        assert_eq!(line, "ble,mac=AA:BB:CC:DD:EE:FF,name=Sauna rssi=-60i,tx_power=4i");
    }

    #[test]
    fn test_format_rule_available_and_unavailable() {
        let snapshot = manufacturer_snapshot(76, &[0x00], 1.0);
        let rule = DecodeRule::new(
            RuleId::from("t"),
            RuleSpec::new("Temp", SourceType::Raw),
        )
        .unwrap();
        let formatter = InfluxDbFormatter::new("ble".to_string());

        let field = DecodedField {
            available: true,
            value: Some(21.5),
            raw_hex: Some("d7".to_string()),
        };
        let line = formatter.format(&Event::Rule(RuleView::new("Sauna", &snapshot, &rule, field)));
        assert_eq!(
            line,
            "ble,mac=AA:BB:CC:DD:EE:FF,name=Sauna,rule=Temp available=true,raw_bytes=\"d7\",value=21.5"
        );

        let line = formatter.format(&Event::Rule(RuleView::new(
            "Sauna",
            &snapshot,
            &rule,
            DecodedField::unavailable(),
        )));
        assert!(line.ends_with(" available=false"));
        assert!(!line.contains("value="));
    }

    #[test]
    fn test_format_liveness() {
        let formatter = InfluxDbFormatter::new("ble".to_string());
        let line = formatter.format(&Event::Liveness(LivenessView::new("Sauna", TEST_MAC, false)));
        assert_eq!(line, "ble,mac=AA:BB:CC:DD:EE:FF,name=Sauna online=false");
    }
}
