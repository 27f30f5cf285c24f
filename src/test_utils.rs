use crate::mac_address::MacAddress;
use crate::rule::{DecodeRule, RuleId, RuleSpec};
use crate::snapshot::AdvertisementSnapshot;

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Validate `spec` under a fixed id, panicking on invalid specs.
pub fn rule(spec: RuleSpec) -> DecodeRule {
    DecodeRule::new(RuleId::from("test"), spec).unwrap()
}

/// A snapshot for [`TEST_MAC`] carrying a single manufacturer data block.
pub fn manufacturer_snapshot(company: u16, data: &[u8], timestamp: f64) -> AdvertisementSnapshot {
    let mut snapshot = AdvertisementSnapshot::new(TEST_MAC, -60, timestamp);
    snapshot.manufacturer_data.insert(company, data.to_vec());
    snapshot
}
