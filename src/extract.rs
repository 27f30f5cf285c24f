//! Field extraction: pick the byte block a rule points at.
//!
//! Extraction is total. Anything that cannot be resolved (bad key, missing
//! company id, absent raw payload) is simply "not found".

use crate::rule::{DecodeRule, SourceType};
use crate::snapshot::AdvertisementSnapshot;

/// Parse a manufacturer key as a 16-bit company id.
///
/// Accepts decimal or `0x`-prefixed hex, surrounding whitespace ignored.
///
/// ```
/// use ble_advert_data::extract::parse_company_id;
///
/// assert_eq!(parse_company_id("0x004C"), Some(76));
/// assert_eq!(parse_company_id("76"), Some(76));
/// assert_eq!(parse_company_id("apple"), None);
/// ```
pub fn parse_company_id(key: &str) -> Option<u16> {
    let key = key.trim();
    match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => key.parse().ok(),
    }
}

/// Select the source bytes for `rule` from `snapshot`.
pub fn extract<'a>(snapshot: &'a AdvertisementSnapshot, rule: &DecodeRule) -> Option<&'a [u8]> {
    match rule.source_type() {
        SourceType::Manufacturer => {
            let key = rule.source_key().filter(|k| !k.is_empty())?;
            let company = parse_company_id(key)?;
            snapshot.manufacturer_data.get(&company).map(Vec::as_slice)
        }
        SourceType::Service => {
            let key = rule.source_key().filter(|k| !k.is_empty())?;
            service_data(snapshot, key)
        }
        SourceType::Raw => snapshot.raw_payload.as_deref(),
    }
}

/// Exact key first, then the fully lower-cased key.
fn service_data<'a>(snapshot: &'a AdvertisementSnapshot, key: &str) -> Option<&'a [u8]> {
    snapshot
        .service_data
        .get(key)
        .or_else(|| snapshot.service_data.get(&key.to_lowercase()))
        .map(Vec::as_slice)
}
