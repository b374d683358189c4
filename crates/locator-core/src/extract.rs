//! Payload extractors turning raw node data into locations.

use serde::Deserialize;
use tracing::debug;

use crate::Location;

/// Maps a raw payload to a `Location`.
///
/// Returning `None` means "this payload is not usable"; callers drop it
/// silently rather than treating it as an error.
pub trait DataExtractor: Send + Sync {
    fn extract(&self, data: &[u8]) -> Option<Location>;
}

impl<F> DataExtractor for F
where
    F: Fn(&[u8]) -> Option<Location> + Send + Sync,
{
    fn extract(&self, data: &[u8]) -> Option<Location> {
        self(data)
    }
}

/// Registration payload written by services into their coordination node.
#[derive(Debug, Deserialize)]
struct AddressPayload {
    address: Option<String>,
    port: Option<serde_json::Value>,
}

/// Default extractor: JSON object with required `address` and `port`.
///
/// `{"address": "10.0.0.1", "port": 9000}` becomes `10.0.0.1:9000`.
/// Missing, empty or zero fields and unparseable JSON yield `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAddressExtractor;

impl DataExtractor for JsonAddressExtractor {
    fn extract(&self, data: &[u8]) -> Option<Location> {
        let payload: AddressPayload = match serde_json::from_slice(data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Discarding unparseable node payload");
                return None;
            }
        };

        let address = payload.address.filter(|a| !a.is_empty())?;
        let port = payload.port.as_ref().and_then(port_from_json)?;

        Some(Location::new(address, port))
    }
}

/// Accepts numeric ports and numeric strings; rejects zero and out-of-range.
pub fn port_from_json(value: &serde_json::Value) -> Option<u16> {
    let port = match value {
        serde_json::Value::Number(n) => n.as_u64()?,
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u16::try_from(port).ok().filter(|p| *p != 0)
}
