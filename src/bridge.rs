//! Identity of an emulated bridge.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The serial number / UUID / location triple a bridge presents to controllers.
///
/// Identities are built once at startup, after the request-serving address is
/// known, and are not changed afterwards.
///
/// # Example
///
/// ```
/// use hue_bridge_emulator::BridgeIdentity;
/// use uuid::Uuid;
///
/// let uuid = Uuid::parse_str("2f402f80-da50-11e1-9b23-001788255acc").unwrap();
/// let bridge = BridgeIdentity::for_address("001788FFFE23BFC1", uuid, "10.0.0.2:80");
/// assert_eq!(
///     bridge.location(),
///     "http://10.0.0.2:80/bridge/001788FFFE23BFC1/device.xml"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeIdentity {
    serial_number: String,
    uuid: Uuid,
    location: String,
}

impl BridgeIdentity {
    pub fn new(serial_number: &str, uuid: Uuid, location: &str) -> Self {
        BridgeIdentity {
            serial_number: serial_number.to_string(),
            uuid,
            location: location.to_string(),
        }
    }

    /// Build an identity whose description document is served from `address`.
    pub fn for_address(serial_number: &str, uuid: Uuid, address: &str) -> Self {
        let location = format!("http://{address}/bridge/{serial_number}/device.xml");
        Self::new(serial_number, uuid, &location)
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}
