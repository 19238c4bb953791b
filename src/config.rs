//! Emulator configuration.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bridge::BridgeIdentity;
use crate::errors::Error;
use crate::ssdp::{DEFAULT_ADDRESS, DIAL_TARGET, DiscoveryResponder, Network};

type Result<T> = std::result::Result<T, Error>;

/// Username handed out to every controller that registers.
pub const API_USERNAME: &str = "83b7780291a6ceffbe0bd049104df";

const DEFAULT_DATABASE: &str = "database.db";
const DEFAULT_SERIAL: &str = "001788FFFE23BFC1";
const DEFAULT_UUID: Uuid = Uuid::from_u128(0x2f402f80_da50_11e1_9b23_001788255acc);

/// Seed values of one emulated bridge.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSeed {
    pub serial_number: String,
    pub uuid: Uuid,
}

impl Default for BridgeSeed {
    fn default() -> Self {
        BridgeSeed {
            serial_number: DEFAULT_SERIAL.to_string(),
            uuid: DEFAULT_UUID,
        }
    }
}

/// Settings of the discovery listener and responder.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryConfig {
    pub network: Network,
    pub address: String,
    pub interface: Option<String>,
    /// Answer only these senders; everyone when absent.
    pub allowed_senders: Option<Vec<IpAddr>>,
    pub excluded_targets: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            network: Network::default(),
            address: DEFAULT_ADDRESS.to_string(),
            interface: None,
            allowed_senders: None,
            excluded_targets: vec![DIAL_TARGET.to_string()],
        }
    }
}

/// Everything needed to start an emulated bridge.
///
/// # Example
///
/// ```
/// use hue_bridge_emulator::EmulatorConfig;
///
/// let config = EmulatorConfig::from_json(r#"{"address": "10.0.0.2:80"}"#).unwrap();
/// let bridges = config.bridge_identities();
/// assert_eq!(bridges.len(), 1);
/// assert_eq!(
///     bridges[0].location(),
///     "http://10.0.0.2:80/bridge/001788FFFE23BFC1/device.xml"
/// );
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmulatorConfig {
    /// Address the request-serving side listens on, `host:port`.
    pub address: String,
    #[serde(default = "default_database")]
    pub database_path: String,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default = "default_bridges")]
    pub bridges: Vec<BridgeSeed>,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_bridges() -> Vec<BridgeSeed> {
    vec![BridgeSeed::default()]
}

impl EmulatorConfig {
    pub fn new(address: &str) -> Self {
        EmulatorConfig {
            address: address.to_string(),
            database_path: default_database(),
            discovery: DiscoveryConfig::default(),
            bridges: default_bridges(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(Error::JsonLoad)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `ADDRESS` (required), `DATABASE_PATH`, `SSDP_INTERFACE` and
    /// `SSDP_ALLOW` (comma separated IPs) from the environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F: Fn(&str) -> Option<String>>(var: F) -> Result<Self> {
        let address = var("ADDRESS")
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::Config("ADDRESS environment variable not set".into()))?;

        let mut config = Self::new(&address);
        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = path;
        }
        config.discovery.interface = var("SSDP_INTERFACE").filter(|i| !i.is_empty());
        if let Some(allow) = var("SSDP_ALLOW") {
            let senders = allow
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<IpAddr>()
                        .map_err(|e| Error::Config(format!("SSDP_ALLOW entry {s}: {e}")))
                })
                .collect::<Result<Vec<_>>>()?;
            config.discovery.allowed_senders = Some(senders);
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::Config("address is empty".into()));
        }
        if self.bridges.is_empty() {
            return Err(Error::Config("no bridges configured".into()));
        }
        for (n, seed) in self.bridges.iter().enumerate() {
            if self.bridges[..n]
                .iter()
                .any(|other| other.serial_number == seed.serial_number)
            {
                return Err(Error::Config(format!(
                    "duplicate bridge serial {}",
                    seed.serial_number
                )));
            }
        }
        Ok(())
    }

    /// The fixed identities presented by this emulator.
    pub fn bridge_identities(&self) -> Vec<BridgeIdentity> {
        self.bridges
            .iter()
            .map(|seed| BridgeIdentity::for_address(&seed.serial_number, seed.uuid, &self.address))
            .collect()
    }

    /// A responder for the configured bridges and filters.
    pub fn responder(&self) -> DiscoveryResponder {
        let responder = DiscoveryResponder::new(self.bridge_identities())
            .with_excluded_targets(self.discovery.excluded_targets.clone());
        match &self.discovery.allowed_senders {
            Some(allowed) => responder.with_allowed_senders(allowed.clone()),
            None => responder,
        }
    }
}
