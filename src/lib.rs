//! # hue_bridge_emulator
//!
//! Emulates the network presence and light API core of a Hue bridge, so that
//! controller software treats this process as a real bridge.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hue_bridge_emulator::{EmulatorConfig, LightRegistry, Light, runtime};
//! use hue_bridge_emulator::ssdp::DiscoveryListener;
//! use hue_bridge_emulator::store::SqliteStore;
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmulatorConfig::from_env()?;
//!
//!     // Lights survive restarts in a SQLite file
//!     let registry = LightRegistry::open(SqliteStore::open(&config.database_path)?)?;
//!     registry.put(Light::new("Living Room"))?;
//!
//!     // Answer discovery probes for every configured bridge
//!     let responder = config.responder();
//!     let listener = DiscoveryListener::listen(
//!         config.discovery.network,
//!         &config.discovery.address,
//!         config.discovery.interface.as_deref(),
//!     )?;
//!     let shutdown = listener.shutdown_handle();
//!     runtime::spawn(async move { listener.read(&responder).await });
//!
//!     // ... later
//!     shutdown.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Discovery**: SSDP `M-SEARCH` probes on `239.255.255.250:1900` are answered
//!   with one unicast reply per emulated bridge, see [`ssdp`]
//! - **Light Registry**: lights persist in a transactional [`store`], ids are the
//!   smallest unused positive integers and names are unique at creation
//! - **State Changes**: partial updates produce the bridge's per-field
//!   `success` acknowledgements, see [`apply_state_change`]
//! - **Runtime Agnostic**: the discovery path runs on tokio, async-std or smol
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime

mod bridge;
mod config;
mod errors;
mod light;
mod registry;
pub mod runtime;
pub mod ssdp;
mod state;
pub mod store;

// Re-export public API
pub use bridge::BridgeIdentity;
pub use config::{API_USERNAME, BridgeSeed, DiscoveryConfig, EmulatorConfig};
pub use errors::Error;
pub use light::{ColorMode, Light, LightState};
pub use registry::{LightRegistry, create_response};
pub use state::{Acknowledgement, StateChange, apply_state_change};
