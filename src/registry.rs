//! The durable light registry.

use std::collections::BTreeMap;

use log::debug;
use serde_json::{Value, json};

use crate::errors::Error;
use crate::light::Light;
use crate::state::{Acknowledgement, StateChange, apply_state_change};
use crate::store::{Store, Transaction};

type Result<T> = std::result::Result<T, Error>;

const LIGHTS: &str = "lights";

/// Stores lights keyed by their decimal id.
///
/// Every operation runs in a single store transaction, so id allocation and
/// the duplicate-name check hold under concurrent callers without any locking
/// here.
///
/// # Example
///
/// ```
/// use hue_bridge_emulator::{Light, LightRegistry, StateChange};
/// use hue_bridge_emulator::store::MemoryStore;
///
/// let registry = LightRegistry::open(MemoryStore::new()).unwrap();
/// let (light, id) = registry.put(Light::new("Kitchen")).unwrap();
/// assert_eq!(id, "1");
/// assert_eq!(light.model_id, "LCT007");
///
/// let acks = registry.apply_state(&id, &StateChange::new().on(false)).unwrap();
/// assert_eq!(acks[0].path, "/lights/1/state/on");
/// assert!(!registry.get(&id).unwrap().state.on);
/// ```
pub struct LightRegistry<S: Store> {
    store: S,
}

impl<S: Store> LightRegistry<S> {
    /// Wrap `store`, creating the lights bucket if needed.
    pub fn open(store: S) -> Result<Self> {
        store.update(|tx| tx.create_bucket_if_not_exists(LIGHTS))?;
        Ok(LightRegistry { store })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store a new light under the smallest unused positive id.
    ///
    /// Fails with [`Error::DuplicateName`] and changes nothing if a stored
    /// light already has this name.
    pub fn put(&self, mut light: Light) -> Result<(Light, String)> {
        let id = self.store.update(|tx| {
            let existing = load_all(tx)?;
            if existing.values().any(|known| known.name == light.name) {
                return Err(Error::DuplicateName(light.name.clone()));
            }

            // Linear scan; fine for the tens of lights a bridge holds
            let id = (1u64..)
                .map(|n| n.to_string())
                .find(|candidate| !existing.contains_key(candidate))
                .unwrap_or_default();

            light.apply_defaults(&id);
            save(tx, &id, &light)?;
            Ok(id)
        })?;

        debug!("stored light {} as {}", light.name, id);
        Ok((light, id))
    }

    pub fn get(&self, id: &str) -> Result<Light> {
        self.store.view(|tx| load(tx, id))
    }

    /// All stored lights by id, in storage key order.
    pub fn list(&self) -> Result<BTreeMap<String, Light>> {
        self.store.view(|tx| load_all(tx))
    }

    /// Replace the stored record of `id`. Names are not re-checked.
    pub fn update(&self, id: &str, light: &Light) -> Result<()> {
        self.store.update(|tx| {
            require(tx, id)?;
            let mut light = light.clone();
            light.set_id(id);
            save(tx, id, &light)
        })
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.update(|tx| {
            require(tx, id)?;
            tx.delete(LIGHTS, id)
        })?;
        debug!("deleted light {}", id);
        Ok(())
    }

    /// Apply `patch` to light `id` and write it back.
    ///
    /// A failure to write back after the change was applied is reported as
    /// [`Error::StatePersist`].
    pub fn apply_state(&self, id: &str, patch: &StateChange) -> Result<Vec<Acknowledgement>> {
        let mut light = self.get(id)?;
        let acks = apply_state_change(&mut light, id, patch);
        self.update(id, &light)
            .map_err(|e| Error::state_persist(id, e))?;
        Ok(acks)
    }
}

/// The `{id: light}` body returned after a successful create.
pub fn create_response(light: &Light, id: &str) -> Result<Value> {
    let light = serde_json::to_value(light).map_err(Error::JsonDump)?;
    Ok(json!({ id: light }))
}

fn require(tx: &dyn Transaction, id: &str) -> Result<()> {
    match tx.get(LIGHTS, id)? {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(id.to_string())),
    }
}

fn load(tx: &dyn Transaction, id: &str) -> Result<Light> {
    let data = tx
        .get(LIGHTS, id)?
        .ok_or_else(|| Error::NotFound(id.to_string()))?;
    decode(id, &data)
}

fn load_all(tx: &dyn Transaction) -> Result<BTreeMap<String, Light>> {
    tx.entries(LIGHTS)?
        .into_iter()
        .map(|(id, data)| decode(&id, &data).map(|light| (id, light)))
        .collect()
}

fn decode(id: &str, data: &[u8]) -> Result<Light> {
    let mut light: Light = serde_json::from_slice(data).map_err(Error::JsonLoad)?;
    light.set_id(id);
    Ok(light)
}

fn save(tx: &mut dyn Transaction, id: &str, light: &Light) -> Result<()> {
    let data = serde_json::to_vec(light).map_err(Error::JsonDump)?;
    tx.put(LIGHTS, id, &data)
}
