//! Light records as the bridge API presents them.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Which color model currently governs a light.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColorMode {
    /// Hue and saturation
    Hs,
    /// CIE chromaticity coordinates
    Xy,
    /// Color temperature
    #[default]
    Ct,
}

/// Current state of a light.
///
/// `mode` and `reachable` are reported to controllers but never changed by a
/// state update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightState {
    pub on: bool,
    /// Brightness, 0-254
    pub bri: u8,
    /// 0-65535
    pub hue: u16,
    /// Saturation, 0-254
    pub sat: u8,
    pub effect: String,
    pub xy: [f64; 2],
    /// Color temperature in mired
    pub ct: u16,
    pub alert: String,
    #[serde(rename = "colormode")]
    pub color_mode: ColorMode,
    pub mode: String,
    pub reachable: bool,
}

impl Default for LightState {
    /// The state a freshly created light reports.
    fn default() -> Self {
        LightState {
            on: true,
            bri: 254,
            hue: 0,
            sat: 0,
            effect: "none".to_string(),
            xy: [0.0, 0.0],
            ct: 366,
            alert: "none".to_string(),
            color_mode: ColorMode::Ct,
            mode: "homeautomation".to_string(),
            reachable: true,
        }
    }
}

/// A light stored by the registry.
///
/// The id is the storage key. It is assigned on creation and is not part of
/// the serialized record.
///
/// # Example
///
/// ```
/// use hue_bridge_emulator::Light;
///
/// let light = Light::new("Kitchen");
/// assert_eq!(light.name, "Kitchen");
/// assert!(light.id().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    #[serde(skip)]
    id: String,
    pub state: LightState,
    #[serde(rename = "type")]
    pub light_type: String,
    pub name: String,
    #[serde(rename = "modelid")]
    pub model_id: String,
    #[serde(rename = "manufacturername")]
    pub manufacturer_name: String,
    #[serde(rename = "uniqueid")]
    pub unique_id: String,
    #[serde(rename = "swversion")]
    pub sw_version: String,
}

impl Light {
    pub const DEFAULT_TYPE: &'static str = "Extended color light";
    pub const DEFAULT_MODEL_ID: &'static str = "LCT007";
    pub const DEFAULT_MANUFACTURER: &'static str = "Philips";
    pub const DEFAULT_SW_VERSION: &'static str = "66012040";
    const UNIQUE_ID_PREFIX: &'static str = "00:17:88:01:00:bd:c7:b9-";

    pub fn new(name: &str) -> Self {
        Light {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Empty until the light has been stored.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    /// Fill in creation defaults for the light about to be stored as `id`.
    ///
    /// Identity fields are only filled when empty. The state is always reset
    /// to the bridge's initial state.
    pub(crate) fn apply_defaults(&mut self, id: &str) {
        fill(&mut self.light_type, Self::DEFAULT_TYPE);
        fill(&mut self.model_id, Self::DEFAULT_MODEL_ID);
        fill(&mut self.manufacturer_name, Self::DEFAULT_MANUFACTURER);
        if self.unique_id.is_empty() {
            self.unique_id = format!("{}{:0>2}", Self::UNIQUE_ID_PREFIX, id);
        }
        fill(&mut self.sw_version, Self::DEFAULT_SW_VERSION);

        self.state = LightState::default();
        self.set_id(id);
    }
}

fn fill(field: &mut String, default: &str) {
    if field.is_empty() {
        *field = default.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_defaults_fill_empty_fields() {
        let mut light = Light::new("Desk");
        light.apply_defaults("1");

        assert_eq!(light.id(), "1");
        assert_eq!(light.light_type, "Extended color light");
        assert_eq!(light.model_id, "LCT007");
        assert_eq!(light.manufacturer_name, "Philips");
        assert_eq!(light.unique_id, "00:17:88:01:00:bd:c7:b9-01");
        assert_eq!(light.sw_version, "66012040");
        assert_eq!(light.state.color_mode, ColorMode::Ct);
        assert_eq!(light.state.alert, "none");
    }

    #[test]
    fn test_defaults_keep_supplied_fields() {
        let mut light = Light {
            light_type: "Dimmable light".into(),
            model_id: "LWB010".into(),
            manufacturer_name: "Signify".into(),
            unique_id: "custom".into(),
            sw_version: "1.0".into(),
            ..Light::new("Hall")
        };
        light.apply_defaults("12");

        assert_eq!(light.light_type, "Dimmable light");
        assert_eq!(light.model_id, "LWB010");
        assert_eq!(light.manufacturer_name, "Signify");
        assert_eq!(light.unique_id, "custom");
        assert_eq!(light.sw_version, "1.0");
    }

    #[test]
    fn test_unique_id_is_not_truncated() {
        let mut light = Light::new("Porch");
        light.apply_defaults("123");
        assert_eq!(light.unique_id, "00:17:88:01:00:bd:c7:b9-123");
    }

    #[test]
    fn test_wire_format() {
        let mut light = Light::new("Desk");
        light.apply_defaults("3");
        let value = serde_json::to_value(&light).unwrap();

        assert_eq!(value["modelid"], json!("LCT007"));
        assert_eq!(value["type"], json!("Extended color light"));
        assert_eq!(value["state"]["colormode"], json!("ct"));
        assert_eq!(value["state"]["xy"], json!([0.0, 0.0]));
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_partial_record_deserializes() {
        let light: Light = serde_json::from_value(json!({"name": "Lamp"})).unwrap();
        assert_eq!(light.name, "Lamp");
        assert!(light.model_id.is_empty());
    }

    #[test]
    fn test_color_mode_strings() {
        assert_eq!(ColorMode::Hs.to_string(), "hs");
        assert_eq!(ColorMode::from_str("xy").unwrap(), ColorMode::Xy);
        assert!(ColorMode::from_str("rgb").is_err());
    }
}
