//! Partial state updates and the bridge's per-field acknowledgements.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::light::{ColorMode, Light};

/// Highest brightness and saturation a light reports.
const MAX_LEVEL: u8 = 254;

/// A partial update of a light's state.
///
/// Every field is optional; absent fields leave the light untouched. `effect`,
/// `xy` and `alert` are accepted for compatibility but not applied, so `xy`
/// takes any number of coordinates.
///
/// # Example
///
/// ```
/// use hue_bridge_emulator::StateChange;
///
/// let patch: StateChange = serde_json::from_str(r#"{"on": false}"#).unwrap();
/// assert_eq!(patch.on, Some(false));
/// assert_eq!(patch.bri, None);
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub on: Option<bool>,
    pub bri: Option<u8>,
    pub hue: Option<u16>,
    pub sat: Option<u8>,
    pub effect: Option<String>,
    pub xy: Option<Vec<f64>>,
    pub ct: Option<u16>,
    pub alert: Option<String>,
}

impl StateChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, on: bool) -> Self {
        self.on = Some(on);
        self
    }

    pub fn bri(mut self, bri: u8) -> Self {
        self.bri = Some(bri);
        self
    }

    pub fn hue(mut self, hue: u16) -> Self {
        self.hue = Some(hue);
        self
    }

    pub fn sat(mut self, sat: u8) -> Self {
        self.sat = Some(sat);
        self
    }

    pub fn ct(mut self, ct: u16) -> Self {
        self.ct = Some(ct);
        self
    }
}

/// One applied field, reported as `{"success": {"/lights/<id>/state/<field>": value}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    pub path: String,
    pub value: Value,
}

impl Acknowledgement {
    fn new(id: &str, field: &str, value: impl Into<Value>) -> Self {
        Acknowledgement {
            path: format!("/lights/{id}/state/{field}"),
            value: value.into(),
        }
    }
}

impl Serialize for Acknowledgement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Success<'a>(&'a Acknowledgement);

        impl Serialize for Success<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&self.0.path, &self.0.value)?;
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("success", &Success(self))?;
        map.end()
    }
}

/// Apply `patch` to the state of `light`, stored as `id`.
///
/// Fields are applied in the order on, bri, hue, sat, ct and each produces
/// one acknowledgement. Setting hue or sat switches the color mode to `hs`,
/// setting ct switches it to `ct`. Brightness and saturation above 254 are
/// clamped, and the acknowledgement carries the stored value. Nothing is
/// persisted here.
pub fn apply_state_change(light: &mut Light, id: &str, patch: &StateChange) -> Vec<Acknowledgement> {
    let state = &mut light.state;
    let mut acks = Vec::new();

    if let Some(on) = patch.on {
        state.on = on;
        acks.push(Acknowledgement::new(id, "on", on));
    }
    if let Some(bri) = patch.bri {
        let bri = bri.min(MAX_LEVEL);
        state.bri = bri;
        acks.push(Acknowledgement::new(id, "bri", bri));
    }
    if let Some(hue) = patch.hue {
        state.hue = hue;
        state.color_mode = ColorMode::Hs;
        acks.push(Acknowledgement::new(id, "hue", hue));
    }
    if let Some(sat) = patch.sat {
        let sat = sat.min(MAX_LEVEL);
        state.sat = sat;
        state.color_mode = ColorMode::Hs;
        acks.push(Acknowledgement::new(id, "sat", sat));
    }
    if let Some(ct) = patch.ct {
        state.ct = ct;
        state.color_mode = ColorMode::Ct;
        acks.push(Acknowledgement::new(id, "ct", ct));
    }

    acks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::LightState;
    use serde_json::json;

    fn stored_light() -> Light {
        let mut light = Light::new("Desk");
        light.apply_defaults("1");
        light
    }

    #[test]
    fn test_single_field() {
        let mut light = stored_light();
        let before = light.state.clone();

        let acks = apply_state_change(&mut light, "1", &StateChange::new().on(false));

        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].path, "/lights/1/state/on");
        assert_eq!(acks[0].value, json!(false));

        let expected = LightState { on: false, ..before };
        assert_eq!(light.state, expected);
    }

    #[test]
    fn test_levels_clamp_to_254() {
        let mut light = stored_light();
        let acks = apply_state_change(&mut light, "1", &StateChange::new().bri(255).sat(255));

        assert_eq!(light.state.bri, 254);
        assert_eq!(light.state.sat, 254);
        assert_eq!(acks[0].value, json!(254));
        assert_eq!(acks[1].value, json!(254));
    }

    #[test]
    fn test_odd_xy_does_not_reject_patch() {
        let mut light = stored_light();
        let before = light.state.clone();
        let patch: StateChange =
            serde_json::from_value(json!({"on": false, "xy": [0.3, 0.3, 0.1]})).unwrap();

        let acks = apply_state_change(&mut light, "1", &patch);
        assert_eq!(acks.len(), 1);
        assert_eq!(light.state, LightState { on: false, ..before });
    }

    #[test]
    fn test_hue_and_sat_switch_to_hs() {
        let mut light = stored_light();
        let acks = apply_state_change(&mut light, "4", &StateChange::new().hue(500).sat(200));

        let paths: Vec<_> = acks.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, ["/lights/4/state/hue", "/lights/4/state/sat"]);
        assert_eq!(light.state.color_mode, ColorMode::Hs);
        assert_eq!(light.state.hue, 500);
        assert_eq!(light.state.sat, 200);
    }

    #[test]
    fn test_ct_wins_when_last() {
        let mut light = stored_light();
        let acks = apply_state_change(&mut light, "1", &StateChange::new().hue(1).ct(153));
        assert_eq!(acks.len(), 2);
        assert_eq!(light.state.color_mode, ColorMode::Ct);
        assert_eq!(light.state.ct, 153);
    }

    #[test]
    fn test_fixed_order() {
        let mut light = stored_light();
        let patch: StateChange =
            serde_json::from_value(json!({"ct": 200, "sat": 1, "hue": 2, "bri": 3, "on": true}))
                .unwrap();
        let acks = apply_state_change(&mut light, "7", &patch);

        let fields: Vec<_> = acks
            .iter()
            .map(|a| a.path.rsplit('/').next().unwrap())
            .collect();
        assert_eq!(fields, ["on", "bri", "hue", "sat", "ct"]);
    }

    #[test]
    fn test_empty_patch() {
        let mut light = stored_light();
        let before = light.clone();
        let patch: StateChange =
            serde_json::from_value(json!({"effect": "colorloop", "alert": "select", "xy": [0.3, 0.3]}))
                .unwrap();

        assert!(apply_state_change(&mut light, "1", &patch).is_empty());
        assert_eq!(light, before);
    }

    #[test]
    fn test_explicit_null_is_absent() {
        let patch: StateChange = serde_json::from_value(json!({"on": null, "bri": 0})).unwrap();
        assert_eq!(patch.on, None);
        assert_eq!(patch.bri, Some(0));
    }

    #[test]
    fn test_acknowledgement_wire_shape() {
        let mut light = stored_light();
        let acks = apply_state_change(&mut light, "2", &StateChange::new().on(true).bri(10));
        assert_eq!(
            serde_json::to_value(&acks).unwrap(),
            json!([
                {"success": {"/lights/2/state/on": true}},
                {"success": {"/lights/2/state/bri": 10}},
            ])
        );
    }

    #[test]
    fn test_patch_serialization_skips_absent() {
        let value = serde_json::to_value(StateChange::new().ct(300)).unwrap();
        assert_eq!(value, json!({"ct": 300}));
    }
}
