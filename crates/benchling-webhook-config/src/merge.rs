//! Layer precedence: deploy > derived > user
//!
//! Distinct from source precedence in [`crate::sources::load_config`], which
//! runs the other way round (CLI > env > dotenv > default).

use crate::types::Layer;
use serde_json::{Map, Value};

/// Partial JSON documents for each layer of one profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSet {
    pub user: Option<Value>,
    pub derived: Option<Value>,
    pub deploy: Option<Value>,
}

impl LayerSet {
    pub fn get(&self, layer: Layer) -> Option<&Value> {
        match layer {
            Layer::User => self.user.as_ref(),
            Layer::Derived => self.derived.as_ref(),
            Layer::Deploy => self.deploy.as_ref(),
        }
    }

    pub fn set(&mut self, layer: Layer, value: Value) {
        match layer {
            Layer::User => self.user = Some(value),
            Layer::Derived => self.derived = Some(value),
            Layer::Deploy => self.deploy = Some(value),
        }
    }
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key. Any other overlay value replaces the base value,
/// except `null`, which leaves the base untouched.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => {
                        if !overlay_val.is_null() {
                            base_map.insert(key.clone(), overlay_val.clone());
                        }
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Merge whichever layers are present, lowest precedence first.
pub fn merge_layers(layers: &LayerSet) -> Value {
    let mut merged = Value::Object(Map::new());
    for layer in Layer::ALL {
        if let Some(value) = layers.get(layer) {
            deep_merge(&mut merged, value);
        }
    }
    merged
}
