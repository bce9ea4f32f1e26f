//! In-memory tuning parameters
//!
//! Updates are merged into the current map. A payload that is not a flat
//! object of numbers, or that names a key outside the whitelist, is rejected
//! as a whole and leaves the stored values untouched.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::config::SettingsConfig;
use crate::error::SettingsError;
use crate::protocol::Settings;

/// Thread-safe settings map
pub struct SettingsStore {
    values: RwLock<Settings>,

    /// Accepted keys; `None` accepts anything
    allowed: Option<BTreeSet<String>>,
}

impl SettingsStore {
    /// Create a store with initial values and an optional whitelist
    pub fn new(initial: Settings, allowed: Option<BTreeSet<String>>) -> Self {
        Self {
            values: RwLock::new(initial),
            allowed,
        }
    }

    pub fn from_config(config: &SettingsConfig) -> Self {
        let allowed = if config.allowed_keys.is_empty() {
            None
        } else {
            Some(config.allowed_keys.iter().cloned().collect())
        };
        Self::new(config.initial.clone(), allowed)
    }

    /// Current settings
    pub fn get(&self) -> Settings {
        self.values.read().clone()
    }

    /// Merge a raw JSON body
    pub fn update_json(&self, body: &[u8]) -> Result<Settings, SettingsError> {
        let payload: Value =
            serde_json::from_slice(body).map_err(|e| SettingsError::Malformed(e.to_string()))?;
        self.update(&payload)
    }

    /// Merge a parsed payload and return the resulting settings
    pub fn update(&self, payload: &Value) -> Result<Settings, SettingsError> {
        let updates = self.parse(payload)?;

        let mut values = self.values.write();
        values.extend(updates);
        Ok(values.clone())
    }

    fn parse(&self, payload: &Value) -> Result<Settings, SettingsError> {
        let object = match payload {
            Value::Object(object) => object,
            other => return Err(SettingsError::NotAnObject(json_kind(other))),
        };

        let mut parsed = Settings::new();
        for (key, value) in object {
            if let Some(allowed) = &self.allowed {
                if !allowed.contains(key) {
                    return Err(SettingsError::UnknownKey(key.clone()));
                }
            }

            let number = coerce_number(value).ok_or_else(|| SettingsError::NotNumeric(key.clone()))?;
            if !number.is_finite() {
                return Err(SettingsError::NotFinite(key.clone()));
            }
            parsed.insert(key.clone(), number);
        }
        Ok(parsed)
    }
}

/// Numbers pass through, numeric strings are coerced
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
