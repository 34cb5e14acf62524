// Bookmark Sentinel Settings Engine
// Loads, saves, updates and resets the extension settings blob.
// Settings live as JSON under the `settings` key of the key-value store.

use std::sync::{Arc, Mutex};

use crate::services::kv_store::{KeyValueStore, SETTINGS_KEY};
use crate::types::errors::SettingsError;
use crate::types::settings::ExtensionSettings;

/// Settings engine over the persistent key-value store.
///
/// Methods take `&self` so the engine can be shared with the verification
/// scheduler, which reads the credential before every safety pass.
pub struct SettingsEngine {
    store: Arc<dyn KeyValueStore>,
    settings: Mutex<ExtensionSettings>,
}

impl SettingsEngine {
    /// Creates an engine holding default settings. Call [`load`](Self::load)
    /// to read the persisted blob.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            settings: Mutex::new(ExtensionSettings::default()),
        }
    }

    /// Loads settings from the store.
    ///
    /// A missing blob yields defaults. A malformed blob is a serialization error.
    pub fn load(&self) -> Result<ExtensionSettings, SettingsError> {
        let loaded = match self.store.get(SETTINGS_KEY)? {
            None => ExtensionSettings::default(),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                SettingsError::Serialization(format!("Failed to parse settings: {}", e))
            })?,
        };
        *self.lock() = loaded.clone();
        Ok(loaded)
    }

    /// Writes the current in-memory settings to the store.
    pub fn save(&self) -> Result<(), SettingsError> {
        let json = serde_json::to_string(&*self.lock()).map_err(|e| {
            SettingsError::Serialization(format!("Failed to serialize settings: {}", e))
        })?;
        self.store.set(SETTINGS_KEY, &json)?;
        Ok(())
    }

    pub fn get_settings(&self) -> ExtensionSettings {
        self.lock().clone()
    }

    /// The safety-service credential, or `None` when blank.
    pub fn safety_credential(&self) -> Option<String> {
        let key = self.lock().virus_total_api_key.trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Stores a new credential (trimmed) and persists.
    pub fn set_api_key(&self, api_key: &str) -> Result<(), SettingsError> {
        self.lock().virus_total_api_key = api_key.trim().to_string();
        self.save()
    }

    /// Updates one setting by dot-notation key path, using the persisted
    /// camelCase names (e.g. `"virusTotalApiKey"`), then persists.
    pub fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }
        let parts: Vec<&str> = key.split('.').collect();

        let mut json_value = serde_json::to_value(&*self.lock()).map_err(|e| {
            SettingsError::Serialization(format!("Failed to serialize settings: {}", e))
        })?;

        let (last, path) = match parts.split_last() {
            Some(split) => split,
            None => return Err(SettingsError::InvalidKey("Key cannot be empty".to_string())),
        };
        let mut current = &mut json_value;
        for part in path {
            current = current
                .get_mut(*part)
                .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))?;
        }
        match current {
            serde_json::Value::Object(map) if map.contains_key(*last) => {
                map.insert(last.to_string(), value);
            }
            serde_json::Value::Object(_) => {
                return Err(SettingsError::InvalidKey(format!(
                    "Key '{}' not found in settings",
                    key
                )));
            }
            _ => {
                return Err(SettingsError::InvalidKey(format!(
                    "Cannot navigate to key '{}': intermediate value is not an object",
                    key
                )));
            }
        }

        let updated: ExtensionSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        *self.lock() = updated;
        self.save()
    }

    /// Resets all settings to defaults and persists.
    pub fn reset(&self) -> Result<(), SettingsError> {
        *self.lock() = ExtensionSettings::default();
        self.save()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ExtensionSettings> {
        self.settings.lock().unwrap_or_else(|p| p.into_inner())
    }
}
