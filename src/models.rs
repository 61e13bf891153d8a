use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::DeviceEntry;

/// A plug registered to the account, as reported by the device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub device_id: String,
    /// Regional server that owns the device.
    pub app_server_url: String,
    pub model: String,
}

impl From<DeviceEntry> for DeviceRecord {
    fn from(entry: DeviceEntry) -> Self {
        Self {
            device_id: entry.device_id,
            app_server_url: entry.app_server_url,
            model: entry.device_model,
        }
    }
}

/// Alias to device mapping. Aliases are case-sensitive.
///
/// A registry is built in full from one device-list reply and replaces the
/// previous one wholesale; it is never merged or edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceRecord>,
}

impl DeviceRegistry {
    /// Build a registry from decoded device-list entries. A later entry with
    /// a duplicate alias replaces the earlier one.
    pub fn from_entries(entries: impl IntoIterator<Item = DeviceEntry>) -> Self {
        let devices = entries
            .into_iter()
            .map(|entry| (entry.alias.clone(), DeviceRecord::from(entry)))
            .collect();
        Self { devices }
    }

    pub fn get(&self, alias: &str) -> Result<&DeviceRecord> {
        self.devices
            .get(alias)
            .ok_or_else(|| Error::UnknownDevice(alias.to_string()))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceRecord)> {
        self.devices.iter().map(|(alias, record)| (alias.as_str(), record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(alias: &str, device_id: &str) -> DeviceEntry {
        DeviceEntry {
            alias: alias.to_string(),
            device_id: device_id.to_string(),
            app_server_url: "https://eu-wap.tplinkcloud.com".to_string(),
            device_model: "HS100(EU)".to_string(),
            device_name: None,
            status: None,
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = DeviceRegistry::from_entries(vec![entry("Sudoplug", "D1"), entry("Lamp", "D2")]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("Sudoplug").unwrap().device_id, "D1");
        assert_eq!(registry.get("Lamp").unwrap().model, "HS100(EU)");
        assert_eq!(registry.aliases().collect::<Vec<_>>(), vec!["Lamp", "Sudoplug"]);
    }

    #[test]
    fn test_alias_lookup_is_case_sensitive() {
        let registry = DeviceRegistry::from_entries(vec![entry("Sudoplug", "D1")]);
        let err = registry.get("sudoplug").unwrap_err();
        assert!(matches!(err, Error::UnknownDevice(alias) if alias == "sudoplug"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = DeviceRegistry::from_entries(Vec::new());
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_err());
    }
}
