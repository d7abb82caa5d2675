use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::DeviceRepository;
use crate::device::fingerprint::DeviceFingerprint;
use crate::error::Result;

/// Device rows held in process memory, keyed by fingerprint hash
#[derive(Debug, Default)]
pub struct MemoryDeviceRepository {
    devices: DashMap<String, DeviceFingerprint>,
}

impl MemoryDeviceRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device has been stored
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[async_trait]
impl DeviceRepository for MemoryDeviceRepository {
    async fn find(&self, user_id: &str, fingerprint_hash: &str) -> Result<Option<DeviceFingerprint>> {
        Ok(self
            .devices
            .get(fingerprint_hash)
            .filter(|d| d.user_id == user_id)
            .map(|d| d.clone()))
    }

    async fn upsert(&self, device: &DeviceFingerprint) -> Result<DeviceFingerprint> {
        match self.devices.entry(device.fingerprint_hash.clone()) {
            Entry::Occupied(mut occupied) => {
                let stored = occupied.get_mut();
                stored.last_seen = device.last_seen;
                stored.ip_address = device.ip_address.clone();
                Ok(stored.clone())
            }
            Entry::Vacant(vacant) => Ok(vacant.insert(device.clone()).clone()),
        }
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>> {
        let mut devices: Vec<DeviceFingerprint> = self
            .devices
            .iter()
            .filter(|d| d.user_id == user_id)
            .map(|d| d.clone())
            .collect();
        devices.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(devices)
    }

    async fn set_trusted(&self, user_id: &str, fingerprint_hash: &str, trusted: bool) -> Result<bool> {
        match self.devices.get_mut(fingerprint_hash) {
            Some(mut device) if device.user_id == user_id => {
                device.trusted = trusted;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
