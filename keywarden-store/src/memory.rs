//! In-memory device storage
//!
//! Development fallback mirroring the PostgreSQL store's contract,
//! including both uniqueness constraints, so callers observe the same
//! constraint violations without a database. Devices are lost on restart.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use keywarden_core::{WebAuthnDevice, WebAuthnUser};

use crate::StorageError;

/// In-memory device storage keyed by row id
#[derive(Default)]
pub struct MemoryDeviceStore {
    devices: DashMap<i64, WebAuthnDevice>,
    next_id: AtomicI64,
}

impl MemoryDeviceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new device, returning its assigned id
    ///
    /// Rejects a duplicate credential identifier or a duplicate
    /// `(username, description)` pair the same way the database's unique
    /// constraints would.
    pub fn save_device(&self, device: &WebAuthnDevice) -> Result<i64, StorageError> {
        for entry in self.devices.iter() {
            if entry.kid == device.kid {
                return Err(StorageError::Constraint(format!(
                    "duplicate credential identifier: {}",
                    device.kid
                )));
            }

            if entry.username == device.username && entry.description == device.description {
                return Err(StorageError::Constraint(format!(
                    "duplicate device description for {}: {}",
                    device.username, device.description
                )));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut stored = device.clone();
        stored.id = id;
        self.devices.insert(id, stored);

        Ok(id)
    }

    /// Get one device by its owning user and label
    pub fn find_device(&self, username: &str, description: &str) -> Option<WebAuthnDevice> {
        self.devices
            .iter()
            .find(|entry| entry.username == username && entry.description == description)
            .map(|entry| entry.value().clone())
    }

    /// List one user's devices in registration order
    pub fn list_devices(&self, username: &str) -> Vec<WebAuthnDevice> {
        let mut devices: Vec<WebAuthnDevice> = self
            .devices
            .iter()
            .filter(|entry| entry.username == username)
            .map(|entry| entry.value().clone())
            .collect();

        devices.sort_by_key(|device| device.id);
        devices
    }

    /// List every stored device in registration order
    pub fn list_all_devices(&self) -> Vec<WebAuthnDevice> {
        let mut devices: Vec<WebAuthnDevice> =
            self.devices.iter().map(|entry| entry.value().clone()).collect();

        devices.sort_by_key(|device| device.id);
        devices
    }

    /// Assemble the ceremony-facing user aggregate for one principal
    pub fn load_user(&self, user_id: &str, username: &str, display_name: &str) -> WebAuthnUser {
        WebAuthnUser {
            user_id: user_id.to_owned(),
            username: username.to_owned(),
            display_name: display_name.to_owned(),
            devices: self.list_devices(username),
        }
    }

    /// Persist the mutable sign-in state of a device
    pub fn update_sign_in(&self, device: &WebAuthnDevice) -> bool {
        match self.devices.get_mut(&device.id) {
            Some(mut stored) => {
                stored.rpid = device.rpid.clone();
                stored.last_used_at = device.last_used_at;
                stored.sign_count = device.sign_count;
                stored.clone_warning = device.clone_warning;
                true
            }
            None => false,
        }
    }

    /// Remove one device by its owning user and label
    pub fn delete_device(&self, username: &str, description: &str) -> bool {
        let id = self
            .devices
            .iter()
            .find(|entry| entry.username == username && entry.description == description)
            .map(|entry| *entry.key());

        match id {
            Some(id) => self.devices.remove(&id).is_some(),
            None => false,
        }
    }

    /// Get total device count
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl std::fmt::Debug for MemoryDeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDeviceStore")
            .field("devices", &self.devices.len())
            .finish()
    }
}
