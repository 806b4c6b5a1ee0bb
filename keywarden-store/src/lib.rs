//! Keywarden device storage
//!
//! Provides persistent storage for registered WebAuthn devices:
//! - **PostgreSQL** (production): devices survive restarts; uniqueness of
//!   the credential identifier and of `(username, description)` is
//!   enforced by the table's unique constraints.
//! - **In-memory** (development fallback): same contract, no persistence.
//!
//! If `DATABASE_URL` is not set, falls back to in-memory storage.
//! Bulk YAML export/import for backup and restore lives here too.

mod memory;
mod postgres;

pub use memory::MemoryDeviceStore;
pub use postgres::PostgresDeviceStore;

use keywarden_core::{DeviceExport, WebAuthnDevice, WebAuthnUser};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    /// Duplicate credential identifier or duplicate (username, description).
    /// Reported by the database and propagated unchanged; no retry or
    /// uniqueness resolution happens here.
    #[error("Unique constraint violation: {0}")]
    Constraint(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored row holds an identifier that no longer decodes.
    #[error("Stored device row is corrupt: {0}")]
    Corrupt(#[from] keywarden_core::DecodeError),

    #[error(transparent)]
    Import(#[from] keywarden_core::ImportError),

    /// A converted document failed to insert during bulk restore.
    #[error("Import failed for device document at index {index}: {source}")]
    ImportRow {
        index: usize,
        #[source]
        source: Box<StorageError>,
    },
}

/// Map a sqlx error, surfacing unique violations as constraint errors.
pub(crate) fn map_query_error(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Constraint(db.message().to_string());
        }
    }

    StorageError::Query(e.to_string())
}

/// Device storage backend
enum DeviceBackend {
    /// PostgreSQL storage (production)
    Postgres(PostgresDeviceStore),
    /// In-memory storage (development fallback)
    Memory(MemoryDeviceStore),
}

/// Unified device storage over the PostgreSQL and in-memory backends
pub struct DeviceStorage {
    devices: DeviceBackend,
}

impl DeviceStorage {
    /// Create storage with PostgreSQL backend
    pub async fn with_postgres(database_url: &str) -> Result<Self, StorageError> {
        let pg_store = PostgresDeviceStore::new(database_url).await?;
        pg_store.migrate().await?;

        Ok(Self {
            devices: DeviceBackend::Postgres(pg_store),
        })
    }

    /// Create storage with in-memory backend (development only)
    pub fn in_memory() -> Self {
        tracing::warn!("Using in-memory device storage - devices will be lost on restart!");
        Self {
            devices: DeviceBackend::Memory(MemoryDeviceStore::new()),
        }
    }

    /// Create storage from environment
    ///
    /// Uses PostgreSQL if `DATABASE_URL` is set, otherwise falls back to
    /// in-memory.
    pub async fn from_env() -> Result<Self, StorageError> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => {
                tracing::info!("Using PostgreSQL device storage");
                Self::with_postgres(&url).await
            }
            _ => {
                tracing::warn!("DATABASE_URL not set, using in-memory storage");
                Ok(Self::in_memory())
            }
        }
    }

    /// Check if using persistent storage
    pub fn is_persistent(&self) -> bool {
        matches!(self.devices, DeviceBackend::Postgres(_))
    }

    /// Check database health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<(), StorageError> {
        match &self.devices {
            DeviceBackend::Postgres(pg) => pg.check_health().await,
            DeviceBackend::Memory(_) => Ok(()),
        }
    }

    // ==================== Device Methods ====================

    /// Store a new device, returning its assigned row id
    pub async fn save_device(&self, device: &WebAuthnDevice) -> Result<i64, StorageError> {
        match &self.devices {
            DeviceBackend::Postgres(pg) => pg.save_device(device).await,
            DeviceBackend::Memory(mem) => mem.save_device(device),
        }
    }

    /// Get one device by its owning user and label
    pub async fn find_device(
        &self,
        username: &str,
        description: &str,
    ) -> Result<Option<WebAuthnDevice>, StorageError> {
        match &self.devices {
            DeviceBackend::Postgres(pg) => pg.find_device(username, description).await,
            DeviceBackend::Memory(mem) => Ok(mem.find_device(username, description)),
        }
    }

    /// List one user's devices in registration order
    pub async fn list_devices(&self, username: &str) -> Result<Vec<WebAuthnDevice>, StorageError> {
        match &self.devices {
            DeviceBackend::Postgres(pg) => pg.list_devices(username).await,
            DeviceBackend::Memory(mem) => Ok(mem.list_devices(username)),
        }
    }

    /// Assemble the ceremony-facing user aggregate for one principal
    pub async fn load_user(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<WebAuthnUser, StorageError> {
        match &self.devices {
            DeviceBackend::Postgres(pg) => pg.load_user(user_id, username, display_name).await,
            DeviceBackend::Memory(mem) => Ok(mem.load_user(user_id, username, display_name)),
        }
    }

    /// Persist the mutable sign-in state of a device
    pub async fn update_sign_in(&self, device: &WebAuthnDevice) -> Result<bool, StorageError> {
        match &self.devices {
            DeviceBackend::Postgres(pg) => pg.update_sign_in(device).await,
            DeviceBackend::Memory(mem) => Ok(mem.update_sign_in(device)),
        }
    }

    /// Remove one device by its owning user and label
    pub async fn delete_device(
        &self,
        username: &str,
        description: &str,
    ) -> Result<bool, StorageError> {
        match &self.devices {
            DeviceBackend::Postgres(pg) => pg.delete_device(username, description).await,
            DeviceBackend::Memory(mem) => Ok(mem.delete_device(username, description)),
        }
    }

    /// Get total device count
    pub async fn device_count(&self) -> Result<usize, StorageError> {
        match &self.devices {
            DeviceBackend::Postgres(pg) => pg.device_count().await,
            DeviceBackend::Memory(mem) => Ok(mem.device_count()),
        }
    }

    // ==================== Backup / Restore ====================

    /// Export every stored device as a backup collection
    pub async fn export_devices(&self) -> Result<DeviceExport, StorageError> {
        let devices = match &self.devices {
            DeviceBackend::Postgres(pg) => pg.list_all_devices().await?,
            DeviceBackend::Memory(mem) => mem.list_all_devices(),
        };

        Ok(DeviceExport::from_devices(devices.iter()))
    }

    /// Export every stored device as a YAML backup document
    pub async fn export_yaml(&self) -> Result<String, StorageError> {
        let export = self.export_devices().await?;
        serde_yaml::to_string(&export).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Restore devices from a backup collection, in collection order
    ///
    /// Returns the number of devices inserted. Uniqueness is still
    /// enforced by the backing store; the first failing document aborts
    /// the restore and reports its index.
    pub async fn import_devices(&self, export: &DeviceExport) -> Result<usize, StorageError> {
        let devices = export.to_devices()?;

        for (index, device) in devices.iter().enumerate() {
            if let Err(source) = self.save_device(device).await {
                tracing::error!(index, error = %source, "Device import failed");
                return Err(StorageError::ImportRow {
                    index,
                    source: Box::new(source),
                });
            }
        }

        tracing::info!(count = devices.len(), "Device import completed");
        Ok(devices.len())
    }

    /// Restore devices from a YAML backup document
    pub async fn import_yaml(&self, yaml: &str) -> Result<usize, StorageError> {
        let export: DeviceExport =
            serde_yaml::from_str(yaml).map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.import_devices(&export).await
    }
}

impl std::fmt::Debug for DeviceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.devices {
            DeviceBackend::Postgres(_) => "PostgreSQL",
            DeviceBackend::Memory(_) => "Memory",
        };
        f.debug_struct("DeviceStorage")
            .field("backend", &backend)
            .finish()
    }
}
