//! PostgreSQL storage for registered devices
//!
//! Devices persist in the consolidated `webauthn_devices` table. Uniqueness
//! of the credential identifier and of `(username, description)` is
//! enforced by the table's unique constraints, so concurrent registrations
//! racing on either value surface as constraint violations here rather
//! than being serialized in process.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use keywarden_core::{KeyId, WebAuthnDevice, WebAuthnUser};

use crate::{map_query_error, StorageError};

/// PostgreSQL-backed device storage
pub struct PostgresDeviceStore {
    pool: PgPool,
}

impl PostgresDeviceStore {
    /// Create a new PostgreSQL device store
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Check database connection health
    pub async fn check_health(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Store a new device, returning its assigned row id
    pub async fn save_device(&self, device: &WebAuthnDevice) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO webauthn_devices
                (created_at, last_used_at, rpid, username, description, kid, aaguid,
                 attestation_type, attachment, transport, sign_count, clone_warning,
                 discoverable, present, verified, backup_eligible, backup_state, public_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id
            "#,
        )
        .bind(device.created_at)
        .bind(device.last_used_at)
        .bind(&device.rpid)
        .bind(&device.username)
        .bind(&device.description)
        .bind(device.kid.encoded())
        .bind(device.aaguid)
        .bind(&device.attestation_type)
        .bind(&device.attachment)
        .bind(&device.transport)
        .bind(device.sign_count as i64)
        .bind(device.clone_warning)
        .bind(device.discoverable)
        .bind(device.present)
        .bind(device.verified)
        .bind(device.backup_eligible)
        .bind(device.backup_state)
        .bind(&device.public_key)
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_error)?;

        tracing::info!(username = %device.username, kid = %device.kid, "Device stored in database");
        Ok(id)
    }

    /// Get one device by its owning user and label
    pub async fn find_device(
        &self,
        username: &str,
        description: &str,
    ) -> Result<Option<WebAuthnDevice>, StorageError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT id, created_at, last_used_at, rpid, username, description, kid, aaguid,
                   attestation_type, attachment, transport, sign_count, clone_warning,
                   discoverable, present, verified, backup_eligible, backup_state, public_key
            FROM webauthn_devices
            WHERE username = $1 AND description = $2
            "#,
        )
        .bind(username)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;

        row.map(WebAuthnDevice::try_from).transpose()
    }

    /// List one user's devices in registration order
    pub async fn list_devices(&self, username: &str) -> Result<Vec<WebAuthnDevice>, StorageError> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT id, created_at, last_used_at, rpid, username, description, kid, aaguid,
                   attestation_type, attachment, transport, sign_count, clone_warning,
                   discoverable, present, verified, backup_eligible, backup_state, public_key
            FROM webauthn_devices
            WHERE username = $1
            ORDER BY id
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        rows.into_iter().map(WebAuthnDevice::try_from).collect()
    }

    /// List every stored device in registration order, for bulk export
    pub async fn list_all_devices(&self) -> Result<Vec<WebAuthnDevice>, StorageError> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT id, created_at, last_used_at, rpid, username, description, kid, aaguid,
                   attestation_type, attachment, transport, sign_count, clone_warning,
                   discoverable, present, verified, backup_eligible, backup_state, public_key
            FROM webauthn_devices
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        rows.into_iter().map(WebAuthnDevice::try_from).collect()
    }

    /// Assemble the ceremony-facing user aggregate for one principal
    pub async fn load_user(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<WebAuthnUser, StorageError> {
        Ok(WebAuthnUser {
            user_id: user_id.to_owned(),
            username: username.to_owned(),
            display_name: display_name.to_owned(),
            devices: self.list_devices(username).await?,
        })
    }

    /// Persist the mutable sign-in state of a device
    ///
    /// Callers must ensure at most one concurrent update per device; this
    /// store performs no row locking itself.
    pub async fn update_sign_in(&self, device: &WebAuthnDevice) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE webauthn_devices
            SET rpid = $2, last_used_at = $3, sign_count = $4, clone_warning = $5
            WHERE id = $1
            "#,
        )
        .bind(device.id)
        .bind(&device.rpid)
        .bind(device.last_used_at)
        .bind(device.sign_count as i64)
        .bind(device.clone_warning)
        .execute(&self.pool)
        .await
        .map_err(map_query_error)?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove one device by its owning user and label
    pub async fn delete_device(
        &self,
        username: &str,
        description: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM webauthn_devices
            WHERE username = $1 AND description = $2
            "#,
        )
        .bind(username)
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(map_query_error)?;

        Ok(result.rows_affected() > 0)
    }

    /// Get total device count (for stats)
    pub async fn device_count(&self) -> Result<usize, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webauthn_devices")
            .fetch_one(&self.pool)
            .await
            .map_err(map_query_error)?;

        Ok(count as usize)
    }
}

/// Database row for devices, the wrapper-free boundary form
#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: i64,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    rpid: String,
    username: String,
    description: String,
    kid: String,
    aaguid: Option<Uuid>,
    attestation_type: String,
    attachment: String,
    transport: String,
    sign_count: i64,
    clone_warning: bool,
    discoverable: bool,
    present: bool,
    verified: bool,
    backup_eligible: bool,
    backup_state: bool,
    public_key: Vec<u8>,
}

impl TryFrom<DeviceRow> for WebAuthnDevice {
    type Error = StorageError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        Ok(WebAuthnDevice {
            id: row.id,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            rpid: row.rpid,
            username: row.username,
            description: row.description,
            kid: KeyId::decode(&row.kid)?,
            aaguid: row.aaguid.filter(|aaguid| !aaguid.is_nil()),
            attestation_type: row.attestation_type,
            attachment: row.attachment,
            transport: row.transport,
            sign_count: row.sign_count as u32,
            clone_warning: row.clone_warning,
            discoverable: row.discoverable,
            present: row.present,
            verified: row.verified,
            backup_eligible: row.backup_eligible,
            backup_state: row.backup_state,
            public_key: row.public_key,
        })
    }
}

impl std::fmt::Debug for PostgresDeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDeviceStore")
            .field("pool", &"<PgPool>")
            .finish()
    }
}
