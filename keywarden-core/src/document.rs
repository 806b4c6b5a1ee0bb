//! Portable document form of a device record
//!
//! The export/import representation used for JSON API responses and YAML
//! backup/restore. Binary fields travel as standard base64 text, the
//! AAGUID as a formatted UUID string, transports as a list, and absent
//! timestamps are omitted instead of carrying a null marker.
//!
//! The API form includes the storage `id` and omits `username` (implicit
//! from the authenticated session); the backup form is the other way
//! around, so a restored document cannot collide with live row ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::WebAuthnDevice;
use crate::encoding::{decode_base64, encode_base64, join_transports, KeyId};
use crate::error::{DocumentError, ImportError, ValidationError};

/// Portable form of one [`WebAuthnDevice`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub rpid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub description: String,
    /// Credential identifier in standard base64.
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<String>,
    pub attestation_type: String,
    pub attachment: String,
    /// Always present, possibly empty.
    #[serde(default)]
    pub transports: Vec<String>,
    pub sign_count: u32,
    pub clone_warning: bool,
    pub discoverable: bool,
    pub present: bool,
    pub verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    /// Public key in standard base64.
    pub public_key: String,
}

impl WebAuthnDevice {
    fn document(&self) -> DeviceDocument {
        DeviceDocument {
            id: Some(self.id),
            created_at: self.created_at,
            last_used_at: self.last_used_value(),
            rpid: self.rpid.clone(),
            username: Some(self.username.clone()),
            description: self.description.clone(),
            kid: self.kid.to_document_form(),
            aaguid: self.aaguid_value(),
            attestation_type: self.attestation_type.clone(),
            attachment: self.attachment.clone(),
            transports: self.transports(),
            sign_count: self.sign_count,
            clone_warning: self.clone_warning,
            discoverable: self.discoverable,
            present: self.present,
            verified: self.verified,
            backup_eligible: self.backup_eligible,
            backup_state: self.backup_state,
            public_key: encode_base64(&self.public_key),
        }
    }

    /// Document form for live API reads: carries the row id, omits the
    /// username.
    pub fn to_api_document(&self) -> DeviceDocument {
        DeviceDocument {
            username: None,
            ..self.document()
        }
    }

    /// Document form for backup export: carries the username, omits the
    /// row id.
    pub fn to_export_document(&self) -> DeviceDocument {
        DeviceDocument {
            id: None,
            ..self.document()
        }
    }
}

impl DeviceDocument {
    /// Convert the document back into a device record.
    ///
    /// Base64 failures abort with a [`DecodeError`]; a malformed AAGUID
    /// string aborts with a [`ValidationError`]. A well-formed but all-zero
    /// AAGUID normalizes to absent, matching construction semantics
    /// elsewhere.
    ///
    /// [`DecodeError`]: crate::error::DecodeError
    pub fn to_device(&self) -> Result<WebAuthnDevice, DocumentError> {
        let public_key = decode_base64(&self.public_key)?;
        let kid = KeyId::from_document_form(&self.kid)?;

        let aaguid = match &self.aaguid {
            Some(text) => {
                let parsed = Uuid::parse_str(text).map_err(ValidationError::from)?;
                (!parsed.is_nil()).then_some(parsed)
            }
            None => None,
        };

        Ok(WebAuthnDevice {
            id: self.id.unwrap_or(0),
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            rpid: self.rpid.clone(),
            username: self.username.clone().unwrap_or_default(),
            description: self.description.clone(),
            kid,
            aaguid,
            attestation_type: self.attestation_type.clone(),
            attachment: self.attachment.clone(),
            transport: join_transports(&self.transports),
            sign_count: self.sign_count,
            clone_warning: self.clone_warning,
            discoverable: self.discoverable,
            present: self.present,
            verified: self.verified,
            backup_eligible: self.backup_eligible,
            backup_state: self.backup_state,
            public_key,
        })
    }
}

/// A named bulk export collection, the YAML backup top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceExport {
    pub webauthn_devices: Vec<DeviceDocument>,
}

impl DeviceExport {
    /// Build an export collection from device records, preserving order.
    pub fn from_devices<'a>(devices: impl IntoIterator<Item = &'a WebAuthnDevice>) -> Self {
        Self {
            webauthn_devices: devices
                .into_iter()
                .map(WebAuthnDevice::to_export_document)
                .collect(),
        }
    }

    /// Convert every document back into a device record, in collection
    /// order. The first failing document aborts the conversion and reports
    /// its index.
    pub fn to_devices(&self) -> Result<Vec<WebAuthnDevice>, ImportError> {
        self.webauthn_devices
            .iter()
            .enumerate()
            .map(|(index, document)| {
                document
                    .to_device()
                    .map_err(|source| ImportError { index, source })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_device() -> WebAuthnDevice {
        WebAuthnDevice {
            id: 42,
            created_at: "2025-06-01T12:00:00Z".parse().unwrap(),
            last_used_at: Some("2025-07-01T08:30:00Z".parse().unwrap()),
            rpid: "example.com".to_string(),
            username: "john".to_string(),
            description: "Primary".to_string(),
            kid: KeyId::new(vec![0x01, 0x02, 0xfe]),
            aaguid: Some(Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap()),
            attestation_type: "packed".to_string(),
            attachment: "platform".to_string(),
            transport: "usb,nfc".to_string(),
            sign_count: 23,
            clone_warning: false,
            discoverable: false,
            present: true,
            verified: true,
            backup_eligible: false,
            backup_state: false,
            public_key: vec![0xaa, 0xbb, 0xcc],
        }
    }

    #[test]
    fn test_export_document_roundtrip() {
        let device = test_device();
        let restored = device.to_export_document().to_device().unwrap();

        // The export form drops the storage id; everything else survives.
        let expected = WebAuthnDevice { id: 0, ..device };
        assert_eq!(restored, expected);
    }

    #[test]
    fn test_api_document_shape() {
        let json = serde_json::to_value(test_device().to_api_document()).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object["id"], 42);
        assert!(!object.contains_key("username"));
        assert_eq!(object["created_at"], "2025-06-01T12:00:00Z");
        assert_eq!(object["aaguid"], "01020304-0506-0708-090a-0b0c0d0e0f10");
        assert_eq!(object["transports"], serde_json::json!(["usb", "nfc"]));
    }

    #[test]
    fn test_document_omits_absent_optionals() {
        let device = WebAuthnDevice {
            aaguid: None,
            last_used_at: None,
            transport: String::new(),
            ..test_device()
        };
        let json = serde_json::to_value(device.to_export_document()).unwrap();
        let object = json.as_object().unwrap();

        assert!(!object.contains_key("id"));
        assert!(!object.contains_key("aaguid"));
        assert!(!object.contains_key("last_used_at"));
        // An empty transport set is an empty list, never an omitted field.
        assert_eq!(object["transports"], serde_json::json!([]));
        assert_eq!(object["username"], "john");
    }

    #[test]
    fn test_to_device_rejects_bad_public_key() {
        let mut document = test_device().to_export_document();
        document.public_key = "not base64 at all!".to_string();

        assert!(matches!(
            document.to_device(),
            Err(DocumentError::Decode(_))
        ));
    }

    #[test]
    fn test_to_device_rejects_bad_kid() {
        let mut document = test_device().to_export_document();
        document.kid = "%%%".to_string();

        assert!(matches!(
            document.to_device(),
            Err(DocumentError::Decode(_))
        ));
    }

    #[test]
    fn test_to_device_rejects_malformed_aaguid() {
        let mut document = test_device().to_export_document();
        document.aaguid = Some("not-a-uuid".to_string());

        assert!(matches!(
            document.to_device(),
            Err(DocumentError::Validation(_))
        ));
    }

    #[test]
    fn test_to_device_normalizes_zero_aaguid_to_absent() {
        let mut document = test_device().to_export_document();
        document.aaguid = Some("00000000-0000-0000-0000-000000000000".to_string());

        let device = document.to_device().unwrap();
        assert_eq!(device.aaguid, None);
    }

    #[test]
    fn test_yaml_export_collection_roundtrip() {
        let first = test_device();
        let second = WebAuthnDevice {
            id: 43,
            description: "Backup".to_string(),
            kid: KeyId::new(vec![0x09]),
            ..test_device()
        };

        let export = DeviceExport::from_devices([&first, &second]);
        let yaml = serde_yaml::to_string(&export).unwrap();
        assert!(yaml.contains("webauthn_devices:"));
        assert!(yaml.contains("username: john"));

        let parsed: DeviceExport = serde_yaml::from_str(&yaml).unwrap();
        let restored = parsed.to_devices().unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0], WebAuthnDevice { id: 0, ..first });
        assert_eq!(restored[1], WebAuthnDevice { id: 0, ..second });
    }

    #[test]
    fn test_import_reports_failing_document_index() {
        let mut export = DeviceExport::from_devices([&test_device(), &test_device()]);
        export.webauthn_devices[1].public_key = "***".to_string();

        let err = export.to_devices().unwrap_err();
        assert_eq!(err.index, 1);
        assert!(matches!(err.source, DocumentError::Decode(_)));
    }
}
