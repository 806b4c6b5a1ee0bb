//! Ceremony library adapter
//!
//! Projects [`WebAuthnUser`] and each [`WebAuthnDevice`] into the shapes
//! the external ceremony library consumes during registration and
//! authentication, and performs the reverse projection when a new
//! credential is registered. The library's expectations are expressed as
//! an explicit capability contract ([`CeremonyUser`]) rather than by
//! inheriting from library types.

use chrono::Utc;
use webauthn_rs_proto::{AuthenticatorAttachment, AuthenticatorTransport, PublicKeyCredentialDescriptor};

use crate::device::{parse_aaguid, WebAuthnDevice, WebAuthnUser, ATTESTATION_TYPE_FIDO_U2F};
use crate::encoding::{join_transports, KeyId};

/// Capability contract the ceremony library requires of a user aggregate.
pub trait CeremonyUser {
    /// Stable opaque handle identifying the principal.
    fn user_handle(&self) -> &[u8];

    fn user_name(&self) -> &str;

    fn user_display_name(&self) -> &str;

    /// The principal's usable credentials, in registration order.
    fn credentials(&self) -> Vec<CeremonyCredential>;

    /// Minimal descriptors for assertion challenge construction, in the
    /// same order as [`CeremonyUser::credentials`].
    fn credential_descriptors(&self) -> Vec<PublicKeyCredentialDescriptor> {
        self.credentials()
            .iter()
            .map(CeremonyCredential::descriptor)
            .collect()
    }
}

/// One credential in the shape the ceremony library consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyCredential {
    /// Raw credential identifier bytes.
    pub id: Vec<u8>,
    /// Opaque algorithm-specific public key.
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    pub transports: Vec<AuthenticatorTransport>,
    pub flags: CredentialFlags,
    pub authenticator: AuthenticatorInfo,
}

/// Ceremony flags recorded at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialFlags {
    pub user_present: bool,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
}

/// Authenticator metadata attached to a credential.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorInfo {
    /// Raw AAGUID bytes as reported by the authenticator.
    pub aaguid: Vec<u8>,
    pub sign_count: u32,
    pub clone_warning: bool,
    pub attachment: Option<AuthenticatorAttachment>,
}

impl CeremonyCredential {
    /// The minimal descriptor for this credential.
    pub fn descriptor(&self) -> PublicKeyCredentialDescriptor {
        PublicKeyCredentialDescriptor {
            type_: "public-key".to_string(),
            id: self.id.clone().into(),
            transports: (!self.transports.is_empty()).then(|| self.transports.clone()),
        }
    }
}

impl CeremonyUser for WebAuthnUser {
    fn user_handle(&self) -> &[u8] {
        self.user_id.as_bytes()
    }

    fn user_name(&self) -> &str {
        &self.username
    }

    fn user_display_name(&self) -> &str {
        &self.display_name
    }

    fn credentials(&self) -> Vec<CeremonyCredential> {
        self.devices.iter().filter_map(device_credential).collect()
    }
}

impl WebAuthnUser {
    /// True if any device was registered with the legacy U2F attestation.
    ///
    /// Legacy authenticators need different assertion handling upstream.
    pub fn has_fido_u2f(&self) -> bool {
        self.devices
            .iter()
            .any(|device| device.attestation_type == ATTESTATION_TYPE_FIDO_U2F)
    }
}

/// Project one device into its ceremony credential.
///
/// A device without a known AAGUID has no raw bytes to hand the ceremony
/// library and is skipped rather than failing the whole list.
fn device_credential(device: &WebAuthnDevice) -> Option<CeremonyCredential> {
    let aaguid = device.aaguid?;

    Some(CeremonyCredential {
        id: device.kid.bytes().to_vec(),
        public_key: device.public_key.clone(),
        attestation_type: device.attestation_type.clone(),
        transports: device
            .transports()
            .iter()
            .filter_map(|tag| parse_transport(tag))
            .collect(),
        flags: CredentialFlags {
            user_present: device.present,
            user_verified: device.verified,
            backup_eligible: device.backup_eligible,
            backup_state: device.backup_state,
        },
        authenticator: AuthenticatorInfo {
            aaguid: aaguid.as_bytes().to_vec(),
            sign_count: device.sign_count,
            clone_warning: device.clone_warning,
            attachment: parse_attachment(&device.attachment),
        },
    })
}

impl WebAuthnDevice {
    /// Build a new device record from a completed registration ceremony.
    ///
    /// Registration ceremonies in scope here are not resident-key flows,
    /// so the device starts out non-discoverable. An unparsable or all-zero
    /// AAGUID leaves the model identifier absent rather than failing the
    /// construction.
    pub fn from_credential(
        rpid: &str,
        username: &str,
        description: &str,
        credential: &CeremonyCredential,
    ) -> Self {
        let transports: Vec<String> = credential
            .transports
            .iter()
            .filter_map(transport_tag)
            .collect();

        Self {
            id: 0,
            created_at: Utc::now(),
            last_used_at: None,
            rpid: rpid.to_owned(),
            username: username.to_owned(),
            description: description.to_owned(),
            kid: KeyId::new(credential.id.clone()),
            aaguid: parse_aaguid(&credential.authenticator.aaguid),
            attestation_type: credential.attestation_type.clone(),
            attachment: credential
                .authenticator
                .attachment
                .as_ref()
                .and_then(attachment_tag)
                .unwrap_or_default(),
            transport: join_transports(&transports),
            sign_count: credential.authenticator.sign_count,
            clone_warning: credential.authenticator.clone_warning,
            discoverable: false,
            present: credential.flags.user_present,
            verified: credential.flags.user_verified,
            backup_eligible: credential.flags.backup_eligible,
            backup_state: credential.flags.backup_state,
            public_key: credential.public_key.clone(),
        }
    }
}

/// Parse a stored transport tag into the ceremony library's enum.
///
/// Tags the library does not know are dropped from the ceremony view; the
/// storage form keeps them untouched.
fn parse_transport(tag: &str) -> Option<AuthenticatorTransport> {
    serde_json::from_value(serde_json::Value::String(tag.to_owned())).ok()
}

/// The storage tag for a ceremony transport value.
fn transport_tag(transport: &AuthenticatorTransport) -> Option<String> {
    match serde_json::to_value(transport) {
        Ok(serde_json::Value::String(tag)) => Some(tag),
        _ => None,
    }
}

fn parse_attachment(tag: &str) -> Option<AuthenticatorAttachment> {
    serde_json::from_value(serde_json::Value::String(tag.to_owned())).ok()
}

fn attachment_tag(attachment: &AuthenticatorAttachment) -> Option<String> {
    match serde_json::to_value(attachment) {
        Ok(serde_json::Value::String(tag)) => Some(tag),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn device(description: &str, kid: &[u8], aaguid: Option<Uuid>) -> WebAuthnDevice {
        WebAuthnDevice {
            id: 0,
            created_at: Utc::now(),
            last_used_at: None,
            rpid: "example.com".to_string(),
            username: "john".to_string(),
            description: description.to_string(),
            kid: KeyId::new(kid.to_vec()),
            aaguid,
            attestation_type: "packed".to_string(),
            attachment: "cross-platform".to_string(),
            transport: "usb,nfc".to_string(),
            sign_count: 7,
            clone_warning: false,
            discoverable: false,
            present: true,
            verified: false,
            backup_eligible: true,
            backup_state: false,
            public_key: vec![4, 5, 6],
        }
    }

    fn user(devices: Vec<WebAuthnDevice>) -> WebAuthnUser {
        WebAuthnUser {
            user_id: "a-stable-opaque-handle".to_string(),
            username: "john".to_string(),
            display_name: "John".to_string(),
            devices,
        }
    }

    #[test]
    fn test_user_capability_surface() {
        let user = user(vec![]);
        assert_eq!(user.user_handle(), b"a-stable-opaque-handle");
        assert_eq!(user.user_name(), "john");
        assert_eq!(user.user_display_name(), "John");
    }

    #[test]
    fn test_credentials_carry_device_state() {
        let aaguid = Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let user = user(vec![device("Primary", &[1, 2, 3], Some(aaguid))]);

        let credentials = user.credentials();
        assert_eq!(credentials.len(), 1);

        let credential = &credentials[0];
        assert_eq!(credential.id, vec![1, 2, 3]);
        assert_eq!(credential.public_key, vec![4, 5, 6]);
        assert_eq!(credential.attestation_type, "packed");
        assert_eq!(
            credential.transports,
            vec![AuthenticatorTransport::Usb, AuthenticatorTransport::Nfc]
        );
        assert!(credential.flags.user_present);
        assert!(!credential.flags.user_verified);
        assert!(credential.flags.backup_eligible);
        assert!(!credential.flags.backup_state);
        assert_eq!(credential.authenticator.aaguid, aaguid.as_bytes().to_vec());
        assert_eq!(credential.authenticator.sign_count, 7);
        assert_eq!(
            credential.authenticator.attachment,
            Some(AuthenticatorAttachment::CrossPlatform)
        );
    }

    #[test]
    fn test_credentials_skip_devices_without_aaguid_in_order() {
        let aaguid = Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let user = user(vec![
            device("Primary", &[1], Some(aaguid)),
            device("Backup", &[2], None),
            device("Spare", &[3], Some(aaguid)),
        ]);

        let credentials = user.credentials();
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0].id, vec![1]);
        assert_eq!(credentials[1].id, vec![3]);
    }

    #[test]
    fn test_descriptors_match_credential_order() {
        let aaguid = Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let user = user(vec![
            device("Primary", &[1], Some(aaguid)),
            device("Spare", &[3], Some(aaguid)),
        ]);

        let descriptors = user.credential_descriptors();
        assert_eq!(descriptors.len(), 2);
        for (descriptor, credential) in descriptors.iter().zip(user.credentials()) {
            assert_eq!(descriptor.type_, "public-key");
            let id: &[u8] = descriptor.id.as_ref();
            assert_eq!(id, credential.id.as_slice());
            assert_eq!(descriptor.transports, Some(credential.transports.clone()));
        }
    }

    #[test]
    fn test_has_fido_u2f() {
        let aaguid = Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let mut legacy = device("Old key", &[9], Some(aaguid));
        legacy.attestation_type = ATTESTATION_TYPE_FIDO_U2F.to_string();

        assert!(!user(vec![device("Primary", &[1], Some(aaguid))]).has_fido_u2f());
        assert!(user(vec![device("Primary", &[1], Some(aaguid)), legacy]).has_fido_u2f());
    }

    #[test]
    fn test_from_credential_builds_new_device() {
        let credential = CeremonyCredential {
            id: vec![1, 2, 3],
            public_key: vec![4, 5, 6],
            attestation_type: "packed".to_string(),
            transports: vec![AuthenticatorTransport::Usb, AuthenticatorTransport::Nfc],
            flags: CredentialFlags {
                user_present: true,
                user_verified: true,
                backup_eligible: false,
                backup_state: false,
            },
            authenticator: AuthenticatorInfo {
                aaguid: Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10")
                    .unwrap()
                    .as_bytes()
                    .to_vec(),
                sign_count: 1,
                clone_warning: false,
                attachment: Some(AuthenticatorAttachment::Platform),
            },
        };

        let device = WebAuthnDevice::from_credential("example.com", "john", "Primary", &credential);

        assert_eq!(device.id, 0);
        assert_eq!(device.rpid, "example.com");
        assert_eq!(device.username, "john");
        assert_eq!(device.description, "Primary");
        assert_eq!(device.kid.bytes(), &[1, 2, 3]);
        assert_eq!(
            device.aaguid_value().as_deref(),
            Some("01020304-0506-0708-090a-0b0c0d0e0f10")
        );
        assert_eq!(device.attachment, "platform");
        assert_eq!(device.transport, "usb,nfc");
        assert_eq!(device.sign_count, 1);
        assert!(!device.discoverable);
        assert!(device.present);
        assert!(device.verified);
        assert_eq!(device.last_used_at, None);
    }

    #[test]
    fn test_from_credential_normalizes_bad_aaguid_to_absent() {
        let credential = CeremonyCredential {
            id: vec![1],
            public_key: vec![2],
            attestation_type: "fido-u2f".to_string(),
            transports: vec![],
            flags: CredentialFlags {
                user_present: true,
                user_verified: false,
                backup_eligible: false,
                backup_state: false,
            },
            authenticator: AuthenticatorInfo {
                aaguid: vec![0xde, 0xad],
                sign_count: 0,
                clone_warning: false,
                attachment: None,
            },
        };

        let device = WebAuthnDevice::from_credential("", "john", "Primary", &credential);
        assert_eq!(device.aaguid, None);
        assert_eq!(device.attachment, "");
        assert_eq!(device.transport, "");

        let mut zeroed = credential.clone();
        zeroed.authenticator.aaguid = vec![0u8; 16];
        let device = WebAuthnDevice::from_credential("", "john", "Primary", &zeroed);
        assert_eq!(device.aaguid, None);
    }
}
