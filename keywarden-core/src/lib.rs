//! Keywarden Core - WebAuthn device model
//!
//! The durable representation of a registered WebAuthn (FIDO2)
//! authenticator and the conversions between its three representations:
//! the relational storage row, the in-memory ceremony object, and the
//! portable document used for API responses and YAML backup.
//!
//! # Architecture
//!
//! - `encoding`: binary identifier and transport set codecs
//! - `device`: the canonical device record and user aggregate
//! - `ceremony`: adapter to and from the ceremony library's shapes
//! - `document`: portable JSON/YAML document form
//! - `config`: relying-party identity used for lazy RPID binding
//! - `error`: conversion and validation error taxonomy
//!
//! # Example
//!
//! ```
//! use keywarden_core::KeyId;
//!
//! let kid = KeyId::new(vec![0x01, 0x02, 0x03]);
//! let text = kid.encoded();
//! assert_eq!(KeyId::decode(&text).unwrap(), kid);
//! ```

pub mod ceremony;
pub mod config;
pub mod device;
pub mod document;
pub mod encoding;
pub mod error;

// Re-export main types for convenience
pub use ceremony::{AuthenticatorInfo, CeremonyCredential, CeremonyUser, CredentialFlags};
pub use config::RelyingPartyConfig;
pub use device::{WebAuthnDevice, WebAuthnUser, ATTESTATION_TYPE_FIDO_U2F};
pub use document::{DeviceDocument, DeviceExport};
pub use encoding::KeyId;
pub use error::{ConfigError, DecodeError, DocumentError, ImportError, ValidationError};
