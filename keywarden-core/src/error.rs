//! Error types for the device model
//!
//! Conversion errors are split by kind: [`DecodeError`] for malformed
//! binary-text encodings and [`ValidationError`] for values that decode but
//! fail semantic checks. Both abort the conversion that raised them and are
//! surfaced to the caller unmodified.

use thiserror::Error;

/// Malformed binary-text encoding (credential identifier or public key).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input is not valid base64 for the expected alphabet.
    #[error("invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A structurally valid but semantically invalid value.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// AAGUID string is not a well-formed UUID.
    #[error("invalid AAGUID: {0}")]
    Aaguid(#[from] uuid::Error),
}

/// Failure converting a portable document into a device record.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure converting one document of a bulk export collection.
///
/// Carries the zero-based index of the offending document so bulk restore
/// failures can name the exact entry.
#[derive(Debug, Error)]
#[error("device document at index {index}: {source}")]
pub struct ImportError {
    pub index: usize,
    #[source]
    pub source: DocumentError,
}

/// Relying-party configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The ordered origin list must contain at least one entry.
    #[error("at least one relying party origin is required")]
    NoOrigins,

    /// An origin could not be parsed as a URL.
    #[error("invalid origin URL: {0}")]
    InvalidOrigin(#[from] url::ParseError),
}
