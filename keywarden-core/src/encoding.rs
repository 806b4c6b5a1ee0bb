//! Binary identifier and transport set codecs
//!
//! Credential identifiers are opaque binary handles. They are stored and
//! displayed in URL-safe unpadded base64; the portable document form uses
//! standard base64 instead (a fixed choice, independent of the storage
//! encoding). Both directions are lossless and deterministic.

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::DecodeError;

/// An opaque binary credential identifier (key handle).
///
/// The authenticator assigns this value at registration; it is globally
/// unique and never interpreted by this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    /// Wrap raw identifier bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw identifier bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// URL-safe textual form used as the storage key.
    pub fn encoded(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }

    /// Parse the URL-safe storage form.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        Ok(Self(URL_SAFE_NO_PAD.decode(text)?))
    }

    /// Standard base64 form used in portable documents.
    pub fn to_document_form(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Parse the standard base64 document form.
    pub fn from_document_form(text: &str) -> Result<Self, DecodeError> {
        Ok(Self(STANDARD.decode(text)?))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded())
    }
}

impl From<Vec<u8>> for KeyId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Encode opaque bytes in standard base64 for the document form.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64 document data.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(text)?)
}

/// Join transport tags into the comma-delimited storage form.
///
/// An empty list yields an empty string.
pub fn join_transports<S: AsRef<str>>(transports: &[S]) -> String {
    transports
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

/// Split the comma-delimited storage form into transport tags.
///
/// Empty segments are discarded, so an empty string yields an empty list
/// rather than a list containing one empty tag.
pub fn split_transports(transport: &str) -> Vec<String> {
    transport
        .split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}
