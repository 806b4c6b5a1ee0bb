//! Registered authenticator records
//!
//! [`WebAuthnDevice`] is the canonical in-memory representation of one
//! registered authenticator. It is the hub of three representations with
//! different type systems: the relational storage row, the ceremony-facing
//! credential (see [`crate::ceremony`]), and the portable document form
//! (see [`crate::document`]).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::RelyingPartyConfig;
use crate::encoding::KeyId;

/// Attestation type tag reported by legacy FIDO U2F registrations.
///
/// U2F-registered devices were historically bound to an origin rather than
/// an RPID, which changes how the lazy RPID backfill behaves.
pub const ATTESTATION_TYPE_FIDO_U2F: &str = "fido-u2f";

/// A registered WebAuthn authenticator owned by one user.
///
/// Uniqueness of `kid` and of `(username, description)` is enforced by the
/// storage layer; this type only carries the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnDevice {
    /// Surrogate storage id. Zero until the row is first persisted.
    pub id: i64,
    pub created_at: DateTime<Utc>,
    /// Absent until the first successful authentication.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Relying Party the credential is bound to. Empty for devices
    /// registered before RPID tracking existed; assigned at most once on
    /// their first successful sign-in.
    pub rpid: String,
    pub username: String,
    /// User-assigned label, unique per username.
    pub description: String,
    /// Credential identifier assigned by the authenticator.
    pub kid: KeyId,
    /// Authenticator model identifier. Absent when unknown: a reported
    /// all-zero value or an unparsable value both normalize to `None`.
    pub aaguid: Option<Uuid>,
    pub attestation_type: String,
    /// Authenticator attachment tag ("platform", "cross-platform" or empty).
    pub attachment: String,
    /// Supported transports in the comma-delimited storage form.
    pub transport: String,
    /// Authenticator-reported signature counter.
    pub sign_count: u32,
    /// Set once a counter regression was observed; never cleared.
    pub clone_warning: bool,
    pub discoverable: bool,
    pub present: bool,
    pub verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    /// Opaque algorithm-specific public key, never decoded here.
    pub public_key: Vec<u8>,
}

impl WebAuthnDevice {
    /// The last-used timestamp if the device has ever signed in.
    pub fn last_used_value(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    /// The formatted AAGUID if one is known.
    pub fn aaguid_value(&self) -> Option<String> {
        self.aaguid.map(|aaguid| aaguid.to_string())
    }

    /// Supported transports as a list, empty segments discarded.
    pub fn transports(&self) -> Vec<String> {
        crate::encoding::split_transports(&self.transport)
    }

    /// Adjust the record after a successful authentication ceremony.
    ///
    /// The ceremony layer is the source of truth for counter comparison and
    /// clone detection, so `sign_count` is overwritten unconditionally. If
    /// the device predates RPID tracking (empty `rpid`), the binding is
    /// assigned here exactly once: legacy U2F devices take the first
    /// configured origin, everything else takes the configured RP ID.
    pub fn update_on_sign_in(
        &mut self,
        config: &RelyingPartyConfig,
        now: DateTime<Utc>,
        sign_count: u32,
    ) {
        self.last_used_at = Some(now);
        self.sign_count = sign_count;

        if !self.rpid.is_empty() {
            return;
        }

        self.rpid = match self.attestation_type.as_str() {
            ATTESTATION_TYPE_FIDO_U2F => config.primary_origin().origin().ascii_serialization(),
            _ => config.rp_id().to_owned(),
        };

        tracing::debug!(
            kid = %self.kid,
            rpid = %self.rpid,
            "backfilled relying party binding for legacy device"
        );
    }
}

/// Parse an authenticator-reported AAGUID from its raw bytes.
///
/// The bytes are hex-encoded and then parsed as a UUID; a parse failure or
/// the all-zero value both mean "unknown model" and yield `None`.
pub(crate) fn parse_aaguid(raw: &[u8]) -> Option<Uuid> {
    Uuid::try_parse(&hex::encode(raw))
        .ok()
        .filter(|aaguid| !aaguid.is_nil())
}

/// A principal and their registered devices, assembled per ceremony.
///
/// `user_id` is an opaque stable handle distinct from the username. The
/// aggregate is transient: it is built by loading the principal's devices
/// and is never persisted as its own row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnUser {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub devices: Vec<WebAuthnDevice>,
}
