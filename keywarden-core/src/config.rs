//! Relying Party configuration
//!
//! Identifies the Relying Party a credential ceremony runs against: the RP
//! ID plus the ordered list of allowed origins. Devices registered before
//! RPID tracking existed are lazily bound against these values on their
//! first successful sign-in.

use url::Url;

use crate::error::ConfigError;

/// Relying Party identity consumed by the device model.
#[derive(Debug, Clone)]
pub struct RelyingPartyConfig {
    rp_id: String,
    origins: Vec<Url>,
}

impl RelyingPartyConfig {
    /// Create a new configuration.
    ///
    /// # Arguments
    ///
    /// * `rp_id` - Relying Party ID (typically the domain name)
    /// * `origins` - Ordered, non-empty list of allowed origins
    pub fn new(rp_id: impl Into<String>, origins: Vec<Url>) -> Result<Self, ConfigError> {
        if origins.is_empty() {
            return Err(ConfigError::NoOrigins);
        }

        Ok(Self {
            rp_id: rp_id.into(),
            origins,
        })
    }

    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WEBAUTHN_RP_ID` - Relying Party ID (default: "localhost")
    /// - `WEBAUTHN_RP_ORIGINS` - comma-separated origin URLs
    ///   (default: "http://localhost:3001")
    pub fn from_env() -> Result<Self, ConfigError> {
        let rp_id = std::env::var("WEBAUTHN_RP_ID").unwrap_or_else(|_| "localhost".to_string());
        let raw_origins = std::env::var("WEBAUTHN_RP_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3001".to_string());

        let origins = raw_origins
            .split(',')
            .filter(|o| !o.is_empty())
            .map(Url::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(rp_id, origins)
    }

    /// The configured Relying Party ID.
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    /// The ordered list of allowed origins.
    pub fn origins(&self) -> &[Url] {
        &self.origins
    }

    /// The first configured origin.
    ///
    /// Legacy U2F credentials were bound to an origin rather than an RPID,
    /// so this is the value backfilled for them.
    pub fn primary_origin(&self) -> &Url {
        &self.origins[0]
    }
}
