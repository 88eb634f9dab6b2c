//! HMAC-SHA256 request signing shared by both venue REST clients.
//!
//! Both MEXC and BingX sign the request query string with the account's
//! API secret and pass the API key in a header. Credentials come from the
//! environment, never from the config file.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// API credentials for one venue.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Load `<PREFIX>_API_KEY` / `<PREFIX>_API_SECRET` from the
    /// environment.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let key = std::env::var(format!("{prefix}_API_KEY"))
            .map_err(|_| Error::Config(format!("{prefix}_API_KEY not set")))?;
        let secret = std::env::var(format!("{prefix}_API_SECRET"))
            .map_err(|_| Error::Config(format!("{prefix}_API_SECRET not set")))?;
        Ok(Self::new(key, secret))
    }

    /// Hex HMAC-SHA256 of `payload` under the API secret.
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Current wall-clock time in milliseconds, as venues expect in the
/// `timestamp` query parameter.
pub fn timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
