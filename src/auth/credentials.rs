//! Exchange API credentials.
//!
//! The secret is wrapped in `SecretString` so it never shows up in Debug output
//! and is zeroed on drop.

use secrecy::{ExposeSecret, SecretString};

/// API key pair for authenticated exchange requests
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    secret_key: SecretString,
}

impl ApiCredentials {
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key,
            secret_key: SecretString::from(secret_key),
        }
    }

    /// Public key, safe to log
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Secret key for signing only. Never log the return value.
    pub fn expose_secret(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}
