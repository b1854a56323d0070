use async_trait::async_trait;
use serde::Deserialize;

use super::ApiCredentials;
use crate::error::TradeError;
use crate::Result;

/// Source of exchange credentials, resolved by secret id
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_credentials(&self, secret_id: &str) -> Result<ApiCredentials>;
}

/// Secret document layout: one key pair for mainnet, one for testnet
#[derive(Debug, Deserialize)]
struct SecretDocument {
    #[serde(rename = "API_KEY")]
    api_key: Option<String>,
    #[serde(rename = "API_SECRET")]
    api_secret: Option<String>,
    #[serde(rename = "TESTNET_API_KEY")]
    testnet_api_key: Option<String>,
    #[serde(rename = "TESTNET_API_SECRET")]
    testnet_api_secret: Option<String>,
}

/// Parse a JSON secret document and pick the key pair for the selected network
pub fn parse_secret_document(raw: &str, testnet: bool) -> Result<ApiCredentials> {
    let doc: SecretDocument = serde_json::from_str(raw)
        .map_err(|e| TradeError::Credentials(format!("Malformed secret document: {}", e)))?;

    let (key, secret) = if testnet {
        (doc.testnet_api_key, doc.testnet_api_secret)
    } else {
        (doc.api_key, doc.api_secret)
    };

    let key = key.unwrap_or_default();
    let secret = secret.unwrap_or_default();
    if key.trim().is_empty() || secret.trim().is_empty() {
        let network = if testnet { "testnet" } else { "mainnet" };
        return Err(TradeError::Credentials(format!(
            "Secret has no {} key pair",
            network
        )));
    }

    Ok(ApiCredentials::new(key, secret))
}

/// Reads the secret document from an environment variable
///
/// `creds/bybit` is looked up as `CREDS_BYBIT`.
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    testnet: bool,
}

impl EnvSecretProvider {
    pub fn new(testnet: bool) -> Self {
        Self { testnet }
    }

    pub fn env_var_name(secret_id: &str) -> String {
        secret_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_credentials(&self, secret_id: &str) -> Result<ApiCredentials> {
        let var = Self::env_var_name(secret_id);
        let raw = std::env::var(&var).map_err(|_| {
            TradeError::Credentials(format!("Secret {} not found (expected env {})", secret_id, var))
        })?;

        let creds = parse_secret_document(&raw, self.testnet)?;
        tracing::debug!(secret_id = %secret_id, api_key = %creds.api_key(), "Loaded credentials");
        Ok(creds)
    }
}

/// Fixed credentials, or a fixed failure when `None`
#[derive(Debug, Clone)]
pub struct StaticSecretProvider {
    credentials: Option<ApiCredentials>,
}

impl StaticSecretProvider {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }

    pub fn unavailable() -> Self {
        Self { credentials: None }
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_credentials(&self, secret_id: &str) -> Result<ApiCredentials> {
        self.credentials
            .clone()
            .ok_or_else(|| TradeError::Credentials(format!("Secret {} unavailable", secret_id)))
    }
}
