// Credentials, secret lookup and request signing
pub mod credentials;
pub mod secrets;
pub mod signer;

pub use credentials::ApiCredentials;
pub use secrets::{parse_secret_document, EnvSecretProvider, SecretProvider, StaticSecretProvider};
pub use signer::{request_timestamp, RequestSigner, SignedParams};
