use super::{ApiCommand, CommandError};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha384;
use std::fmt;

type HmacSha384 = Hmac<Sha384>;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "BITFINEX_API_KEY";

/// Environment variable holding the API secret
pub const API_SECRET_ENV: &str = "BITFINEX_API_SECRET";

/// API key pair used to authenticate the session
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Load credentials from the environment (and `.env` if present)
    ///
    /// Returns `None` unless both variables are set and non-empty, which
    /// yields a public, unauthenticated session.
    pub fn from_env() -> Option<Self> {
        dotenv::dotenv().ok();

        let api_key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty())?;
        let api_secret = std::env::var(API_SECRET_ENV).ok().filter(|v| !v.is_empty())?;
        Some(Self::new(api_key, api_secret))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Authenticate the websocket session
///
/// The payload is `AUTH<nonce>` signed with HMAC-SHA384 over the API secret,
/// hex encoded.
#[derive(Debug, Clone, Default)]
pub struct AuthCommand {
    nonce: Option<String>,
}

impl AuthCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed nonce instead of the current time in microseconds
    pub fn with_nonce(nonce: impl Into<String>) -> Self {
        Self {
            nonce: Some(nonce.into()),
        }
    }

    pub fn sign(secret: &str, payload: &str) -> Result<String, CommandError> {
        let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
            .map_err(|e| CommandError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl ApiCommand for AuthCommand {
    fn encode(&self, credentials: Option<&Credentials>) -> Result<String, CommandError> {
        let credentials = credentials.ok_or(CommandError::MissingCredentials)?;

        let nonce = self
            .nonce
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_micros().to_string());
        let payload = format!("AUTH{}", nonce);
        let signature = Self::sign(&credentials.api_secret, &payload)?;

        Ok(json!({
            "event": "auth",
            "apiKey": credentials.api_key,
            "authSig": signature,
            "authPayload": payload,
            "authNonce": nonce,
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_auth_requires_credentials() {
        let err = AuthCommand::new().encode(None).unwrap_err();
        assert!(matches!(err, CommandError::MissingCredentials));
    }

    #[test]
    fn test_auth_payload_is_signed() {
        let credentials = Credentials::new("key", "secret");
        let text = AuthCommand::with_nonce("1234").encode(Some(&credentials)).unwrap();
        let json: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["event"], "auth");
        assert_eq!(json["apiKey"], "key");
        assert_eq!(json["authPayload"], "AUTH1234");
        assert_eq!(json["authNonce"], "1234");

        let signature = json["authSig"].as_str().unwrap();
        assert_eq!(signature.len(), 96);
        assert_eq!(signature, AuthCommand::sign("secret", "AUTH1234").unwrap());
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", Credentials::new("key", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
