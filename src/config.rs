use axum_extra::extract::cookie::Key;
use base64::Engine;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PollsError;

/// Runtime configuration. Defaults are overlaid by `POLLS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub loglevel: String,
    /// Base64-encoded cookie key, at least 64 bytes once decoded.
    pub secret_key: Option<String>,
    /// Drop the `Secure` attribute from cookies (plain-http development).
    pub insecure_cookie: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://polls.sqlite".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
            secret_key: None,
            insecure_cookie: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, PollsError> {
        Self::figment().extract().map_err(PollsError::from)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("POLLS_"))
    }

    /// Key used to encrypt session and message cookies.
    pub fn cookie_key(&self) -> Result<Key, PollsError> {
        let Some(encoded) = self.secret_key.as_deref() else {
            warn!("no secret_key configured; generating one, sessions will not survive restart");
            return Ok(Key::generate());
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| PollsError::UnexpectedError(format!("secret_key is not base64: {e}")))?;
        Key::try_from(bytes.as_slice())
            .map_err(|_| PollsError::UnexpectedError("secret_key must be at least 64 bytes".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("POLLS_LISTEN_ADDR", "127.0.0.1:9000");
            jail.set_env("POLLS_INSECURE_COOKIE", "true");
            let cfg: Config = Config::figment().extract()?;
            assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
            assert!(cfg.insecure_cookie);
            assert_eq!(cfg.database_url, "sqlite://polls.sqlite");
            Ok(())
        });
    }

    #[test]
    fn short_secret_key_is_rejected() {
        let cfg = Config {
            secret_key: Some(base64::engine::general_purpose::STANDARD.encode([7u8; 16])),
            ..Config::default()
        };
        assert!(cfg.cookie_key().is_err());

        let cfg = Config {
            secret_key: Some(base64::engine::general_purpose::STANDARD.encode([7u8; 64])),
            ..Config::default()
        };
        assert!(cfg.cookie_key().is_ok());
    }
}
