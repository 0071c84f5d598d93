//! Portal runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the
//! workflows as an explicit object. Nothing in this crate reads process-wide
//! environment variables during request handling; the binary calls
//! [`PortalConfig::from_env`] exactly once.

use chrono::Duration;
use std::path::PathBuf;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing the environment variable {0}")]
    MissingVar(String),
    #[error("invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Inactivity window after which a stored session is treated as expired.
const DEFAULT_INACTIVITY_SECS: i64 = 60;

/// Configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct PortalConfig {
    api_base_url: String,
    upload_enabled: bool,
    session_file: PathBuf,
    inactivity_window: Duration,
}

impl PortalConfig {
    /// Creates a configuration from already-resolved values.
    pub fn new(
        api_base_url: String,
        upload_enabled: bool,
        session_file: PathBuf,
        inactivity_window: Duration,
    ) -> Result<Self, ConfigError> {
        if api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "LGP_API_URL".to_string(),
                "base URL cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            upload_enabled,
            session_file,
            inactivity_window,
        })
    }

    /// Loads configuration from environment variables.
    ///
    /// `LGP_API_URL` is required. `LGP_UPLOAD_ENABLED` defaults to true,
    /// `LGP_SESSION_FILE` to `$HOME/.lgp/session.json` and
    /// `LGP_INACTIVITY_SECS` to sixty seconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("LGP_API_URL")
            .map_err(|_| ConfigError::MissingVar("LGP_API_URL".to_string()))?;

        let upload_enabled = match std::env::var("LGP_UPLOAD_ENABLED") {
            Ok(raw) => parse_bool("LGP_UPLOAD_ENABLED", &raw)?,
            Err(_) => true,
        };

        let session_file = std::env::var("LGP_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_file());

        let inactivity_window = match std::env::var("LGP_INACTIVITY_SECS") {
            Ok(raw) => {
                let secs: i64 = raw.parse().map_err(|_| {
                    ConfigError::InvalidValue(
                        "LGP_INACTIVITY_SECS".to_string(),
                        format!("'{}' is not a whole number of seconds", raw),
                    )
                })?;
                if secs <= 0 {
                    return Err(ConfigError::InvalidValue(
                        "LGP_INACTIVITY_SECS".to_string(),
                        "inactivity window must be positive".to_string(),
                    ));
                }
                Duration::seconds(secs)
            }
            Err(_) => Duration::seconds(DEFAULT_INACTIVITY_SECS),
        };

        Self::new(api_base_url, upload_enabled, session_file, inactivity_window)
    }

    /// Base URL of the records API, without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Whether the upload workflow is switched on for this deployment.
    pub fn upload_enabled(&self) -> bool {
        self.upload_enabled
    }

    /// Where the session is persisted between invocations.
    pub fn session_file(&self) -> &PathBuf {
        &self.session_file
    }

    /// How long a session survives without activity.
    pub fn inactivity_window(&self) -> Duration {
        self.inactivity_window
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' is not a boolean", raw),
        )),
    }
}

fn default_session_file() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".lgp").join("session.json"),
        Err(_) => PathBuf::from(".lgp").join("session.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let config = PortalConfig::new(
            "https://api.example.test/".to_string(),
            true,
            PathBuf::from("session.json"),
            Duration::seconds(60),
        )
        .expect("valid config");
        assert_eq!(config.api_base_url(), "https://api.example.test");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = PortalConfig::new(
            "   ".to_string(),
            true,
            PathBuf::from("session.json"),
            Duration::seconds(60),
        )
        .expect_err("empty URL");
        assert!(matches!(err, ConfigError::InvalidValue(_, _)));
    }

    #[test]
    fn booleans_parse_common_spellings() {
        assert!(parse_bool("X", "true").expect("true"));
        assert!(parse_bool("X", "1").expect("one"));
        assert!(!parse_bool("X", "no").expect("no"));
        assert!(parse_bool("X", "sometimes").is_err());
    }
}
