//! Client configuration loaded from environment variables.

use crate::auth::DEFAULT_TOKEN_HEADER;

/// Connection settings for the entity API.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URI of the API (e.g. `https://api.example.com/api/`).
    pub base_url: String,

    /// Session token sent with every request.
    pub token: Option<String>,

    /// Header carrying the token. `Authorization` uses the Bearer scheme.
    pub token_header: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_header", &self.token_header)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let base_url = reader("MODEL_SETUP_API_BASE_URL")
            .map_err(|_| ConfigError::MissingVar("MODEL_SETUP_API_BASE_URL".into()))?;

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "MODEL_SETUP_API_BASE_URL".into(),
                format!("must be an http(s) URL, got {base_url}"),
            ));
        }

        let token = reader("MODEL_SETUP_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let token_header = reader("MODEL_SETUP_TOKEN_HEADER")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_HEADER.to_string());

        let request_timeout_secs = reader("MODEL_SETUP_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidValue("MODEL_SETUP_REQUEST_TIMEOUT_SECS".into(), e.to_string())
            })?;

        Ok(Self {
            base_url,
            token,
            token_header,
            request_timeout_secs,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
