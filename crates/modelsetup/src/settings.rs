//! Engine settings loaded from environment variables.

use std::time::Duration;

pub use modelsetup_client::ConfigError;

/// Upper bound on the default per-batch concurrency.
pub const MAX_DEFAULT_CONCURRENCY: usize = 50;

/// Default time a child batch may run before it is abandoned.
pub const DEFAULT_CHILD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default path of the entity config endpoint, relative to the API base.
pub const DEFAULT_ENTITY_CONFIGS_ENDPOINT: &str = "entityConfigs";

/// Default label attached to log lines and errors of a run.
pub const DEFAULT_RUN_LABEL: &str = "model-setup";

/// Tunables of a [`crate::ModelSetup`] engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSettings {
    /// Endpoint entity configs are fetched from (`{endpoint}/{type}`).
    pub entity_configs_endpoint: String,

    /// Maximum child jobs in flight per batch. Always at least 1.
    pub max_concurrency: usize,

    /// How long a child batch may run.
    pub child_timeout: Duration,

    /// Label identifying this run in logs and errors.
    pub run_label: String,
}

impl Default for SetupSettings {
    fn default() -> Self {
        Self {
            entity_configs_endpoint: DEFAULT_ENTITY_CONFIGS_ENDPOINT.to_string(),
            max_concurrency: default_max_concurrency(),
            child_timeout: DEFAULT_CHILD_TIMEOUT,
            run_label: DEFAULT_RUN_LABEL.to_string(),
        }
    }
}

/// Twice the available parallelism, capped at [`MAX_DEFAULT_CONCURRENCY`].
#[must_use]
pub fn default_max_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    (cpus * 2).clamp(1, MAX_DEFAULT_CONCURRENCY)
}

impl SetupSettings {
    /// Load settings from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load settings from a custom variable reader.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let defaults = Self::default();

        let entity_configs_endpoint = reader("MODEL_SETUP_ENTITY_CONFIGS_ENDPOINT")
            .ok()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or(defaults.entity_configs_endpoint);

        let max_concurrency = match reader("MODEL_SETUP_MAX_CONCURRENCY") {
            Ok(raw) => {
                let value = raw.trim().parse::<usize>().map_err(|e| {
                    ConfigError::InvalidValue("MODEL_SETUP_MAX_CONCURRENCY".into(), e.to_string())
                })?;
                if value == 0 {
                    return Err(ConfigError::InvalidValue(
                        "MODEL_SETUP_MAX_CONCURRENCY".into(),
                        "must be at least 1".into(),
                    ));
                }
                value
            }
            Err(_) => defaults.max_concurrency,
        };

        let child_timeout = match reader("MODEL_SETUP_CHILD_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("MODEL_SETUP_CHILD_TIMEOUT_SECS".into(), e.to_string())
            })?),
            Err(_) => defaults.child_timeout,
        };

        let run_label = reader("MODEL_SETUP_RUN_LABEL")
            .ok()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(defaults.run_label);

        Ok(Self {
            entity_configs_endpoint,
            max_concurrency,
            child_timeout,
            run_label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env::VarError;

    fn make_reader(vars: HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        let owned: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| owned.get(key).cloned().ok_or(VarError::NotPresent)
    }

    #[test]
    fn test_defaults() {
        let settings = SetupSettings::from_reader(make_reader(HashMap::new())).unwrap();
        assert_eq!(settings.entity_configs_endpoint, "entityConfigs");
        assert_eq!(settings.child_timeout, Duration::from_secs(1800));
        assert_eq!(settings.run_label, "model-setup");
        assert!(settings.max_concurrency >= 1);
        assert!(settings.max_concurrency <= MAX_DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_all_values() {
        let settings = SetupSettings::from_reader(make_reader(HashMap::from([
            ("MODEL_SETUP_ENTITY_CONFIGS_ENDPOINT", "/api/entityConfigs/"),
            ("MODEL_SETUP_MAX_CONCURRENCY", "4"),
            ("MODEL_SETUP_CHILD_TIMEOUT_SECS", "60"),
            ("MODEL_SETUP_RUN_LABEL", "seed-dev"),
        ])))
        .unwrap();

        assert_eq!(settings.entity_configs_endpoint, "/api/entityConfigs");
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.child_timeout, Duration::from_secs(60));
        assert_eq!(settings.run_label, "seed-dev");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = SetupSettings::from_reader(make_reader(HashMap::from([(
            "MODEL_SETUP_MAX_CONCURRENCY",
            "0",
        )])))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "MODEL_SETUP_MAX_CONCURRENCY"));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = SetupSettings::from_reader(make_reader(HashMap::from([(
            "MODEL_SETUP_CHILD_TIMEOUT_SECS",
            "half an hour",
        )])))
        .unwrap_err();
        assert!(err.to_string().contains("MODEL_SETUP_CHILD_TIMEOUT_SECS"));
    }

    #[test]
    fn test_default_concurrency_is_capped() {
        assert!(default_max_concurrency() <= 50);
        assert!(default_max_concurrency() >= 1);
    }
}
