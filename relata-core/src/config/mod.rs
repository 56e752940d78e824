mod loader;
pub mod secrets;
pub mod value;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use secrets::{DefaultSecretResolver, SecretResolver};
pub use value::{ConfigValue, FromConfigValue};

/// Environment variable selecting the active profile.
pub const PROFILE_ENV: &str = "RELATA_PROFILE";

/// Prefix of environment variables overlaid on top of the YAML files.
pub const ENV_PREFIX: &str = "RELATA_";

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Layered configuration: YAML files, `.env` files and `RELATA_*` environment
/// variables, flattened into dot-separated keys.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml`
/// 2. `application-{profile}.yaml`
/// 3. `.env` then `.env.{profile}` (loaded into the process environment)
/// 4. `RELATA_*` environment variables (`RELATA_DATABASE_DIALECT` overrides
///    `database.dialect`)
///
/// `.env` files never overwrite variables that are already set.
///
/// The profile is `RELATA_PROFILE` if set, else the argument.
#[derive(Debug, Clone)]
pub struct RelataConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl RelataConfig {
    /// Load configuration for `profile` from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."), profile, &DefaultSecretResolver)
    }

    /// Load configuration from `dir` with a custom secret resolver.
    pub fn load_from_dir(
        dir: &Path,
        profile: &str,
        resolver: &dyn SecretResolver,
    ) -> Result<Self, ConfigError> {
        let active_profile = std::env::var(PROFILE_ENV).unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        loader::load_yaml_file(&dir.join("application.yaml"), &mut values)?;
        loader::load_yaml_file(
            &dir.join(format!("application-{active_profile}.yaml")),
            &mut values,
        )?;

        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::from_path(dir.join(format!(".env.{active_profile}")));

        resolve_string_values(&mut values, resolver)?;
        loader::overlay_env(ENV_PREFIX, std::env::vars(), &mut values);

        tracing::debug!(profile = %active_profile, keys = values.len(), "configuration loaded");

        Ok(RelataConfig {
            values,
            profile: active_profile,
        })
    }

    /// Create a config from a YAML string.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(RelataConfig {
            values,
            profile: profile.to_string(),
        })
    }

    /// Create an empty config.
    pub fn empty() -> Self {
        RelataConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a typed value for the given dot-separated key.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, returning `default` when the key is missing.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Path of the profile-specific YAML file for this config's profile.
    pub fn profile_file(&self, dir: &Path) -> PathBuf {
        dir.join(format!("application-{}.yaml", self.profile))
    }
}

fn resolve_string_values(
    values: &mut HashMap<String, ConfigValue>,
    resolver: &dyn SecretResolver,
) -> Result<(), ConfigError> {
    for (key, value) in values.iter_mut() {
        if let ConfigValue::String(s) = value {
            if s.contains("${") {
                let resolved = secrets::resolve_placeholders(s, resolver).map_err(|e| match e {
                    ConfigError::NotFound(reference) => {
                        ConfigError::NotFound(format!("{reference} (referenced by '{key}')"))
                    }
                    other => other,
                })?;
                *s = resolved;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_from_yaml_str_flattens_nested_keys() {
        let config = RelataConfig::from_yaml_str(
            "database:\n  url: Server=db;Database=WxUtilDB\n  dialect: sql\n",
            "dev",
        )
        .unwrap();
        assert_eq!(
            config.get::<String>("database.url").unwrap(),
            "Server=db;Database=WxUtilDB"
        );
        assert_eq!(config.get::<String>("database.dialect").unwrap(), "sql");
        assert_eq!(config.profile(), "dev");
    }

    #[test]
    fn test_missing_key() {
        let config = RelataConfig::empty();
        assert!(matches!(
            config.get::<String>("database.dialect"),
            Err(ConfigError::NotFound(_))
        ));
        assert_eq!(config.get_or("database.pool", 4i64), 4);
    }

    #[test]
    #[serial]
    fn test_profile_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("application.yaml"),
            "database:\n  dialect: sql\n  url: base\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("application-prod.yaml"),
            "database:\n  url: prod\n",
        )
        .unwrap();

        let config = RelataConfig::load_from_dir(dir.path(), "prod", &DefaultSecretResolver).unwrap();
        assert_eq!(config.get::<String>("database.url").unwrap(), "prod");
        assert_eq!(config.get::<String>("database.dialect").unwrap(), "sql");
    }

    #[test]
    #[serial]
    fn test_env_overlay_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("application.yaml"), "database:\n  dialect: sql\n").unwrap();

        unsafe { std::env::set_var("RELATA_DATABASE_DIALECT", "mysql") };
        let config = RelataConfig::load_from_dir(dir.path(), "dev", &DefaultSecretResolver).unwrap();
        unsafe { std::env::remove_var("RELATA_DATABASE_DIALECT") };

        assert_eq!(config.get::<String>("database.dialect").unwrap(), "mysql");
    }

    #[test]
    #[serial]
    fn test_placeholder_in_connection_string() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("application.yaml"),
            "database:\n  url: \"Server=db;Password=${TEST_RELATA_DB_PASSWORD}\"\n",
        )
        .unwrap();

        unsafe { std::env::set_var("TEST_RELATA_DB_PASSWORD", "s3cret") };
        let config = RelataConfig::load_from_dir(dir.path(), "dev", &DefaultSecretResolver).unwrap();
        unsafe { std::env::remove_var("TEST_RELATA_DB_PASSWORD") };

        assert_eq!(
            config.get::<String>("database.url").unwrap(),
            "Server=db;Password=s3cret"
        );
    }
}
