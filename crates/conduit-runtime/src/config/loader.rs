//! Layered configuration loading (spec §6), via figment.
//!
//! Grounded on the teacher's figment-based loader: file providers (TOML,
//! YAML, feature-gated) merged under an `CONDUIT_`-prefixed, `__`-nested
//! environment layer, the common "file for defaults, env for overrides"
//! shape. The teacher's hand-rolled `${VAR}`/`${VAR:-default}` interpolation
//! (`regex_lite`) is dropped in favor of figment's own `Env` provider, which
//! already does this job without a bespoke regex pass.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized};
use tracing::info;

use super::error::{ConfigError, ConfigResult};
use super::schema::ConduitConfig;

/// Builds up a figment from file and environment sources, then extracts and
/// validates a [`ConduitConfig`].
pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    /// Starts from the schema's defaults, so a config with no file and no
    /// environment overrides still extracts successfully (bar the required
    /// `account` field, which [`ConduitConfig::validate`] catches).
    pub fn new() -> Self {
        Self { figment: Figment::from(Serialized::defaults(ConduitConfig::default())) }
    }

    /// Merges a configuration file, format inferred from its extension.
    /// Unrecognized extensions are merged as TOML.
    pub fn merge_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        info!(path = %path.display(), "merging configuration file");
        self.figment = match path.extension().and_then(|e| e.to_str()) {
            #[cfg(feature = "yaml-config")]
            Some("yaml") | Some("yml") => self.figment.merge(figment::providers::Yaml::file(path)),
            #[cfg(feature = "toml-config")]
            _ => self.figment.merge(figment::providers::Toml::file(path)),
            #[cfg(not(feature = "toml-config"))]
            _ => self.figment,
        };
        self
    }

    /// Merges environment variables, e.g. `CONDUIT_ACCOUNT=123`,
    /// `CONDUIT_ADAPTER__PORT=8080`.
    pub fn merge_env(mut self) -> Self {
        self.figment = self.figment.merge(Env::prefixed("CONDUIT_").split("__"));
        self
    }

    /// Searches the current directory and the user config directory for a
    /// `conduit.toml`/`conduit.yaml`, merging the first one found.
    pub fn with_default_file_search(self) -> Self {
        for candidate in Self::search_paths() {
            if candidate.exists() {
                return self.merge_file(candidate);
            }
        }
        self
    }

    fn search_paths() -> Vec<PathBuf> {
        const NAMES: &[&str] = &["conduit.toml", "conduit.yaml", "conduit.yml"];
        let mut dirs = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            dirs.push(config_dir.join("conduit"));
        }
        dirs.into_iter().flat_map(|dir| NAMES.iter().map(move |name| dir.join(name))).collect()
    }

    /// Extracts and validates the final configuration.
    pub fn load(self) -> ConfigResult<ConduitConfig> {
        let config: ConduitConfig = self.figment.extract().map_err(ConfigError::Figment)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_default_file_search().merge_env()
    }
}

/// Loads configuration from the default search paths plus environment
/// overrides.
pub fn load_config() -> ConfigResult<ConduitConfig> {
    ConfigLoader::default().load()
}

/// Loads configuration from a specific file plus environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<ConduitConfig> {
    ConfigLoader::new().merge_file(path).merge_env().load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        // SAFETY: tests run single-threaded within this process for env state.
        unsafe {
            std::env::set_var("CONDUIT_ACCOUNT", "123456");
            std::env::set_var("CONDUIT_ADAPTER__KIND", "http-poll");
            std::env::set_var("CONDUIT_ADAPTER__PORT", "8080");
        }
        let config = ConfigLoader::new().merge_env().load().unwrap();
        assert_eq!(config.account, 123456);
        unsafe {
            std::env::remove_var("CONDUIT_ACCOUNT");
            std::env::remove_var("CONDUIT_ADAPTER__KIND");
            std::env::remove_var("CONDUIT_ADAPTER__PORT");
        }
    }

    #[test]
    fn missing_account_fails_validation() {
        let result = ConfigLoader::new().load();
        assert!(matches!(result, Err(ConfigError::MissingField { .. })));
    }
}
