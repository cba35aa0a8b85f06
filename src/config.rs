//! Configuration management for schema registration
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-register.toml)
//! - Environment variables (SCHEMA_REGISTER__*)
//!
//! ## Example config file (schema-register.toml):
//! ```toml
//! [source]
//! dir = "src/main/avro"
//! extension = ".avsc"
//!
//! [registry]
//! url = "http://schema-repo.internal:2876/schema-repo"
//! timeout_secs = 10
//!
//! [naming]
//! strategy = "hierarchical"
//! separator = "."
//! number_of_ancestors = 2
//!
//! [engine]
//! workers = 4
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::discovery::resolve_schema_dir;
use crate::error::Result;
use crate::naming::{StrategyKind, StrategyOptions, HIERARCHICAL_SCOPE, PROPERTY_PREFIX};

/// Main configuration for schema registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Where schema files are found
    #[serde(default)]
    pub source: SourceConfig,

    /// Registry connection settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Subject naming settings
    #[serde(default)]
    pub naming: NamingConfig,

    /// Reconciliation engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Schema source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Schema root directory (relative paths resolve against the working directory)
    #[serde(default = "default_schema_dir")]
    pub dir: PathBuf,

    /// File name suffix to match; empty matches every file
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the schema-repo REST endpoint
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Naming strategy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Strategy to use
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Separator for the hierarchical strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    /// Ancestor count for the hierarchical strategy; negative values are rejected when the strategy is built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_ancestors: Option<i64>,

    /// Raw option keys passed to the strategy as-is
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Registration workers; 1 runs everything in order on one thread
    #[serde(default = "default_workers")]
    pub workers: usize,
}

// Default value functions
fn default_schema_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_extension() -> String {
    ".avsc".to_string()
}

fn default_registry_url() -> String {
    "http://localhost:2876/schema-repo".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    1
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: default_schema_dir(),
            extension: default_extension(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl NamingConfig {
    /// Flatten the naming section into strategy options.
    ///
    /// Named settings win over the same key given in `properties`.
    pub fn strategy_options(&self) -> StrategyOptions {
        let mut options: StrategyOptions = self.properties.clone().into_iter().collect();
        if let Some(separator) = &self.separator {
            options.insert(
                format!("{PROPERTY_PREFIX}{HIERARCHICAL_SCOPE}separator"),
                separator.clone(),
            );
        }
        if let Some(count) = self.number_of_ancestors {
            options.insert(
                format!("{PROPERTY_PREFIX}{HIERARCHICAL_SCOPE}numberOfAncestors"),
                count.to_string(),
            );
        }
        options
    }
}

impl RegisterConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-register.toml",
            ".schema-register.toml",
            "config/schema-register.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(dirs) = directories::ProjectDirs::from("org", "schemarepo", "schema-register") {
            let xdg_config = dirs.config_dir().join("schema-register.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // SCHEMA_REGISTER__REGISTRY__URL=... style overrides
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_REGISTER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Schema directory resolved against the working directory
    pub fn schema_dir(&self) -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_default();
        resolve_schema_dir(&self.source.dir, &cwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistrationError;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RegisterConfig::default();
        assert_eq!(config.source.extension, ".avsc");
        assert_eq!(config.registry.timeout(), Duration::from_secs(30));
        assert_eq!(config.naming.strategy, StrategyKind::Default);
        assert_eq!(config.engine.workers, 1);
        assert!(config.naming.strategy_options().is_empty());
    }

    #[test]
    fn test_serialize_config() {
        let toml_str = toml::to_string_pretty(&RegisterConfig::default()).unwrap();
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("strategy = \"default\""));
    }

    #[test]
    fn test_strategy_options_from_naming_section() {
        let naming = NamingConfig {
            strategy: StrategyKind::Hierarchical,
            separator: Some("|".to_string()),
            number_of_ancestors: Some(2),
            properties: BTreeMap::from([
                (
                    "schema-register.hierarchical.separator".to_string(),
                    "overridden".to_string(),
                ),
                ("custom.key".to_string(), "kept".to_string()),
            ]),
        };

        let options = naming.strategy_options();
        assert_eq!(options.get("schema-register.hierarchical.separator"), Some("|"));
        assert_eq!(options.get("schema-register.hierarchical.numberOfAncestors"), Some("2"));
        assert_eq!(options.get("custom.key"), Some("kept"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("register.toml");
        std::fs::write(
            &path,
            r#"
[source]
dir = "avro"
extension = ".avdl"

[registry]
url = "http://registry.test/schema-repo"

[naming]
strategy = "hierarchical"
number_of_ancestors = 3

[engine]
workers = 2
"#,
        )
        .unwrap();

        let config = RegisterConfig::load_from(Some(path.as_path())).unwrap();
        assert_eq!(config.source.dir, PathBuf::from("avro"));
        assert_eq!(config.source.extension, ".avdl");
        assert_eq!(config.registry.url, "http://registry.test/schema-repo");
        assert_eq!(config.registry.timeout_secs, 30);
        assert_eq!(config.naming.strategy, StrategyKind::Hierarchical);
        assert_eq!(config.naming.number_of_ancestors, Some(3));
        assert_eq!(config.engine.workers, 2);
    }

    #[test]
    fn test_negative_ancestors_in_properties_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("register.toml");
        std::fs::write(
            &path,
            r#"
[naming]
strategy = "hierarchical"

[naming.properties]
"schema-register.hierarchical.numberOfAncestors" = "-3"
"#,
        )
        .unwrap();

        let config = RegisterConfig::load_from(Some(path.as_path())).unwrap();
        let result = config
            .naming
            .strategy
            .build(&config.naming.strategy_options());
        assert!(matches!(
            result,
            Err(RegistrationError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_maven_plugin_properties_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("register.toml");
        std::fs::write(
            &path,
            r#"
[naming]
strategy = "hierarchical"

[naming.properties]
"schema-repo.tools.registration.hierarchicalSubjectNameStrategy.separator" = "|"
"schema-repo.tools.registration.hierarchicalSubjectNameStrategy.numberOfAncestors" = "2"
"#,
        )
        .unwrap();

        let config = RegisterConfig::load_from(Some(path.as_path())).unwrap();
        let strategy = config
            .naming
            .strategy
            .build(&config.naming.strategy_options())
            .unwrap();
        assert_eq!(
            strategy.subject_name(Path::new("path1/path2/schema.")).unwrap(),
            "path1|path2|schema"
        );
    }

    #[test]
    fn test_save_round_trips_through_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = RegisterConfig::default();
        config.naming.strategy = StrategyKind::Hierarchical;
        config.naming.separator = Some(".".to_string());
        config.save(&path).unwrap();

        let loaded = RegisterConfig::load_from(Some(path.as_path())).unwrap();
        assert_eq!(loaded.naming.strategy, StrategyKind::Hierarchical);
        assert_eq!(loaded.naming.separator.as_deref(), Some("."));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempdir().unwrap();
        let result = RegisterConfig::load_from(Some(dir.path().join("absent.toml").as_path()));
        assert!(matches!(result, Err(RegistrationError::Config(_))));
    }
}
