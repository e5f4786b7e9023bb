//! CLI configuration.
//!
//! A TOML file names the target and carries the run and logging settings;
//! command-line flags override individual values.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use linprobe_core::CheckConfig;

/// Configuration of one `linprobe` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Name of the registered target to check.
    pub target: String,

    /// Run settings.
    pub check: CheckConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            target: "locked-set".to_string(),
            check: CheckConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Log format (pretty, json, compact).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merges CLI arguments into the configuration.
    pub fn merge_cli_args(&mut self, args: &super::CliArgs) {
        if let Some(ref target) = args.target {
            self.target = target.clone();
        }
        if let Some(iterations) = args.iterations {
            self.check.iterations = iterations;
        }
        if let Some(seed) = args.seed {
            self.check.seed = Some(seed);
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if linprobe_targets::find(&self.target).is_none() {
            anyhow::bail!(
                "Unknown target: {} (see --list-targets)",
                self.target
            );
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        self.check
            .validate()
            .context("Invalid check configuration")?;

        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();

        assert_eq!(config.target, "locked-set");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.check, CheckConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CliConfig::default();

        config.target = "btree".to_string();
        assert!(config.validate().is_err());
        config.target = "racy-set".to_string();

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());

        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
        config.logging.format = "json".to_string();

        config.check.iterations = 0;
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("iteration count must be positive"));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            r#"
target = "racy-counter"

[check]
iterations = 40
actors_per_thread = ["1:2", "1:2", "1:2"]
seed = 9

[check.params.key]
generator = "int"
config = "1:3"

[logging]
format = "compact"
"#,
        )
        .unwrap();

        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.target, "racy-counter");
        assert_eq!(config.check.iterations, 40);
        assert_eq!(config.check.threads(), 3);
        assert_eq!(config.check.seed, Some(9));
        assert_eq!(config.check.params["key"].config, "1:3");
        assert_eq!(config.check.timeout_ms, CheckConfig::default().timeout_ms);
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = CliConfig::default();
        let toml_str = config.to_toml().unwrap();

        let parsed: CliConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
