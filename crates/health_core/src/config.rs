//! Runtime configuration for hosts embedding the health core

use crate::artifacts::{
    ArtifactPaths, DEFAULT_CLASSIFIER_FILE, DEFAULT_SCALER_FILE, DEFAULT_TARGET_FILE,
    DEFAULT_VOCABULARIES_FILE,
};
use crate::errors::{HealthError, Result};
use crate::verdict::{VerdictPolicy, DEFAULT_UNCERTAIN_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding `artifacts.directory`
pub const ENV_ARTIFACT_DIR: &str = "ANIMAL_HEALTH_ARTIFACT_DIR";
/// Environment variable overriding `inference.uncertain_threshold`
pub const ENV_UNCERTAIN_THRESHOLD: &str = "ANIMAL_HEALTH_UNCERTAIN_THRESHOLD";
/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "ANIMAL_HEALTH_LOG_LEVEL";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HealthConfig {
    pub artifacts: ArtifactConfig,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
}

/// Where the model artifacts live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory holding the artifact files
    pub directory: PathBuf,
    pub classifier: String,
    pub vocabularies: String,
    pub scaler: String,
    pub target: String,
    /// Refuse to start unless every artifact loads
    pub require_all: bool,
    /// Expected bundle fingerprint (hex), checked at startup when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,
}

/// Verdict settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Confidences strictly below this are reported as uncertain
    pub uncertain_threshold: f64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Include the module target in log lines
    pub with_target: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("models"),
            classifier: DEFAULT_CLASSIFIER_FILE.to_string(),
            vocabularies: DEFAULT_VOCABULARIES_FILE.to_string(),
            scaler: DEFAULT_SCALER_FILE.to_string(),
            target: DEFAULT_TARGET_FILE.to_string(),
            require_all: true,
            expected_hash: None,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            uncertain_threshold: DEFAULT_UNCERTAIN_THRESHOLD,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

impl HealthConfig {
    /// Load configuration from a TOML file; absent keys keep their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            HealthError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| HealthError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Save configuration as TOML
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| HealthError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_ARTIFACT_DIR) {
            self.artifacts.directory = PathBuf::from(dir);
        }

        if let Some(val) = lookup(ENV_UNCERTAIN_THRESHOLD) {
            self.inference.uncertain_threshold = val.trim().parse().map_err(|_| {
                HealthError::Config(format!("{ENV_UNCERTAIN_THRESHOLD} is not a number: {val}"))
            })?;
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Check the configuration; hard errors fail, soft issues come back as warnings
    pub fn validate(&self) -> Result<Vec<String>> {
        let threshold = self.inference.uncertain_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(HealthError::Config(format!(
                "uncertain_threshold {threshold} must be within [0, 1]"
            )));
        }

        let mut warnings = Vec::new();
        for (key, file) in [
            ("artifacts.classifier", &self.artifacts.classifier),
            ("artifacts.vocabularies", &self.artifacts.vocabularies),
            ("artifacts.scaler", &self.artifacts.scaler),
            ("artifacts.target", &self.artifacts.target),
        ] {
            if file.trim().is_empty() {
                warnings.push(format!("{key} is empty, that artifact can never load"));
            }
        }
        if !self.artifacts.require_all {
            warnings.push(
                "artifacts.require_all is off, requests may fail with missing models".to_string(),
            );
        }
        if threshold == 0.0 {
            warnings.push("uncertain_threshold is 0, no prediction will be uncertain".to_string());
        }
        if let Some(hash) = &self.artifacts.expected_hash {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                warnings.push("artifacts.expected_hash is not a 64 character hex digest".to_string());
            }
        }

        if !warnings.is_empty() {
            warn!("Configuration validation warnings: {:?}", warnings);
        }
        Ok(warnings)
    }

    /// Artifact file locations
    pub fn artifact_paths(&self) -> ArtifactPaths {
        let dir = &self.artifacts.directory;
        ArtifactPaths {
            classifier: dir.join(&self.artifacts.classifier),
            vocabularies: dir.join(&self.artifacts.vocabularies),
            scaler: dir.join(&self.artifacts.scaler),
            target: dir.join(&self.artifacts.target),
        }
    }

    pub fn verdict_policy(&self) -> VerdictPolicy {
        VerdictPolicy::new(self.inference.uncertain_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let config = HealthConfig::default();
        assert!(config.validate().unwrap().is_empty());
        assert_eq!(config.inference.uncertain_threshold, 0.60);
        assert_eq!(
            config.artifact_paths(),
            ArtifactPaths::in_dir(Path::new("models"))
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: HealthConfig = toml::from_str(
            r#"
            [artifacts]
            directory = "/srv/models"

            [inference]
            uncertain_threshold = 0.7
            "#,
        )
        .unwrap();
        assert_eq!(config.artifacts.directory, PathBuf::from("/srv/models"));
        assert_eq!(config.artifacts.scaler, DEFAULT_SCALER_FILE);
        assert!(config.artifacts.require_all);
        assert_eq!(config.verdict_policy().uncertain_threshold, 0.7);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("health.toml");

        let mut config = HealthConfig::default();
        config.artifacts.expected_hash = Some("ab".repeat(32));
        config.logging.level = "debug".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = HealthConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            (ENV_ARTIFACT_DIR, "/tmp/artifacts"),
            (ENV_UNCERTAIN_THRESHOLD, " 0.55 "),
            (ENV_LOG_LEVEL, "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = HealthConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.artifacts.directory, PathBuf::from("/tmp/artifacts"));
        assert_eq!(config.inference.uncertain_threshold, 0.55);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn bad_threshold_override_is_an_error() {
        let mut config = HealthConfig::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_UNCERTAIN_THRESHOLD).then(|| "sixty".to_string())
        });
        assert!(matches!(result, Err(HealthError::Config(_))));
    }

    #[test]
    fn validation_rejects_threshold_and_warns() {
        let mut config = HealthConfig::default();
        config.inference.uncertain_threshold = 1.2;
        assert!(config.validate().is_err());

        let mut config = HealthConfig::default();
        config.artifacts.scaler = String::new();
        config.artifacts.require_all = false;
        config.artifacts.expected_hash = Some("xyz".to_string());
        assert_eq!(config.validate().unwrap().len(), 3);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config: HealthConfig =
            toml::from_str(include_str!("../../../config/health.toml")).unwrap();
        assert_eq!(config, HealthConfig::default());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            HealthConfig::load_from_file(dir.path().join("absent.toml")),
            Err(HealthError::Config(_))
        ));
    }
}
