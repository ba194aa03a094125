//! Pipeline Configuration
//!
//! Zero-config by default. Supports an `appc.toml` file at the app root plus
//! environment variable substitution, the same shape as the build-tag and
//! threshold knobs a CI pipeline typically wants to override.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("validation error: {field} - {message}")]
    ValidationError { field: String, message: String },

    #[error("invalid glob pattern: {pattern} - {message}")]
    InvalidGlobPattern { pattern: String, message: String },

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Validation result for configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

/// Main configuration for a pipeline run (spec.md §4's "Config" concept,
/// threaded through every phase).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory of the app tree to process.
    pub app_root: PathBuf,

    /// The module import path package collection computes relative paths
    /// against (spec.md §4.1).
    pub module_import_path: String,

    /// Build tags in effect, in addition to the reserved toolchain tag
    /// (spec.md §4.1 / SPEC_FULL.md's build-constraint supplement).
    pub build_tags: Vec<String>,

    /// Whether `_test.go` files are collected alongside ordinary sources.
    pub include_test_files: bool,

    /// Directory patterns excluded from package collection, beyond the
    /// built-in `.git`/`node_modules`/`vendor`.
    pub exclude: Vec<String>,

    /// Fatal diagnostic threshold (spec.md §7). `0` means "use the crate
    /// default" rather than "never abort".
    pub diagnostic_threshold: usize,

    /// Directory the overlay is rendered into; relative to `app_root` if
    /// not absolute.
    pub overlay_dir: PathBuf,

    /// Per-path threshold overrides for CI gating, keyed by glob pattern.
    pub overrides: Vec<OverrideConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            app_root: PathBuf::from("."),
            module_import_path: String::new(),
            build_tags: Vec::new(),
            include_test_files: false,
            exclude: vec!["**/node_modules/**".into(), "**/.git/**".into()],
            diagnostic_threshold: crate::DEFAULT_DIAGNOSTIC_THRESHOLD,
            overlay_dir: PathBuf::from(".appc/overlay"),
            overrides: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from `<root>/appc.toml` if present, otherwise
    /// falls back to module-path inference from a `go.mod`-shaped manifest,
    /// otherwise plain defaults.
    #[must_use]
    pub fn auto_detect(root: &Path) -> Self {
        Self::from_appc_toml(root).unwrap_or_else(|_| {
            let mut config = Self::default();
            config.app_root = root.to_path_buf();
            if let Ok(text) = std::fs::read_to_string(root.join("go.mod")) {
                if let Ok(manifest) = crate::manifest::parse(&text) {
                    config.module_import_path = manifest.module_path;
                }
            }
            config
        })
    }

    /// Loads configuration from `<root>/appc.toml`.
    pub fn from_appc_toml(root: &Path) -> Result<Self, ConfigError> {
        let config_path = root.join("appc.toml");
        let content = std::fs::read_to_string(&config_path)?;
        let content = substitute_env_vars(&content)?;
        let mut config: PipelineConfig = toml::from_str(&content)?;
        config.app_root = root.to_path_buf();
        Ok(config)
    }

    /// Validates configuration shape (glob patterns, numeric ranges).
    pub fn validate(&self) -> Result<ValidationResult, ConfigError> {
        let mut errors = Vec::new();
        let warnings = Vec::new();

        for (i, pattern) in self.exclude.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ValidationError {
                    field: format!("exclude[{i}]"),
                    message: format!("invalid glob pattern: {e}"),
                });
            }
        }

        for (i, over) in self.overrides.iter().enumerate() {
            for (j, pattern) in over.files.iter().enumerate() {
                if let Err(e) = glob::Pattern::new(pattern) {
                    errors.push(ValidationError {
                        field: format!("overrides[{i}].files[{j}]"),
                        message: format!("invalid glob pattern: {e}"),
                    });
                }
            }
        }

        if self.module_import_path.is_empty() {
            errors.push(ValidationError {
                field: "module_import_path".into(),
                message: "module_import_path must not be empty".into(),
            });
        }

        Ok(ValidationResult { errors, warnings })
    }

    /// Serializes to a TOML string, for `appc init`-style scaffolding.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Per-path diagnostic threshold override, for CI gating (mirrors the
/// teacher's `OverrideConfig` pattern).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverrideConfig {
    pub files: Vec<String>,
    pub diagnostic_threshold: Option<usize>,
}

/// Substitutes environment variables in a string. Supports `$VAR` and
/// `${VAR}` syntax.
pub fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(content.len());
    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'{' {
                if let Some(end) = content[i + 2..].find('}') {
                    let name = &content[i + 2..i + 2 + end];
                    if is_valid_var_name(name) {
                        result.push_str(&env::var(name).unwrap_or_default());
                        i += 2 + end + 1;
                        continue;
                    }
                }
            } else if is_ident_start(bytes[i + 1]) {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_ident_continue(bytes[end]) {
                    end += 1;
                }
                let name = &content[start..end];
                result.push_str(&env::var(name).unwrap_or_default());
                i = end;
                continue;
            }
        }
        let ch_len = content[i..].chars().next().map_or(1, char::len_utf8);
        result.push_str(&content[i..i + ch_len]);
        i += ch_len;
    }
    Ok(result)
}

fn is_valid_var_name(s: &str) -> bool {
    !s.is_empty() && is_ident_start(s.as_bytes()[0]) && s.bytes().all(is_ident_continue)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_threshold() {
        let config = PipelineConfig::default();
        assert_eq!(config.diagnostic_threshold, crate::DEFAULT_DIAGNOSTIC_THRESHOLD);
        assert!(!config.include_test_files);
    }

    #[test]
    fn validation_catches_empty_module_path() {
        let config = PipelineConfig::default();
        let result = config.validate().unwrap();
        assert!(!result.is_valid());
    }

    #[test]
    fn validation_catches_invalid_glob() {
        let mut config = PipelineConfig::default();
        config.module_import_path = "example.com/app".to_string();
        config.exclude.push("[invalid".into());
        let result = config.validate().unwrap();
        assert!(!result.is_valid());
    }

    #[test]
    fn env_var_substitution_both_forms() {
        // SAFETY: test-local environment variable, set and cleared within this test.
        unsafe {
            env::set_var("APPC_TEST_VAR", "value");
        }
        assert_eq!(substitute_env_vars("path/$APPC_TEST_VAR/x").unwrap(), "path/value/x");
        assert_eq!(substitute_env_vars("path/${APPC_TEST_VAR}/x").unwrap(), "path/value/x");
        unsafe {
            env::remove_var("APPC_TEST_VAR");
        }
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = PipelineConfig::default();
        config.module_import_path = "example.com/app".to_string();
        let toml_str = config.to_toml().unwrap();
        let parsed: PipelineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.module_import_path, parsed.module_import_path);
    }
}
