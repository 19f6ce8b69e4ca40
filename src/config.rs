//! Sorter configuration and validation.
//!
//! Configuration comes from an optional TOML file, with command-line values
//! layered on top by the CLI. It is only ever read, never written back.
//!
//! # Configuration File Format
//!
//! ```toml
//! path = "/home/me/Downloads"
//! interval = 30
//! rescan_destinations = false
//!
//! [[rules]]
//! folder = "PDFs"
//! extension = ".pdf"
//!
//! [[rules]]
//! folder = "Invoices"
//! keyword = "invoice"
//! ```

use crate::routing_rule::{RoutingRule, RuleSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default number of seconds between two passes.
pub const DEFAULT_INTERVAL: u32 = 30;

/// Errors raised while loading or validating configuration.
///
/// These are reported before a cycle starts; a cycle never starts with an
/// invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid path provided.")]
    EmptyPath,

    #[error("Invalid path provided: {} does not exist", .0.display())]
    PathNotFound(PathBuf),

    #[error("Invalid path provided: {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("At least one folder name is required.")]
    NoActiveRule,

    #[error("Too many rules: {count} given, at most {max} are supported")]
    TooManyRules { count: usize, max: usize },

    #[error("Destination folder '{0}' must be a relative path inside the sorted directory")]
    UnsafeDestination(String),

    #[error("Invalid rule '{0}': expected FOLDER[:EXTENSION[:KEYWORD]]")]
    InvalidRule(String),

    #[error("Interval must be at least one second")]
    InvalidInterval,

    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// One rule slot as written in the config file or on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub folder: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extension: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keyword: String,
}

impl RuleEntry {
    pub fn to_rule(&self) -> RoutingRule {
        RoutingRule::new(&self.folder, &self.extension, &self.keyword)
    }
}

/// Parses `FOLDER[:EXTENSION[:KEYWORD]]`, e.g. `PDFs:.pdf` or `Invoices::invoice`.
impl FromStr for RuleEntry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let folder = parts.next().unwrap_or_default();
        if folder.is_empty() {
            return Err(ConfigError::InvalidRule(s.to_string()));
        }

        Ok(Self {
            folder: folder.to_string(),
            extension: parts.next().unwrap_or_default().to_string(),
            keyword: parts.next().unwrap_or_default().to_string(),
        })
    }
}

/// Complete sorter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SorterConfig {
    /// Directory whose top-level entries are sorted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Seconds to count down between passes.
    #[serde(default = "default_interval")]
    pub interval: u32,

    /// Whether existing destination folders are themselves classified.
    #[serde(default)]
    pub rescan_destinations: bool,

    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

fn default_interval() -> u32 {
    DEFAULT_INTERVAL
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            path: None,
            interval: DEFAULT_INTERVAL,
            rescan_destinations: false,
            rules: Vec::new(),
        }
    }
}

impl SorterConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.foldersortrc.toml` in the current directory
    /// 3. Look for `~/.config/foldersort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any file found is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".foldersortrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("foldersort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Builds the ordered rule set from the configured slots.
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        RuleSet::new(self.rules.iter().map(RuleEntry::to_rule).collect())
    }

    /// Checks everything a cycle needs and returns the target and rules.
    pub fn validated(&self) -> Result<(PathBuf, RuleSet), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        let target = self.path.clone().unwrap_or_default();
        let rules = self.rule_set()?;
        validate(&target, &rules)?;
        Ok((target, rules))
    }
}

/// Checks that `path` names an existing directory.
pub fn validate_target(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyPath);
    }
    if !path.exists() {
        return Err(ConfigError::PathNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// The validation contract checked before a cycle may start.
///
/// The path must be an existing directory and at least one rule must name a
/// destination folder.
pub fn validate(path: &Path, rules: &RuleSet) -> Result<(), ConfigError> {
    validate_target(path)?;
    if !rules.has_active_rule() {
        return Err(ConfigError::NoActiveRule);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SorterConfig::default();
        assert_eq!(config.interval, 30);
        assert!(!config.rescan_destinations);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let config = SorterConfig::from_toml(
            r#"
            path = "/tmp/inbox"
            interval = 10

            [[rules]]
            folder = "PDFs"
            extension = ".pdf"

            [[rules]]
            folder = "Invoices"
            keyword = "invoice"
            "#,
        )
        .unwrap();

        assert_eq!(config.path, Some(PathBuf::from("/tmp/inbox")));
        assert_eq!(config.interval, 10);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].extension, ".pdf");
        assert_eq!(config.rules[1].keyword, "invoice");
        assert_eq!(config.rules[1].extension, "");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = SorterConfig::from_toml("").unwrap();
        assert_eq!(config, SorterConfig::default());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let result = SorterConfig::from_toml("rules = 3");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_toml_round_trip_keeps_rules() {
        let config = SorterConfig {
            path: Some(PathBuf::from("/data")),
            rules: vec!["PDFs:.pdf".parse().unwrap()],
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("folder = \"PDFs\""));
        assert!(!text.contains("keyword"));
        assert_eq!(SorterConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("sort.toml");
        fs::write(&file, "interval = 5\n[[rules]]\nfolder = \"Images\"\nextension = \".png\"\n")
            .unwrap();

        let config = SorterConfig::load(Some(&file)).unwrap();
        assert_eq!(config.interval, 5);
        assert_eq!(config.rules[0].folder, "Images");
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = SorterConfig::load(Some(Path::new("/non/existent/sort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_rule_entry_from_str() {
        let entry: RuleEntry = "PDFs:.pdf".parse().unwrap();
        assert_eq!(entry.folder, "PDFs");
        assert_eq!(entry.extension, ".pdf");
        assert_eq!(entry.keyword, "");

        let entry: RuleEntry = "Invoices::invoice".parse().unwrap();
        assert_eq!(entry.extension, "");
        assert_eq!(entry.keyword, "invoice");

        let entry: RuleEntry = "Misc".parse().unwrap();
        assert_eq!(entry.folder, "Misc");

        assert!(matches!(
            ":.pdf".parse::<RuleEntry>(),
            Err(ConfigError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_validate_empty_path() {
        let rules = RuleSet::new(vec![RoutingRule::new("A", ".a", "")]).unwrap();
        assert_eq!(validate(Path::new(""), &rules), Err(ConfigError::EmptyPath));
    }

    #[test]
    fn test_validate_missing_path() {
        let rules = RuleSet::new(vec![RoutingRule::new("A", ".a", "")]).unwrap();
        assert!(matches!(
            validate(Path::new("/non/existent/path"), &rules),
            Err(ConfigError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_validate_file_is_not_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            validate_target(&file),
            Err(ConfigError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_validate_requires_active_rule() {
        let temp_dir = TempDir::new().unwrap();
        let rules = RuleSet::new(vec![RoutingRule::new("", ".pdf", "report")]).unwrap();
        assert_eq!(
            validate(temp_dir.path(), &rules),
            Err(ConfigError::NoActiveRule)
        );
    }

    #[test]
    fn test_validated_rejects_zero_interval() {
        let temp_dir = TempDir::new().unwrap();
        let config = SorterConfig {
            path: Some(temp_dir.path().to_path_buf()),
            interval: 0,
            rules: vec!["A:.a".parse().unwrap()],
            ..Default::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::InvalidInterval));
    }

    #[test]
    fn test_validated_rejects_escaping_destination() {
        let temp_dir = TempDir::new().unwrap();
        let config = SorterConfig {
            path: Some(temp_dir.path().to_path_buf()),
            rules: vec!["..:.pdf".parse().unwrap()],
            ..Default::default()
        };
        assert_eq!(
            config.validated(),
            Err(ConfigError::UnsafeDestination("..".to_string()))
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ConfigError::EmptyPath.to_string(), "Invalid path provided.");
        assert_eq!(
            ConfigError::NoActiveRule.to_string(),
            "At least one folder name is required."
        );
    }
}
