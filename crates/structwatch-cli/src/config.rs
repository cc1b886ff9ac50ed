//! Configuration for the watch command.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use structwatch_core::{EngineConfig, DEFAULT_IGNORE_PATTERNS};
use structwatch_structure::StructureOptions;

/// Name of the per-project config file looked up in the watched root.
pub const PROJECT_CONFIG_FILE: &str = ".structwatch.yaml";

/// Watch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Move window, debounce and scan timings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Gitignore-style patterns never watched, indexed or written out
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Structure document output
    #[serde(default)]
    pub structure: StructureOptions,
}

/// A configuration together with where it came from.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: WatchConfig,
    pub path: Option<PathBuf>,
    /// Set when a config file was found but could not be used
    pub warning: Option<String>,
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            ignore: default_ignore(),
            log_level: default_log_level(),
            structure: StructureOptions::default(),
        }
    }
}

impl WatchConfig {
    /// Config files tried for `root`, most specific first.
    pub fn candidates(root: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![root.join(PROJECT_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("structwatch").join("config.yaml"));
        }
        candidates
    }

    /// Load the first config file that exists, falling back to defaults.
    ///
    /// Runs before logging is set up, so problems are returned rather than
    /// logged.
    pub fn load(root: &Path) -> LoadedConfig {
        let Some(path) = Self::candidates(root).into_iter().find(|p| p.exists()) else {
            return LoadedConfig {
                config: Self::default(),
                path: None,
                warning: None,
            };
        };

        match Self::load_from(&path) {
            Ok(config) => LoadedConfig {
                config,
                path: Some(path),
                warning: None,
            },
            Err(e) => LoadedConfig {
                config: Self::default(),
                warning: Some(format!("Failed to load config file {}: {}", path.display(), e)),
                path: Some(path),
            },
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Configured patterns plus the output document and its backups.
    pub fn ignore_patterns(&self, root: &Path) -> Vec<String> {
        let mut patterns = self.ignore.clone();

        let output = &self.structure.output;
        let relative = if output.is_absolute() {
            output.strip_prefix(root).ok()
        } else {
            Some(output.as_path())
        };
        if let Some(relative) = relative {
            let relative = relative.to_string_lossy().replace('\\', "/");
            patterns.push(format!("/{relative}"));
            patterns.push(format!("/{relative}.*.backup"));
        }

        patterns
    }

    /// Log filter directive; `debug` overrides the configured level.
    pub fn log_filter(&self, debug: bool) -> &str {
        if debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = WatchConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.engine.move_timeout_ms, 300);
        assert!(config.ignore.contains(&"node_modules".to_string()));
        assert_eq!(config.log_filter(false), "info");
        assert_eq!(config.log_filter(true), "debug");
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join(PROJECT_CONFIG_FILE),
            "engine:\n  debounce_ms: 50\nlog_level: warn\nstructure:\n  output: tree.yaml\n",
        )
        .unwrap();

        let loaded = WatchConfig::load(temp_dir.path());
        assert!(loaded.warning.is_none());
        assert_eq!(loaded.path, Some(temp_dir.path().join(PROJECT_CONFIG_FILE)));

        let config = loaded.config;
        assert_eq!(config.engine.debounce_ms, 50);
        assert_eq!(config.engine.move_timeout_ms, 300);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.structure.output, PathBuf::from("tree.yaml"));
        assert_eq!(config.ignore, default_ignore());
    }

    #[test]
    fn test_invalid_project_config_falls_back() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(PROJECT_CONFIG_FILE), "engine: [1, 2\n").unwrap();

        let loaded = WatchConfig::load(temp_dir.path());
        assert!(loaded.warning.is_some());
        assert_eq!(loaded.config, WatchConfig::default());
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let temp_dir = tempdir().unwrap();
        assert!(WatchConfig::load_from(&temp_dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_ignore_patterns_include_output() {
        let root = Path::new("/project");
        let config = WatchConfig::default();
        let patterns = config.ignore_patterns(root);
        assert!(patterns.contains(&"/.cursorrules".to_string()));
        assert!(patterns.contains(&"/.cursorrules.*.backup".to_string()));

        let mut config = WatchConfig::default();
        config.structure.output = PathBuf::from("/elsewhere/rules.yaml");
        assert_eq!(config.ignore_patterns(root), default_ignore());
    }
}
