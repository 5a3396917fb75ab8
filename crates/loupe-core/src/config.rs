//! Configuration for loupe.

use crate::CoreError;
use loupe_indexer::scanner::{default_workers, SkipDirs};
use loupe_indexer::{ScanOptions, WatcherOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-local configuration file, relative to the project root.
pub const PROJECT_CONFIG_FILE: &str = ".loupe.yaml";

/// Loupe configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoupeConfig {
    /// Base directory for project caches (default: the user cache dir)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Watcher debounce in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum file size to index in bytes (default: 2MiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Hashing/parsing worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Directory names skipped in addition to the built-in list
    #[serde(default)]
    pub extra_skip_dirs: Vec<String>,

    /// Keep the index current by watching the project
    #[serde(default = "default_watch")]
    pub watch: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024 // 2MiB
}

fn default_watch() -> bool {
    true
}

impl Default for LoupeConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: default_log_level(),
            debounce_ms: default_debounce_ms(),
            max_file_size: default_max_file_size(),
            workers: default_workers(),
            extra_skip_dirs: Vec::new(),
            watch: default_watch(),
        }
    }
}

impl LoupeConfig {
    /// Load configuration for a project, falling back to defaults.
    ///
    /// `<project>/.loupe.yaml` is tried first, then `<config dir>/loupe/config.yaml`.
    /// `LOUPE_LOG` and `LOUPE_CACHE_DIR` override the loaded values.
    pub fn load(project_root: &Path) -> Self {
        let candidates = [
            Some(project_root.join(PROJECT_CONFIG_FILE)),
            dirs::config_dir().map(|d| d.join("loupe").join("config.yaml")),
        ];

        let mut config = match candidates.into_iter().flatten().find(|p| p.exists()) {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!(path = ?path, error = %e, "Failed to load config file");
                Self::default()
            }),
            None => Self::default(),
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Apply `LOUPE_LOG` and `LOUPE_CACHE_DIR` as read through `var`.
    pub fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = var("LOUPE_LOG").filter(|v| !v.is_empty()) {
            self.log_level = level;
        }
        if let Some(dir) = var("LOUPE_CACHE_DIR").filter(|v| !v.is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    /// Base directory holding every project cache.
    pub fn cache_base(&self) -> Result<PathBuf, CoreError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|d| d.join("loupe"))
                .ok_or(CoreError::NoCacheDir),
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_file_size: self.max_file_size,
            workers: self.workers.max(1),
            extra_skip_dirs: self.extra_skip_dirs.clone(),
            ..ScanOptions::default()
        }
    }

    pub fn watcher_options(&self) -> WatcherOptions {
        WatcherOptions {
            debounce_duration: Duration::from_millis(self.debounce_ms),
            skip_dirs: SkipDirs::with_extra(self.extra_skip_dirs.iter().cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = LoupeConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.debounce_ms, 200);
        assert_eq!(config.max_file_size, 2 * 1024 * 1024);
        assert!(config.workers >= 1 && config.workers <= 16);
        assert!(config.watch);
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: LoupeConfig =
            serde_yaml::from_str("debounce_ms: 50\nextra_skip_dirs: [dist]\n").unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.extra_skip_dirs, vec!["dist"]);
        assert_eq!(config.log_level, "info");
        assert!(config.watch);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LoupeConfig::default();
        config.apply_env_overrides(|name| match name {
            "LOUPE_LOG" => Some("debug".to_string()),
            "LOUPE_CACHE_DIR" => Some("/tmp/loupe-cache".to_string()),
            _ => None,
        });
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.cache_base().unwrap(), PathBuf::from("/tmp/loupe-cache"));

        let mut untouched = LoupeConfig::default();
        untouched.apply_env_overrides(|_| Some(String::new()));
        assert_eq!(untouched, LoupeConfig::default());
    }

    #[test]
    fn test_project_file_is_used() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "watch: false\nworkers: 3\n").unwrap();

        let config = LoupeConfig::load(dir.path());
        assert!(!config.watch);
        assert_eq!(config.workers, 3);
        assert_eq!(config.scan_options().workers, 3);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(&path, "workers: [not, a, number]\n").unwrap();

        assert!(matches!(LoupeConfig::load_from(&path), Err(CoreError::Config(_))));
        assert_eq!(LoupeConfig::load(dir.path()).workers, default_workers());
    }
}
