use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::catalog::DEFAULT_MAX_CATALOG_SIZE;
use crate::recommend::RecommendOptions;

/// Application configuration loaded from TOML config file.
/// All fields have defaults, so the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Largest catalog loaded for recommendations.
    pub max_catalog_size: usize,
    /// Recommendation tuning.
    pub recommend: RecommendOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            workers: 0,
            max_catalog_size: DEFAULT_MAX_CATALOG_SIZE,
            recommend: RecommendOptions::default(),
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/mixbuddy/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::debug!("No config directory, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path. Logs a warning and falls back to
    /// defaults if the file exists but can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("No config file found, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(mut config) => {
                    log::info!("Loaded config from {}", path.display());
                    if let Err(e) = config.recommend.validate() {
                        log::warn!(
                            "Invalid [recommend] in {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                        config.recommend = RecommendOptions::default();
                    }
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("mixbuddy.db")
    } else {
        // Fallback: current directory
        PathBuf::from("mixbuddy.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml"));
        assert!(config.db_path.is_none());
        assert_eq!(config.workers, 0);
        assert_eq!(config.max_catalog_size, DEFAULT_MAX_CATALOG_SIZE);
        assert_eq!(config.recommend.max_results, 10);
        assert_eq!(config.recommend.tempo_window_bpm, 12.0);
    }

    #[test]
    fn test_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "workers = 3\ndb_path = \"/tmp/mix.db\"\n\n[recommend]\ntempo_window_bpm = 8.0"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path());
        assert_eq!(config.workers, 3);
        assert_eq!(config.resolve_workers(), 3);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/mix.db")));
        assert_eq!(config.recommend.tempo_window_bpm, 8.0);
        // Unset fields keep their defaults
        assert_eq!(config.recommend.max_results, 10);
        assert_eq!(config.max_catalog_size, DEFAULT_MAX_CATALOG_SIZE);
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = \"lots\"").unwrap();
        let config = AppConfig::load_from(file.path());
        assert_eq!(config.workers, 0);
    }

    #[test]
    fn test_invalid_recommend_options_fall_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "workers = 2\n\n[recommend]\ntempo_window_bpm = nan\nmax_results = 5"
        )
        .unwrap();
        let config = AppConfig::load_from(file.path());
        // The rest of the file still applies
        assert_eq!(config.workers, 2);
        assert_eq!(config.recommend.tempo_window_bpm, 12.0);
        assert_eq!(config.recommend.max_results, 10);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[recommend]\nmax_results = 0").unwrap();
        let config = AppConfig::load_from(file.path());
        assert_eq!(config.recommend.max_results, 10);
    }

    #[test]
    fn test_auto_workers_at_least_one() {
        assert!(AppConfig::default().resolve_workers() >= 1);
    }
}
