//! Configuration.
//!
//! - [`Config`]: runtime settings from `JOBRANK_*` environment variables.
//! - [`MatchingConfig`]: weights, thresholds and list sizes from a JSON file.

pub mod error;
pub mod matching;


pub use error::ConfigError;
pub use matching::{MatchingConfig, Thresholds, WeightConfig};

use std::env;
use std::path::PathBuf;

use crate::cache::EmbeddingCache;
use crate::vectordb::DEFAULT_INDEX_FILENAME;

/// Runtime configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `JOBRANK_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for the index snapshot and match files. Default: `./.data`.
    pub data_dir: PathBuf,

    /// MiniLM model directory. When unset the encoder runs in stub mode.
    pub model_path: Option<PathBuf>,

    /// JSON [`MatchingConfig`]. When unset the built-in defaults apply.
    pub matching_config_path: Option<PathBuf>,

    /// Directory with `profiles.json` and `jobs.json`. Default: `<data_dir>/catalog`.
    pub catalog_dir: Option<PathBuf>,

    /// Concurrent per-user runs in a batch. Default: `4`.
    pub workers: usize,

    /// Max cached embeddings. Default: `10_000`.
    pub embedding_cache_capacity: u64,

    /// Try Metal/CUDA for the encoder. Default: `false`.
    pub use_gpu: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./.data"),
            model_path: None,
            matching_config_path: None,
            catalog_dir: None,
            workers: 4,
            embedding_cache_capacity: EmbeddingCache::DEFAULT_CAPACITY,
            use_gpu: false,
        }
    }
}

impl Config {
    const ENV_DATA_DIR: &'static str = "JOBRANK_DATA_DIR";
    const ENV_MODEL_PATH: &'static str = "JOBRANK_MODEL_PATH";
    const ENV_MATCHING_CONFIG: &'static str = "JOBRANK_MATCHING_CONFIG";
    const ENV_CATALOG_DIR: &'static str = "JOBRANK_CATALOG_DIR";
    const ENV_WORKERS: &'static str = "JOBRANK_WORKERS";
    const ENV_CACHE_CAPACITY: &'static str = "JOBRANK_EMBEDDING_CACHE_CAPACITY";
    const ENV_USE_GPU: &'static str = "JOBRANK_USE_GPU";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            data_dir: Self::parse_path_from_env(Self::ENV_DATA_DIR, defaults.data_dir),
            model_path: Self::parse_optional_path_from_env(Self::ENV_MODEL_PATH),
            matching_config_path: Self::parse_optional_path_from_env(Self::ENV_MATCHING_CONFIG),
            catalog_dir: Self::parse_optional_path_from_env(Self::ENV_CATALOG_DIR),
            workers: Self::parse_positive_from_env(Self::ENV_WORKERS, defaults.workers)?,
            embedding_cache_capacity: Self::parse_positive_from_env(
                Self::ENV_CACHE_CAPACITY,
                defaults.embedding_cache_capacity,
            )?,
            use_gpu: Self::parse_bool_from_env(Self::ENV_USE_GPU, defaults.use_gpu)?,
        })
    }

    /// Validates paths (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.exists() && !self.data_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.data_dir.clone(),
            });
        }

        if let Some(ref path) = self.model_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_dir() {
                return Err(ConfigError::NotADirectory { path: path.clone() });
            }
        }

        if let Some(ref path) = self.matching_config_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        Ok(())
    }

    /// Loads the matching configuration file, or defaults when none is configured.
    pub fn load_matching_config(&self) -> Result<MatchingConfig, ConfigError> {
        match &self.matching_config_path {
            Some(path) => MatchingConfig::from_file(path),
            None => Ok(MatchingConfig::default()),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_INDEX_FILENAME)
    }

    pub fn matches_dir(&self) -> PathBuf {
        self.data_dir.join("matches")
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.catalog_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("catalog"))
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        Self::parse_optional_path_from_env(var_name).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_positive_from_env<T>(name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let Ok(raw) = env::var(name) else {
            return Ok(default);
        };
        let value: T = raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvValue {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        if value <= T::default() {
            return Err(ConfigError::InvalidEnvValue {
                name,
                value: raw,
                reason: "must be positive".to_string(),
            });
        }
        Ok(value)
    }

    fn parse_bool_from_env(name: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Ok(raw) = env::var(name) else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidEnvValue {
                name,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        }
    }
}
