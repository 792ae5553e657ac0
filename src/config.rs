//! Engine configuration loaded from TOML with `APPGRID_*` environment overrides.

use crate::errors::DbError;
use crate::query::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::store::DEFAULT_SCAN_BATCH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "APPGRID_CONFIG";
pub const CONFIG_FILE_NAME: &str = "appgrid.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page size used when a request carries no `limit`.
    pub default_limit: usize,
    /// Larger limits are clamped to this.
    pub max_limit: usize,
    /// Entities copied out of the store per read lock.
    pub scan_batch_size: usize,
    pub query_timeout_ms: Option<u64>,
    pub slow_query_ms: u64,
    /// Key for cursor tags. A random per-process key is used when unset.
    pub cursor_secret: Option<String>,
    pub cursor_ttl_secs: Option<u64>,
    /// Directory holding `entities.log`. In-memory only when unset.
    pub data_dir: Option<PathBuf>,
    pub sync_writes: bool,
    /// log4rs config file (YAML or TOML).
    pub log_config: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            scan_batch_size: DEFAULT_SCAN_BATCH,
            query_timeout_ms: None,
            slow_query_ms: 500,
            cursor_secret: None,
            cursor_ttl_secs: None,
            data_dir: None,
            sync_writes: false,
            log_config: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration.
    ///
    /// Precedence: `explicit` > `$APPGRID_CONFIG` > `./appgrid.toml` >
    /// `<config dir>/appgrid/appgrid.toml` > defaults. Environment overrides
    /// are applied on top of whichever file was used.
    ///
    /// # Errors
    /// `Config` when a named file is missing or any file fails to parse or validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DbError> {
        Self::load_with(explicit, |k| std::env::var(k).ok())
    }

    /// [`EngineConfig::load`] reading the environment through `lookup`.
    ///
    /// A path named by `explicit` or `$APPGRID_CONFIG` must exist; only the
    /// default locations are skipped when absent.
    ///
    /// # Errors
    /// As [`EngineConfig::load`].
    pub fn load_with(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DbError> {
        let named = explicit.map(Path::to_path_buf).or_else(|| lookup(CONFIG_ENV).map(PathBuf::from));
        let mut cfg = match named {
            Some(p) => Self::from_file(&p)?,
            None => match Self::default_paths().into_iter().find(|p| p.is_file()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        cfg.apply_env_with(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(cur) = std::env::current_dir() {
            paths.push(cur.join(CONFIG_FILE_NAME));
        }
        if let Some(dir) = dirs_next::config_dir() {
            paths.push(dir.join("appgrid").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// # Errors
    /// `Config` when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("{}: {e}", path.display())))?;
        let cfg = Self::from_toml_str(&text)
            .map_err(|e| DbError::Config(format!("{}: {e}", path.display())))?;
        log::debug!("loaded config from {}", path.display());
        Ok(cfg)
    }

    /// # Errors
    /// `Config` on invalid TOML or unknown value types.
    pub fn from_toml_str(text: &str) -> Result<Self, DbError> {
        toml::from_str(text).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Apply `APPGRID_*` overrides read through `lookup`.
    ///
    /// # Errors
    /// `Config` when a numeric or boolean variable does not parse.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), DbError> {
        fn num<T: std::str::FromStr>(key: &str, v: &str) -> Result<T, DbError> {
            v.trim().parse().map_err(|_| DbError::Config(format!("{key}: not a number: {v}")))
        }
        if let Some(v) = lookup("APPGRID_DEFAULT_LIMIT") {
            self.default_limit = num("APPGRID_DEFAULT_LIMIT", &v)?;
        }
        if let Some(v) = lookup("APPGRID_MAX_LIMIT") {
            self.max_limit = num("APPGRID_MAX_LIMIT", &v)?;
        }
        if let Some(v) = lookup("APPGRID_SCAN_BATCH_SIZE") {
            self.scan_batch_size = num("APPGRID_SCAN_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("APPGRID_QUERY_TIMEOUT_MS") {
            self.query_timeout_ms = Some(num("APPGRID_QUERY_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("APPGRID_SLOW_QUERY_MS") {
            self.slow_query_ms = num("APPGRID_SLOW_QUERY_MS", &v)?;
        }
        if let Some(v) = lookup("APPGRID_CURSOR_SECRET") {
            self.cursor_secret = Some(v);
        }
        if let Some(v) = lookup("APPGRID_CURSOR_TTL_SECS") {
            self.cursor_ttl_secs = Some(num("APPGRID_CURSOR_TTL_SECS", &v)?);
        }
        if let Some(v) = lookup("APPGRID_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("APPGRID_SYNC_WRITES") {
            self.sync_writes = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(DbError::Config(format!("APPGRID_SYNC_WRITES: not a boolean: {other}")));
                }
            };
        }
        if let Some(v) = lookup("APPGRID_LOG_CONFIG") {
            self.log_config = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// # Errors
    /// `Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.default_limit == 0 {
            return Err(DbError::Config("default_limit must be positive".into()));
        }
        if self.max_limit == 0 {
            return Err(DbError::Config("max_limit must be positive".into()));
        }
        if self.default_limit > self.max_limit {
            return Err(DbError::Config(format!(
                "default_limit {} exceeds max_limit {}",
                self.default_limit, self.max_limit
            )));
        }
        if self.scan_batch_size == 0 {
            return Err(DbError::Config("scan_batch_size must be positive".into()));
        }
        if self.cursor_secret.as_deref().is_some_and(str::is_empty) {
            return Err(DbError::Config("cursor_secret must not be empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("entities.log"))
    }
}
