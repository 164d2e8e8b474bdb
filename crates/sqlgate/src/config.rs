//! `sqlgate.toml` configuration.
//!
//! ```toml
//! schema_source = "snapshot"          # or "database" (default)
//! snapshot_path = "schema/snapshot.json"
//!
//! [database]
//! url = "${DATABASE_URL}"
//! schemas = ["public"]
//!
//! [statement_cache]
//! capacity = 512
//! ttl_secs = 600
//! sweep_interval_secs = 60
//! ```
//!
//! Relative paths are resolved against the directory of the config file.
//! `SQLGATE_SCHEMA_SOURCE`, `SQLGATE_SNAPSHOT_PATH` and `SQLGATE_DATABASE_URL`
//! override the file.

use crate::cache::StatementCacheConfig;
use crate::error::ConfigError;
use crate::source::SchemaSourceKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SCHEMA_SOURCE: &str = "SQLGATE_SCHEMA_SOURCE";
pub const ENV_SNAPSHOT_PATH: &str = "SQLGATE_SNAPSHOT_PATH";
pub const ENV_DATABASE_URL: &str = "SQLGATE_DATABASE_URL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlgateConfig {
    pub schema_source: SchemaSourceKind,
    pub snapshot_path: Option<PathBuf>,
    pub database: DatabaseConfig,
    pub statement_cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    /// Schemas to introspect.
    pub schemas: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            schemas: vec!["public".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl_secs: Option<u64>,
    /// Run a background sweep of expired statements at this interval.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_secs: None,
            sweep_interval_secs: None,
        }
    }
}

impl SqlgateConfig {
    /// Load, resolve, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut config = Self::parse(&raw, config_dir, |key| std::env::var(key).ok())
            .map_err(|e| match e {
                ConfigError::Parse { message, .. } => ConfigError::Parse {
                    path: path.display().to_string(),
                    message,
                },
                other => other,
            })?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text. `${VAR}` references are expanded through `lookup`
    /// and relative paths are resolved against `base_dir`. Does not apply
    /// overrides or validate.
    pub fn parse(
        raw: &str,
        base_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: SqlgateConfig = toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;

        if let Some(url) = config.database.url.as_mut() {
            *url = expand_env_vars(url, &lookup)?;
        }
        if let Some(p) = config.snapshot_path.take() {
            let expanded = expand_env_vars(&p.to_string_lossy(), &lookup)?;
            config.snapshot_path = Some(resolve_path(base_dir, expanded));
        }
        Ok(config)
    }

    /// Apply `SQLGATE_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `SQLGATE_*` overrides from `lookup`.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(source) = lookup(ENV_SCHEMA_SOURCE) {
            self.schema_source = source
                .parse()
                .map_err(|e: String| ConfigError::Invalid(format!("{ENV_SCHEMA_SOURCE}: {e}")))?;
        }
        if let Some(path) = lookup(ENV_SNAPSHOT_PATH).filter(|p| !p.trim().is_empty()) {
            self.snapshot_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|u| !u.trim().is_empty()) {
            self.database.url = Some(url);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_source == SchemaSourceKind::Snapshot && self.snapshot_path.is_none() {
            return Err(ConfigError::Invalid(
                "schema_source = \"snapshot\" requires snapshot_path".into(),
            ));
        }
        if self.database.schemas.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "database.schemas must not contain empty names".into(),
            ));
        }

        let cache = &self.statement_cache;
        if cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "statement_cache.capacity must be positive".into(),
            ));
        }
        if cache.ttl_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "statement_cache.ttl_secs must be positive".into(),
            ));
        }
        match (cache.sweep_interval_secs, cache.ttl_secs) {
            (Some(0), _) => Err(ConfigError::Invalid(
                "statement_cache.sweep_interval_secs must be positive".into(),
            )),
            (Some(_), None) => Err(ConfigError::Invalid(
                "statement_cache.sweep_interval_secs requires ttl_secs".into(),
            )),
            _ => Ok(()),
        }
    }

    pub fn cache_config(&self) -> StatementCacheConfig {
        StatementCacheConfig {
            capacity: self.statement_cache.capacity,
            ttl: self.statement_cache.ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.statement_cache
            .sweep_interval_secs
            .map(Duration::from_secs)
    }
}

fn resolve_path(base_dir: &Path, p: impl AsRef<Path>) -> PathBuf {
    let p = p.as_ref();
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn expand_env_vars(
    input: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(ConfigError::Invalid(format!(
                    "unterminated env var reference: ${{{key}}}"
                )));
            }
            if key.is_empty() {
                return Err(ConfigError::Invalid(
                    "invalid env var reference: ${}".into(),
                ));
            }

            let v = lookup(&key).ok_or_else(|| {
                ConfigError::Invalid(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
