use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tiercache_core::TtlRange;
use tiercache_redis::RedisConfig;

use crate::error::{CacheError, CacheResult};
use crate::options::LockOptions;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tiercache.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub memory: MemoryTierConfig,
    #[serde(default)]
    pub remote: RemoteTierConfig,
    #[serde(default)]
    pub semaphore: SemaphoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        // TTL windows
        validate_window("memory", self.memory.ttl_min_ms, self.memory.ttl_max_ms)?;
        validate_window("remote", self.remote.ttl_min_ms, self.remote.ttl_max_ms)?;
        if self.memory.ttl_max_ms >= self.remote.ttl_min_ms {
            return Err("memory.ttl_max_ms must be < remote.ttl_min_ms".into());
        }
        if self.memory.cleanup_interval_ms == 0 {
            return Err("memory.cleanup_interval_ms must be > 0".into());
        }
        // Redis
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("redis.enabled=true requires redis.url".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
        }
        // Semaphore guard
        if self.semaphore.guard_retry_times == 0 {
            return Err("semaphore.guard_retry_times must be > 0".into());
        }
        if self.semaphore.guard_ttl_ms == 0 {
            return Err("semaphore.guard_ttl_ms must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

fn validate_window(section: &str, min_ms: u64, max_ms: u64) -> Result<(), String> {
    if max_ms == 0 {
        return Err(format!("{section}.ttl_max_ms must be > 0"));
    }
    if min_ms > max_ms {
        return Err(format!("{section}.ttl_min_ms must be <= {section}.ttl_max_ms"));
    }
    Ok(())
}

/// Memory tier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTierConfig {
    #[serde(default = "default_memory_ttl_min_ms")]
    pub ttl_min_ms: u64,
    #[serde(default = "default_memory_ttl_max_ms")]
    pub ttl_max_ms: u64,
    /// How often expired entries are swept.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

impl MemoryTierConfig {
    pub fn ttl_range(&self) -> CacheResult<TtlRange> {
        Ok(TtlRange::from_millis(self.ttl_min_ms, self.ttl_max_ms)?)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            ttl_min_ms: default_memory_ttl_min_ms(),
            ttl_max_ms: default_memory_ttl_max_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

fn default_memory_ttl_min_ms() -> u64 {
    2000
}
fn default_memory_ttl_max_ms() -> u64 {
    5000
}
fn default_cleanup_interval_ms() -> u64 {
    30_000
}

/// Default expiry window for remote writes without a caller TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTierConfig {
    #[serde(default = "default_remote_ttl_min_ms")]
    pub ttl_min_ms: u64,
    #[serde(default = "default_remote_ttl_max_ms")]
    pub ttl_max_ms: u64,
}

impl RemoteTierConfig {
    pub fn ttl_range(&self) -> CacheResult<TtlRange> {
        Ok(TtlRange::from_millis(self.ttl_min_ms, self.ttl_max_ms)?)
    }
}

impl Default for RemoteTierConfig {
    fn default() -> Self {
        Self {
            ttl_min_ms: default_remote_ttl_min_ms(),
            ttl_max_ms: default_remote_ttl_max_ms(),
        }
    }
}

fn default_remote_ttl_min_ms() -> u64 {
    30_000
}
fn default_remote_ttl_max_ms() -> u64 {
    60_000
}

/// Settings of the mutex guarding every semaphore operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemaphoreConfig {
    #[serde(default = "default_guard_retry_times")]
    pub guard_retry_times: u32,
    #[serde(default = "default_guard_retry_interval_ms")]
    pub guard_retry_interval_ms: u64,
    #[serde(default = "default_guard_ttl_ms")]
    pub guard_ttl_ms: u64,
}

impl SemaphoreConfig {
    pub fn guard_options(&self) -> LockOptions {
        LockOptions::default()
            .with_ttl(Duration::from_millis(self.guard_ttl_ms))
            .with_retry(
                self.guard_retry_times,
                Duration::from_millis(self.guard_retry_interval_ms),
            )
    }
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            guard_retry_times: default_guard_retry_times(),
            guard_retry_interval_ms: default_guard_retry_interval_ms(),
            guard_ttl_ms: default_guard_ttl_ms(),
        }
    }
}

fn default_guard_retry_times() -> u32 {
    100
}
fn default_guard_retry_interval_ms() -> u64 {
    100
}
fn default_guard_ttl_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

/// Loads configuration from an optional TOML file plus environment overrides.
///
/// Without `path`, `tiercache.toml` in the working directory is used if it
/// exists. Environment variables override file values, e.g.
/// `TIERCACHE__REDIS__URL=redis://cache:6379`.
pub fn load_config(path: Option<&str>) -> CacheResult<CacheConfig> {
    use config::{Config, Environment, File};

    let mut builder = Config::builder();
    let file = path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if file.exists() {
        builder = builder.add_source(File::from(file));
    } else if path.is_some() {
        tracing::warn!(path = %file.display(), "config file not found, using defaults");
    }
    builder = builder.add_source(
        Environment::with_prefix("TIERCACHE")
            .try_parsing(true)
            .separator("__"),
    );

    let cfg = builder
        .build()
        .map_err(|e| CacheError::configuration(format!("config build error: {e}")))?;
    let merged: CacheConfig = cfg
        .try_deserialize()
        .map_err(|e| CacheError::configuration(format!("config deserialize error: {e}")))?;
    merged.validate().map_err(CacheError::Configuration)?;
    Ok(merged)
}

pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> CacheResult<CacheConfig> {
    let p = path.as_ref().to_string_lossy().to_string();
    load_config(Some(&p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CacheConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.redis.enabled);
        assert_eq!(
            cfg.memory.ttl_range().unwrap(),
            TtlRange::new(Duration::from_secs(2), Duration::from_secs(5))
        );
        assert_eq!(
            cfg.remote.ttl_range().unwrap(),
            TtlRange::new(Duration::from_secs(30), Duration::from_secs(60))
        );

        let guard = cfg.semaphore.guard_options();
        assert_eq!(guard.ttl, Duration::from_millis(1000));
        assert_eq!(guard.retry.times, 100);
        assert_eq!(guard.retry.interval, Duration::from_millis(100));
    }

    #[test]
    fn test_validate_rejects_overlapping_tiers() {
        let mut cfg = CacheConfig::default();
        cfg.memory.ttl_max_ms = 40_000;
        assert!(cfg.validate().unwrap_err().contains("remote.ttl_min_ms"));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let mut cfg = CacheConfig::default();
        cfg.remote.ttl_min_ms = 90_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let mut cfg = CacheConfig::default();
        cfg.logging.level = "chatty".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_redis_only_when_enabled() {
        let mut cfg = CacheConfig::default();
        cfg.redis.pool_size = 0;
        assert!(cfg.validate().is_ok());

        cfg.redis.enabled = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: CacheConfig = toml::from_str(
            r#"
            [remote]
            ttl_min_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.remote.ttl_min_ms, 10_000);
        assert_eq!(cfg.remote.ttl_max_ms, 60_000);
        assert_eq!(cfg.memory.ttl_max_ms, 5000);
        assert_eq!(cfg.logging.level, "info");
    }
}
