//! Runtime configuration for the cache and the scheduler.
//!
//! Configuration is a small TOML document where every key is optional:
//!
//! ```toml
//! database_url = "/var/lib/org_assets/assets.db"
//! cache_ttl_ms = 5000
//! flow_load_timeout_secs = 30
//! fire_batch_size = 500
//! ```
//!
//! Loading goes file -> environment overrides -> validation. Overrides come
//! from `ORG_ASSETS_DATABASE_URL`, `ORG_ASSETS_CACHE_TTL_MS`,
//! `ORG_ASSETS_FLOW_TIMEOUT_SECS` and `ORG_ASSETS_FIRE_BATCH_SIZE`. An unset
//! variable keeps the file value; a set but malformed one is an error.

use std::time::Duration as StdDuration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_opt, parse_env_opt};
use toml::from_str;

/// Environment override for [`AssetsConfig::database_url`].
pub const ENV_DATABASE_URL: &str = "ORG_ASSETS_DATABASE_URL";
/// Environment override for [`AssetsConfig::cache_ttl_ms`].
pub const ENV_CACHE_TTL_MS: &str = "ORG_ASSETS_CACHE_TTL_MS";
/// Environment override for [`AssetsConfig::flow_load_timeout_secs`].
pub const ENV_FLOW_TIMEOUT_SECS: &str = "ORG_ASSETS_FLOW_TIMEOUT_SECS";
/// Environment override for [`AssetsConfig::fire_batch_size`].
pub const ENV_FIRE_BATCH_SIZE: &str = "ORG_ASSETS_FIRE_BATCH_SIZE";

/// Cache and scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AssetsConfig {
    /// SQLite database holding flows, contacts and event fires.
    pub database_url: String,
    /// How long a snapshot is served before it is rebuilt.
    pub cache_ttl_ms: u64,
    /// Upper bound on a single flow lookup.
    pub flow_load_timeout_secs: u64,
    /// Contacts per reconciliation transaction.
    pub fire_batch_size: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            database_url: "org_assets.db".into(),
            cache_ttl_ms: 5_000,
            flow_load_timeout_secs: 30,
            fire_batch_size: 500,
        }
    }
}

impl AssetsConfig {
    /// Snapshot lifetime.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.cache_ttl_ms).unwrap_or(i64::MAX))
    }

    /// Flow lookup bound.
    pub fn flow_load_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.flow_load_timeout_secs)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Some(url) = get_env_opt(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(ttl) = parse_env_opt(ENV_CACHE_TTL_MS)? {
            self.cache_ttl_ms = ttl;
        }
        if let Some(secs) = parse_env_opt(ENV_FLOW_TIMEOUT_SECS)? {
            self.flow_load_timeout_secs = secs;
        }
        if let Some(size) = parse_env_opt(ENV_FIRE_BATCH_SIZE)? {
            self.fire_batch_size = size;
        }
        Ok(())
    }

    /// Reject values the cache or scheduler cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            bail!("database_url cannot be empty");
        }
        if self.cache_ttl_ms == 0 {
            bail!("cache_ttl_ms must be greater than zero");
        }
        if self.cache_ttl_ms > i64::MAX as u64 {
            bail!("cache_ttl_ms is out of range: {}", self.cache_ttl_ms);
        }
        if self.flow_load_timeout_secs == 0 {
            bail!("flow_load_timeout_secs must be greater than zero");
        }
        if self.fire_batch_size == 0 {
            bail!("fire_batch_size must be greater than zero");
        }
        Ok(())
    }
}

/// Parse a config TOML string, apply environment overrides, and validate.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<AssetsConfig> {
    let mut cfg: AssetsConfig = from_str(toml_str).context("failed to parse config TOML")?;
    cfg.apply_env().context("apply environment overrides")?;
    cfg.validate().context("invalid config")?;
    Ok(cfg)
}

/// Read a config TOML file from disk and load it.
///
/// See [`load_config_str`].
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<AssetsConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg: AssetsConfig = from_str("").unwrap();
        assert_eq!(cfg, AssetsConfig::default());
        assert_eq!(cfg.cache_ttl(), chrono::Duration::seconds(5));
        assert_eq!(cfg.flow_load_timeout(), StdDuration::from_secs(30));
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let cfg: AssetsConfig =
            from_str("cache_ttl_ms = 250\ndatabase_url = \"/tmp/a.db\"").unwrap();
        assert_eq!(cfg.cache_ttl_ms, 250);
        assert_eq!(cfg.database_url, "/tmp/a.db");
        assert_eq!(cfg.fire_batch_size, 500);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(from_str::<AssetsConfig>("cache_ttl = 5").is_err());
    }

    #[test]
    fn zero_values_fail_validation() {
        for toml in [
            "cache_ttl_ms = 0",
            "flow_load_timeout_secs = 0",
            "fire_batch_size = 0",
            "database_url = \"  \"",
        ] {
            let cfg: AssetsConfig = from_str(toml).unwrap();
            assert!(cfg.validate().is_err(), "{toml} should be invalid");
        }
    }

    #[test]
    fn environment_overrides_file_values() {
        // SAFETY: these variables are only read by this test.
        unsafe {
            std::env::set_var(ENV_FIRE_BATCH_SIZE, "50");
            std::env::set_var(ENV_FLOW_TIMEOUT_SECS, "soon");
        }
        let mut cfg = AssetsConfig::default();
        assert!(cfg.apply_env().is_err());

        unsafe { std::env::remove_var(ENV_FLOW_TIMEOUT_SECS) };
        cfg.apply_env().unwrap();
        assert_eq!(cfg.fire_batch_size, 50);
        assert_eq!(cfg.flow_load_timeout_secs, 30);

        unsafe { std::env::remove_var(ENV_FIRE_BATCH_SIZE) };
    }
}
