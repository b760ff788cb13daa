//! Configuration loading.
//!
//! Settings come from a TOML file (default `~/.folio/config.toml`, override
//! with `FOLIO_CONFIG`), then individual environment variables. A missing
//! file yields the defaults.

use crate::market::{FetchPolicy, DEFAULT_UNIVERSE};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// Path of the JSON holdings store
    pub store_path: PathBuf,
    /// Append-only audit log of ledger mutations (disabled when unset)
    pub audit_log: Option<PathBuf>,
    pub market: MarketConfig,
    pub fetch: FetchConfig,
    pub ranking: RankingConfig,
    pub risk: RiskConfig,
    pub ledger: LedgerConfig,
}

/// Market data gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
}

/// Fan-out limits for per-ticker fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub concurrency: usize,
    pub per_call_timeout_ms: u64,
    pub deadline_ms: u64,
}

/// Recommendation ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Entries returned before adding one per pinned ticker
    pub base_size: usize,
    /// Reference universe of tickers always considered
    pub universe: Vec<String>,
}

/// Risk summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// First day of the closing-price history
    pub history_start: NaiveDate,
}

/// Holdings ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Compare-and-swap attempts before reporting contention
    pub max_commit_attempts: u32,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            store_path: default_dir().join("holdings.json"),
            audit_log: None,
            market: MarketConfig::default(),
            fetch: FetchConfig::default(),
            ranking: RankingConfig::default(),
            risk: RiskConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://finnhub.io/api/v1".to_string(),
            api_key: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            per_call_timeout_ms: 5_000,
            deadline_ms: 30_000,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            base_size: 30,
            universe: DEFAULT_UNIVERSE.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            history_start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 5,
        }
    }
}

impl FetchConfig {
    /// Convert to the runtime fetch policy.
    pub fn policy(&self) -> FetchPolicy {
        FetchPolicy {
            concurrency: self.concurrency.max(1),
            per_call_timeout: Duration::from_millis(self.per_call_timeout_ms),
            deadline: Duration::from_millis(self.deadline_ms),
        }
    }
}

impl FolioConfig {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::default_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Default path: `~/.folio/config.toml`
    /// Can be overridden with `FOLIO_CONFIG` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("FOLIO_CONFIG") {
            return PathBuf::from(path);
        }
        default_dir().join("config.toml")
    }

    /// Load from a specific path. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FOLIO_STORE_FILE`, `FOLIO_AUDIT_LOG`, `FINNHUB_API_KEY` and
    /// `FOLIO_MARKET_URL` on top of file settings.
    pub fn apply_env(&mut self) {
        if let Ok(path) = env::var("FOLIO_STORE_FILE") {
            self.store_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("FOLIO_AUDIT_LOG") {
            self.audit_log = Some(PathBuf::from(path));
        }
        if let Ok(key) = env::var("FINNHUB_API_KEY") {
            self.market.api_key = Some(key);
        }
        if let Ok(url) = env::var("FOLIO_MARKET_URL") {
            self.market.base_url = url;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.ledger.max_commit_attempts == 0 {
            return Err(Error::Config(
                "ledger.max_commit_attempts must be at least 1".to_string(),
            ));
        }
        if self.fetch.per_call_timeout_ms == 0 || self.fetch.deadline_ms == 0 {
            return Err(Error::Config("fetch timeouts must be positive".to_string()));
        }
        Ok(())
    }
}

fn default_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".folio"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = FolioConfig::default();
        assert_eq!(config.ranking.base_size, 30);
        assert!(!config.ranking.universe.is_empty());
        assert_eq!(config.ledger.max_commit_attempts, 5);
        assert!(config.audit_log.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FolioConfig::from_toml(
            r#"
            store_path = "/tmp/holdings.json"

            [ranking]
            base_size = 10
            universe = ["AAPL", "MSFT"]

            [fetch]
            concurrency = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("/tmp/holdings.json"));
        assert_eq!(config.ranking.base_size, 10);
        assert_eq!(config.ranking.universe, vec!["AAPL", "MSFT"]);
        assert_eq!(config.fetch.concurrency, 2);
        assert_eq!(config.fetch.per_call_timeout_ms, 5_000);
        assert_eq!(config.market.base_url, "https://finnhub.io/api/v1");
    }

    #[test]
    fn test_history_start_parses() {
        let config = FolioConfig::from_toml("[risk]\nhistory_start = \"2023-06-01\"\n").unwrap();
        assert_eq!(
            config.risk.history_start,
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = FolioConfig::from_toml("[ledger]\nmax_commit_attempts = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));

        let result = FolioConfig::from_toml("store_path = [1, 2]\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = FolioConfig::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ranking.base_size, 30);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "audit_log = \"/var/log/folio.jsonl\"\n").unwrap();

        let config = FolioConfig::load_from_path(&path).unwrap();
        assert_eq!(config.audit_log, Some(PathBuf::from("/var/log/folio.jsonl")));
    }

    #[test]
    fn test_policy_clamps_concurrency() {
        let fetch = FetchConfig {
            concurrency: 0,
            per_call_timeout_ms: 100,
            deadline_ms: 1_000,
        };
        let policy = fetch.policy();
        assert_eq!(policy.concurrency, 1);
        assert_eq!(policy.per_call_timeout, Duration::from_millis(100));
    }
}
