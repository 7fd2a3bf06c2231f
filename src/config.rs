use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ai::{DEFAULT_GEMINI_API_URL, DEFAULT_GEMINI_MODEL};
use crate::error::{AppError, Result};
use crate::pipeline::FanOutLimits;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_minutes: u32,

    #[serde(default = "default_summarize_interval")]
    pub summarize_interval_secs: u32,

    /// Summarization requests allowed per minute.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    #[serde(default = "default_concurrency")]
    pub feed_concurrency: usize,

    #[serde(default = "default_concurrency")]
    pub article_concurrency: usize,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,

    /// 0 retries failed summaries forever.
    #[serde(default = "default_max_summary_attempts")]
    pub max_summary_attempts: u32,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("airss");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("airss.db").to_string_lossy().to_string()
}

fn default_gemini_api_url() -> String {
    DEFAULT_GEMINI_API_URL.to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_fetch_interval() -> u32 {
    5
}

fn default_summarize_interval() -> u32 {
    60
}

fn default_rate_limit() -> u32 {
    15
}

fn default_concurrency() -> usize {
    5
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_extraction_timeout() -> u64 {
    20
}

fn default_max_summary_attempts() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            gemini_api_key: None,
            gemini_api_url: default_gemini_api_url(),
            gemini_model: default_gemini_model(),
            fetch_interval_minutes: default_fetch_interval(),
            summarize_interval_secs: default_summarize_interval(),
            rate_limit_per_minute: default_rate_limit(),
            feed_concurrency: default_concurrency(),
            article_concurrency: default_concurrency(),
            fetch_timeout_secs: default_fetch_timeout(),
            extraction_timeout_secs: default_extraction_timeout(),
            max_summary_attempts: default_max_summary_attempts(),
        }
    }
}

impl Config {
    /// Load the config file (writing defaults if it does not exist yet), apply
    /// environment overrides and validate the result.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("AIRSS_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("airss")
            .join("config.toml")
    }

    /// Override fields from environment-style variables looked up by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("AIRSS_DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = lookup("GEMINI_API_URL") {
            self.gemini_api_url = v;
        }
        if let Some(v) = lookup("GEMINI_MODEL") {
            self.gemini_model = v;
        }

        override_parsed(&lookup, "AIRSS_FETCH_INTERVAL_MINUTES", &mut self.fetch_interval_minutes)?;
        override_parsed(&lookup, "AIRSS_SUMMARIZE_INTERVAL_SECS", &mut self.summarize_interval_secs)?;
        override_parsed(&lookup, "AIRSS_RATE_LIMIT", &mut self.rate_limit_per_minute)?;
        override_parsed(&lookup, "AIRSS_FEED_CONCURRENCY", &mut self.feed_concurrency)?;
        override_parsed(&lookup, "AIRSS_ARTICLE_CONCURRENCY", &mut self.article_concurrency)?;
        override_parsed(&lookup, "AIRSS_FETCH_TIMEOUT_SECS", &mut self.fetch_timeout_secs)?;
        override_parsed(&lookup, "AIRSS_EXTRACTION_TIMEOUT_SECS", &mut self.extraction_timeout_secs)?;
        override_parsed(&lookup, "AIRSS_MAX_SUMMARY_ATTEMPTS", &mut self.max_summary_attempts)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(AppError::Config("db_path must not be empty".into()));
        }

        let positive = [
            ("fetch_interval_minutes", u64::from(self.fetch_interval_minutes)),
            ("summarize_interval_secs", u64::from(self.summarize_interval_secs)),
            ("rate_limit_per_minute", u64::from(self.rate_limit_per_minute)),
            ("feed_concurrency", self.feed_concurrency as u64),
            ("article_concurrency", self.article_concurrency as u64),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("extraction_timeout_secs", self.extraction_timeout_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(AppError::Config(format!("{name} must be greater than zero")));
        }

        Ok(())
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.fetch_interval_minutes) * 60)
    }

    pub fn summarize_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.summarize_interval_secs))
    }

    pub fn fan_out_limits(&self) -> FanOutLimits {
        FanOutLimits {
            feed_concurrency: self.feed_concurrency,
            article_concurrency: self.article_concurrency,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            extraction_timeout: Duration::from_secs(self.extraction_timeout_secs),
        }
    }
}

fn override_parsed<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("invalid {key}={raw}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit_per_minute, 15);
        assert_eq!(config.fetch_interval(), Duration::from_secs(300));
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn env_overrides_fields() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("GEMINI_API_KEY", "key"),
                ("AIRSS_RATE_LIMIT", "30"),
                ("AIRSS_FEED_CONCURRENCY", "2"),
                ("AIRSS_DB_PATH", "/tmp/x.db"),
                ("AIRSS_FETCH_INTERVAL_MINUTES", " "),
            ]))
            .unwrap();

        assert_eq!(config.gemini_api_key.as_deref(), Some("key"));
        assert_eq!(config.rate_limit_per_minute, 30);
        assert_eq!(config.feed_concurrency, 2);
        assert_eq!(config.db_path, "/tmp/x.db");
        assert_eq!(config.fetch_interval_minutes, 5);
    }

    #[test]
    fn bad_env_values_are_config_errors() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("AIRSS_RATE_LIMIT", "fast")])).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("AIRSS_RATE_LIMIT")));
    }

    #[test]
    fn zero_values_fail_validation() {
        let config = Config {
            rate_limit_per_minute: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let config = Config {
            article_concurrency: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_round_trip_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            gemini_api_key: Some("abc".into()),
            feed_concurrency: 3,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.gemini_api_key.as_deref(), Some("abc"));
        assert_eq!(loaded.feed_concurrency, 3);

        std::fs::write(&path, "db_path = \"/data/airss.db\"\n").unwrap();
        let partial = Config::from_file(&path).unwrap();
        assert_eq!(partial.db_path, "/data/airss.db");
        assert_eq!(partial.summarize_interval_secs, 60);
        assert_eq!(partial.max_summary_attempts, 5);
    }
}
