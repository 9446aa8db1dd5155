pub mod cli;
pub mod lambda;
pub mod toml_config;

use crate::adapters::ifttt::DEFAULT_IFTTT_BASE_URL;
use crate::core::ConfigProvider;
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TARGET_URL: &str =
    "https://www.altered.gg/fr-fr/cards/market?order[price]=ASC&rarity[]=UNIQUE";
pub const DEFAULT_IFTTT_EVENT: &str = "altered_min_price";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";
pub const DEFAULT_STORAGE_STATE_PATH: &str = "/etc/secrets/storage_state.json";
pub const DEFAULT_AUTH_URL_PREFIX: &str = "https://auth.altered.gg";
pub const DEFAULT_POLL_SECONDS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 25_000;
pub const DEFAULT_WAIT_BADGE_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_GOTO_RETRIES: u32 = 3;
pub const DEFAULT_MAX_SCAN_ITEMS: usize = 300;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSourceKind {
    Http,
    Browser,
}

impl Default for PageSourceKind {
    fn default() -> Self {
        if cfg!(feature = "browser") {
            PageSourceKind::Browser
        } else {
            PageSourceKind::Http
        }
    }
}

impl FromStr for PageSourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(PageSourceKind::Http),
            "browser" | "chrome" | "chromium" => Ok(PageSourceKind::Browser),
            other => Err(format!("unknown page source '{}', expected http or browser", other)),
        }
    }
}

impl fmt::Display for PageSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSourceKind::Http => write!(f, "http"),
            PageSourceKind::Browser => write!(f, "browser"),
        }
    }
}

/// Fully resolved monitor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub target_url: String,
    pub ifttt_key: String,
    pub ifttt_event: String,
    pub ifttt_base_url: String,
    pub poll_seconds: u64,
    pub user_agent: String,
    pub storage_state_path: String,
    pub request_timeout_ms: u64,
    pub wait_badge_timeout_ms: u64,
    pub max_goto_retries: u32,
    pub max_scan_items: usize,
    pub auth_url_prefix: String,
    pub retry_delay_ms: u64,
    pub page_source: PageSourceKind,
    pub state_file: Option<String>,
    pub history_file: Option<String>,
    pub monitor: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            ifttt_key: String::new(),
            ifttt_event: DEFAULT_IFTTT_EVENT.to_string(),
            ifttt_base_url: DEFAULT_IFTTT_BASE_URL.to_string(),
            poll_seconds: DEFAULT_POLL_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            storage_state_path: DEFAULT_STORAGE_STATE_PATH.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            wait_badge_timeout_ms: DEFAULT_WAIT_BADGE_TIMEOUT_MS,
            max_goto_retries: DEFAULT_MAX_GOTO_RETRIES,
            max_scan_items: DEFAULT_MAX_SCAN_ITEMS,
            auth_url_prefix: DEFAULT_AUTH_URL_PREFIX.to_string(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            page_source: PageSourceKind::default(),
            state_file: None,
            history_file: None,
            monitor: false,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: fmt::Display,
{
    match env_string(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| MonitorError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

impl MonitorConfig {
    /// 從環境變數建立 (Lambda 與容器共用同一組變數名稱)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            target_url: env_string("TARGET_URL").unwrap_or(defaults.target_url),
            ifttt_key: env_string("IFTTT_KEY").unwrap_or(defaults.ifttt_key),
            ifttt_event: env_string("IFTTT_EVENT").unwrap_or(defaults.ifttt_event),
            ifttt_base_url: env_string("IFTTT_BASE_URL").unwrap_or(defaults.ifttt_base_url),
            poll_seconds: env_parse("POLL_SECONDS", defaults.poll_seconds)?,
            user_agent: std::env::var("USER_AGENT").unwrap_or(defaults.user_agent),
            storage_state_path: env_string("STORAGE_STATE_PATH")
                .unwrap_or(defaults.storage_state_path),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
            wait_badge_timeout_ms: env_parse(
                "WAIT_BADGE_TIMEOUT_MS",
                defaults.wait_badge_timeout_ms,
            )?,
            max_goto_retries: env_parse("MAX_GOTO_RETRIES", defaults.max_goto_retries)?,
            max_scan_items: env_parse("MAX_SCAN_ITEMS", defaults.max_scan_items)?,
            auth_url_prefix: env_string("AUTH_URL_PREFIX").unwrap_or(defaults.auth_url_prefix),
            retry_delay_ms: env_parse("RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            page_source: env_parse("PAGE_SOURCE", defaults.page_source)?,
            state_file: env_string("STATE_FILE"),
            history_file: env_string("HISTORY_FILE"),
            monitor: env_parse("MONITOR", false)?,
        })
    }

    /// User agent to send, `None` when the configured one is unusable.
    pub fn effective_user_agent(&self) -> Option<String> {
        validation::sanitize_user_agent(&self.user_agent)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn badge_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_badge_timeout_ms)
    }
}

impl ConfigProvider for MonitorConfig {
    fn target_url(&self) -> &str {
        &self.target_url
    }

    fn auth_url_prefix(&self) -> &str {
        &self.auth_url_prefix
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_seconds)
    }

    fn max_goto_retries(&self) -> u32 {
        self.max_goto_retries
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn max_scan_items(&self) -> usize {
        self.max_scan_items
    }

    fn state_path(&self) -> Option<&str> {
        self.state_file.as_deref()
    }

    fn history_path(&self) -> Option<&str> {
        self.history_file.as_deref()
    }
}

impl Validate for MonitorConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("target_url", &self.target_url)?;
        validation::validate_url("ifttt_base_url", &self.ifttt_base_url)?;
        validation::validate_url("auth_url_prefix", &self.auth_url_prefix)?;
        validation::validate_non_empty_string("ifttt_event", &self.ifttt_event)?;

        validation::validate_range("poll_seconds", self.poll_seconds, 1, 86_400)?;
        validation::validate_positive_number("max_goto_retries", self.max_goto_retries as u64, 1)?;
        validation::validate_positive_number("max_scan_items", self.max_scan_items as u64, 1)?;
        validation::validate_range("request_timeout_ms", self.request_timeout_ms, 100, 600_000)?;
        validation::validate_range("wait_badge_timeout_ms", self.wait_badge_timeout_ms, 0, 600_000)?;

        validation::validate_path("storage_state_path", &self.storage_state_path)?;
        if let Some(path) = &self.state_file {
            validation::validate_path("state_file", path)?;
        }
        if let Some(path) = &self.history_file {
            validation::validate_path("history_file", path)?;
        }

        if self.ifttt_key.is_empty() {
            tracing::warn!("⚠️ IFTTT_KEY is empty, alerts will only be logged");
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
pub use self::cli::CliConfig;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.max_goto_retries(), 3);
        assert_eq!(config.max_scan_items(), 300);
        assert!(config.effective_user_agent().is_some());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = MonitorConfig {
            max_goto_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MonitorConfig {
            target_url: "altered.gg/market".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MonitorConfig {
            poll_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_ascii_user_agent_is_dropped() {
        let config = MonitorConfig {
            user_agent: "Agent ✓".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_user_agent(), None);
    }

    #[test]
    fn test_page_source_parsing() {
        assert_eq!("HTTP".parse::<PageSourceKind>(), Ok(PageSourceKind::Http));
        assert_eq!(
            "chromium".parse::<PageSourceKind>(),
            Ok(PageSourceKind::Browser)
        );
        assert!("curl".parse::<PageSourceKind>().is_err());
    }
}
