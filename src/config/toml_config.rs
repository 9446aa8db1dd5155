use crate::config::{MonitorConfig, PageSourceKind};
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub auth_url_prefix: Option<String>,
    pub user_agent: Option<String>,
    pub storage_state_path: Option<String>,
    pub page_source: Option<PageSourceKind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollingConfig {
    pub poll_seconds: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub wait_badge_timeout_ms: Option<u64>,
    pub max_goto_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub max_scan_items: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub ifttt_key: Option<String>,
    pub ifttt_event: Option<String>,
    pub ifttt_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub state_file: Option<String>,
    pub history_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MonitorError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| MonitorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${IFTTT_KEY})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// Settings from the file on top of the defaults.
    pub fn to_monitor_config(&self) -> MonitorConfig {
        let d = MonitorConfig::default();
        MonitorConfig {
            target_url: self.target.url.clone().unwrap_or(d.target_url),
            // 未替換的 ${IFTTT_KEY} 視為未設定
            ifttt_key: self
                .notify
                .ifttt_key
                .clone()
                .filter(|k| !ENV_VAR_RE.is_match(k))
                .unwrap_or(d.ifttt_key),
            ifttt_event: self.notify.ifttt_event.clone().unwrap_or(d.ifttt_event),
            ifttt_base_url: self.notify.ifttt_base_url.clone().unwrap_or(d.ifttt_base_url),
            poll_seconds: self.polling.poll_seconds.unwrap_or(d.poll_seconds),
            user_agent: self.target.user_agent.clone().unwrap_or(d.user_agent),
            storage_state_path: self
                .target
                .storage_state_path
                .clone()
                .unwrap_or(d.storage_state_path),
            request_timeout_ms: self
                .polling
                .request_timeout_ms
                .unwrap_or(d.request_timeout_ms),
            wait_badge_timeout_ms: self
                .polling
                .wait_badge_timeout_ms
                .unwrap_or(d.wait_badge_timeout_ms),
            max_goto_retries: self.polling.max_goto_retries.unwrap_or(d.max_goto_retries),
            max_scan_items: self.polling.max_scan_items.unwrap_or(d.max_scan_items),
            auth_url_prefix: self
                .target
                .auth_url_prefix
                .clone()
                .unwrap_or(d.auth_url_prefix),
            retry_delay_ms: self.polling.retry_delay_ms.unwrap_or(d.retry_delay_ms),
            page_source: self.target.page_source.unwrap_or(d.page_source),
            state_file: self.output.state_file.clone(),
            history_file: self.output.history_file.clone(),
            monitor: self.monitoring_enabled(),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.to_monitor_config().validate()
    }
}
