use crate::core::Storage;
use crate::utils::error::{MonitorError, Result};
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use crate::config::{toml_config::TomlConfig, MonitorConfig, PageSourceKind};
#[cfg(feature = "cli")]
use clap::Args;

/// Filesystem storage rooted at `base_path`; absolute paths are used as-is.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        match tokio::fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MonitorError::StateNotFound {
                path: full_path.display().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 先寫暫存檔再改名，避免中途中斷留下半份狀態
        let tmp_path = full_path.with_extension("tmp");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &full_path).await?;
        Ok(())
    }
}

// Command line / environment settings shared by the binaries. Every option is
// optional so values from a TOML file can fill the gaps; anything still unset
// falls back to MonitorConfig::default().
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Args)]
pub struct CliConfig {
    /// Optional TOML configuration file
    #[arg(short, long, env = "MONITOR_CONFIG")]
    pub config: Option<String>,

    #[arg(long, env = "TARGET_URL")]
    pub target_url: Option<String>,

    #[arg(long, env = "IFTTT_KEY", hide_env_values = true)]
    pub ifttt_key: Option<String>,

    #[arg(long, env = "IFTTT_EVENT")]
    pub ifttt_event: Option<String>,

    #[arg(long, env = "IFTTT_BASE_URL")]
    pub ifttt_base_url: Option<String>,

    #[arg(long, env = "POLL_SECONDS")]
    pub poll_seconds: Option<u64>,

    #[arg(long, env = "USER_AGENT")]
    pub user_agent: Option<String>,

    #[arg(long, env = "STORAGE_STATE_PATH")]
    pub storage_state_path: Option<String>,

    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    #[arg(long, env = "WAIT_BADGE_TIMEOUT_MS")]
    pub wait_badge_timeout_ms: Option<u64>,

    #[arg(long, env = "MAX_GOTO_RETRIES")]
    pub max_goto_retries: Option<u32>,

    #[arg(long, env = "MAX_SCAN_ITEMS")]
    pub max_scan_items: Option<usize>,

    #[arg(long, env = "AUTH_URL_PREFIX")]
    pub auth_url_prefix: Option<String>,

    #[arg(long, env = "RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    /// http or browser
    #[arg(long, env = "PAGE_SOURCE")]
    pub page_source: Option<PageSourceKind>,

    /// Persist the best-seen price here (JSON)
    #[arg(long, env = "STATE_FILE")]
    pub state_file: Option<String>,

    /// Append every observation to this CSV file
    #[arg(long, env = "HISTORY_FILE")]
    pub history_file: Option<String>,

    /// Run a single check and exit
    #[arg(long)]
    pub once: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU/memory after each check")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 合併優先順序: 命令列/環境變數 > TOML > 預設值
    pub fn resolve(&self, file: Option<&TomlConfig>) -> MonitorConfig {
        let mut config = match file {
            Some(file) => file.to_monitor_config(),
            None => MonitorConfig::default(),
        };

        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = &self.$field {
                        config.$field = value.clone();
                    }
                )*
            };
        }
        overlay!(
            target_url,
            ifttt_key,
            ifttt_event,
            ifttt_base_url,
            poll_seconds,
            user_agent,
            storage_state_path,
            request_timeout_ms,
            wait_badge_timeout_ms,
            max_goto_retries,
            max_scan_items,
            auth_url_prefix,
            retry_delay_ms,
            page_source,
        );

        if self.state_file.is_some() {
            config.state_file = self.state_file.clone();
        }
        if self.history_file.is_some() {
            config.history_file = self.history_file.clone();
        }
        config.monitor |= self.monitor;
        config
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::core::ConfigProvider;
    use clap::Parser;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: CliConfig,
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml = TomlConfig::from_toml_str(
            r#"
[target]
url = "https://market.example.com/list"

[polling]
poll_seconds = 120
max_scan_items = 50
"#,
        )
        .unwrap();

        let cli = CliConfig {
            poll_seconds: Some(30),
            ..Default::default()
        };
        let config = cli.resolve(Some(&toml));

        assert_eq!(config.target_url, "https://market.example.com/list");
        assert_eq!(config.poll_seconds, 30);
        assert_eq!(config.max_scan_items(), 50);
        assert_eq!(config.max_goto_retries, 3);
    }

    #[test]
    fn test_parse_flags() {
        let cli = TestCli::parse_from([
            "price-monitor",
            "--once",
            "--page-source",
            "http",
            "--state-file",
            "/tmp/state.json",
        ])
        .config;
        assert!(cli.once);
        let config = cli.resolve(None);
        assert_eq!(config.page_source, PageSourceKind::Http);
        assert_eq!(config.state_path(), Some("/tmp/state.json"));
    }

    #[tokio::test]
    async fn test_local_storage_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        let err = storage.read_file("nope.json").await.unwrap_err();
        assert!(matches!(err, MonitorError::StateNotFound { .. }));

        storage.write_file("nested/state.json", b"{}").await.unwrap();
        assert_eq!(storage.read_file("nested/state.json").await.unwrap(), b"{}");
    }
}
