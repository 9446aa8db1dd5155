// Wiring shared by the entrypoints: picks and builds the page source.

use crate::adapters::http::HttpPageSource;
use crate::adapters::session::SessionState;
use crate::config::{MonitorConfig, PageSourceKind};
use crate::core::PageSource;
use crate::utils::error::Result;

pub fn build_page_source(
    config: &MonitorConfig,
    session: Option<&SessionState>,
) -> Result<Box<dyn PageSource>> {
    let user_agent = config.effective_user_agent();

    match config.page_source {
        PageSourceKind::Http => {
            tracing::info!("🌐 Using HTTP page source");
            let source =
                HttpPageSource::new(user_agent.as_deref(), config.request_timeout(), session)?;
            Ok(Box::new(source))
        }
        #[cfg(feature = "browser")]
        PageSourceKind::Browser => {
            use crate::adapters::browser::{ChromeOptions, ChromePageSource};
            use std::time::Duration;

            // 閒置逾時要比輪詢間隔長，否則瀏覽器會在兩輪之間被關掉
            let idle_timeout = Duration::from_secs(config.poll_seconds.max(60) * 3);
            let options = ChromeOptions {
                user_agent,
                request_timeout: config.request_timeout(),
                badge_timeout: config.badge_timeout(),
                idle_timeout,
                auth_url_prefix: config.auth_url_prefix.clone(),
                session: session.cloned(),
            };
            Ok(Box::new(ChromePageSource::launch(options)?))
        }
        #[cfg(not(feature = "browser"))]
        PageSourceKind::Browser => Err(crate::utils::error::MonitorError::ConfigError {
            message: "page_source=browser requires building with the `browser` feature"
                .to_string(),
        }),
    }
}
