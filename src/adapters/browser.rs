// Headless Chromium page source. The marketplace renders its listing
// client-side, so this is the source the container image runs with.

use crate::adapters::session::SessionState;
use crate::core::parser::has_price_badge;
use crate::core::{LoadedPage, PageSource};
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const BADGE_POLL: Duration = Duration::from_millis(500);
const SCROLL_SETTLE: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub user_agent: Option<String>,
    pub request_timeout: Duration,
    pub badge_timeout: Duration,
    pub idle_timeout: Duration,
    pub auth_url_prefix: String,
    pub session: Option<SessionState>,
}

fn browser_err<E: std::fmt::Display>(e: E) -> MonitorError {
    MonitorError::BrowserError {
        message: e.to_string(),
    }
}

pub struct ChromePageSource {
    // 保持瀏覽器進程存活
    _browser: Browser,
    tab: Arc<Tab>,
    badge_timeout: Duration,
    auth_url_prefix: String,
    storage_script: Option<Arc<str>>,
}

/// Installs the session cookies on the browser, each scoped to its own
/// domain and path.
fn install_cookies(tab: &Tab, session: &SessionState) -> Result<usize> {
    let params = session
        .live_cookies()
        .map(|cookie| serde_json::from_value::<CookieParam>(cookie.to_browser_cookie()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let count = params.len();
    if count > 0 {
        tab.set_cookies(params).map_err(browser_err)?;
    }
    Ok(count)
}

impl ChromePageSource {
    pub fn launch(options: ChromeOptions) -> Result<Self> {
        tracing::info!("🧭 Launching headless Chromium");

        let launch = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Required in containers / CI
            .args(vec![OsStr::new("--disable-dev-shm-usage")])
            .idle_browser_timeout(options.idle_timeout)
            .build()
            .map_err(browser_err)?;

        let browser = Browser::new(launch).map_err(|e| MonitorError::BrowserError {
            message: format!(
                "Failed to launch Chrome: {}. Ensure Chrome/Chromium is installed.",
                e
            ),
        })?;
        let tab = browser.new_tab().map_err(browser_err)?;
        tab.set_default_timeout(options.request_timeout);

        if let Some(ua) = options.user_agent.as_deref() {
            tab.set_user_agent(ua, Some("fr-FR"), None)
                .map_err(browser_err)?;
        }

        let mut storage_script = None;
        if let Some(session) = &options.session {
            let installed = install_cookies(&tab, session)?;
            tracing::debug!("Installed {} session cookies in Chromium", installed);
            storage_script = session.local_storage_script().map(Arc::<str>::from);
        }

        tracing::info!("🧭 Chromium ready");
        Ok(Self {
            _browser: browser,
            tab,
            badge_timeout: options.badge_timeout,
            auth_url_prefix: options.auth_url_prefix,
            storage_script,
        })
    }
}

/// Navigates and waits until the price badge shows up, the page lands on the
/// login host, or the badge timeout runs out.
fn load_blocking(
    tab: &Tab,
    url: &str,
    badge_timeout: Duration,
    auth_url_prefix: &str,
    storage_script: Option<&str>,
) -> Result<LoadedPage> {
    tab.navigate_to(url).map_err(browser_err)?;
    tab.wait_until_navigated().map_err(browser_err)?;

    // localStorage 只能在同源頁面寫入；有寫入就重新載入讓前端讀到
    if let Some(script) = storage_script {
        let restored = tab.evaluate(script, false).map_err(browser_err)?;
        if restored.value == Some(Value::Bool(true)) {
            tracing::info!("💾 Restored localStorage for {}, reloading", tab.get_url());
            tab.navigate_to(url).map_err(browser_err)?;
            tab.wait_until_navigated().map_err(browser_err)?;
        }
    }

    let deadline = Instant::now() + badge_timeout;
    loop {
        let html = tab.get_content().map_err(browser_err)?;
        let final_url = tab.get_url();

        if final_url.starts_with(auth_url_prefix) {
            return Ok(LoadedPage { final_url, html });
        }
        if has_price_badge(&html) {
            // 捲動觸發延遲載入，失敗不影響結果
            if tab.evaluate("window.scrollTo(0, 600)", false).is_ok() {
                std::thread::sleep(SCROLL_SETTLE);
                if let Ok(scrolled) = tab.get_content() {
                    return Ok(LoadedPage {
                        final_url,
                        html: scrolled,
                    });
                }
            }
            return Ok(LoadedPage { final_url, html });
        }
        if Instant::now() >= deadline {
            tracing::debug!("Badge wait timed out after {:?}", badge_timeout);
            return Ok(LoadedPage { final_url, html });
        }
        std::thread::sleep(BADGE_POLL);
    }
}

#[async_trait]
impl PageSource for ChromePageSource {
    async fn load(&self, url: &str) -> Result<LoadedPage> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        let badge_timeout = self.badge_timeout;
        let auth_url_prefix = self.auth_url_prefix.clone();
        let storage_script = self.storage_script.clone();

        tokio::task::spawn_blocking(move || {
            load_blocking(
                &tab,
                &url,
                badge_timeout,
                &auth_url_prefix,
                storage_script.as_deref(),
            )
        })
        .await
        .map_err(browser_err)?
    }
}
