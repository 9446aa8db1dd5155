use crate::core::history::HistoryLog;
use crate::core::parser::{extract_candidates, has_price_badge};
use crate::core::scanner::find_first_non_foiler;
use crate::core::tracker::PriceTracker;
use crate::core::{
    CheckOutcome, ConfigProvider, Listing, LoadedPage, Notifier, NotifyOutcome, Observation,
    PageSource, Storage,
};
use crate::utils::error::{MonitorError, Result};
use crate::utils::monitor::ResourceMonitor;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;

/// Minimum back-off after the session was found expired.
pub const AUTH_BACKOFF: Duration = Duration::from_secs(60);

enum Navigation {
    Ready(LoadedPage),
    AuthRequired(String),
    Failed(u32),
}

pub struct MonitorEngine<P: PageSource, N: Notifier, S: Storage, C: ConfigProvider> {
    source: P,
    notifier: N,
    storage: S,
    config: C,
    tracker: PriceTracker,
    state_loaded: bool,
    history: Option<HistoryLog>,
    resources: ResourceMonitor,
}

impl<P: PageSource, N: Notifier, S: Storage, C: ConfigProvider> MonitorEngine<P, N, S, C> {
    pub fn new(source: P, notifier: N, storage: S, config: C) -> Self {
        let history = config.history_path().map(HistoryLog::new);
        Self {
            source,
            notifier,
            storage,
            config,
            tracker: PriceTracker::new(),
            state_loaded: false,
            history,
            resources: ResourceMonitor::default(),
        }
    }

    pub fn new_with_monitoring(
        source: P,
        notifier: N,
        storage: S,
        config: C,
        monitor: bool,
    ) -> Self {
        let mut engine = Self::new(source, notifier, storage, config);
        engine.resources = ResourceMonitor::new(monitor);
        engine
    }

    pub fn tracker(&self) -> &PriceTracker {
        &self.tracker
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    async fn ensure_state_loaded(&mut self) -> Result<()> {
        if self.state_loaded {
            return Ok(());
        }
        if let Some(path) = self.config.state_path() {
            self.tracker = PriceTracker::load(&self.storage, path).await?;
        }
        self.state_loaded = true;
        Ok(())
    }

    async fn navigate(&self) -> Navigation {
        let url = self.config.target_url();
        let max_attempts = self.config.max_goto_retries();
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            tracing::info!("🌐 Loading try {}/{} → {}", attempt, max_attempts, url);

            match self.source.load(url).await {
                Ok(page) => {
                    if page.final_url.starts_with(self.config.auth_url_prefix()) {
                        return Navigation::AuthRequired(page.final_url);
                    }
                    if has_price_badge(&page.html) {
                        return Navigation::Ready(page);
                    }
                    last_error = "price badge did not appear".to_string();
                    tracing::warn!("⚠️ Price badge not found (try {})", attempt);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Load failed (try {}): {}", attempt, e);
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        let error = MonitorError::NavigationError {
            url: url.to_string(),
            attempts: max_attempts,
            message: last_error,
        };
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            error,
            error.category(),
            error.severity()
        );
        Navigation::Failed(max_attempts)
    }

    /// Loads the page once, picks the first non-Foiler listing and alerts on
    /// a new lowest price.
    pub async fn check_once(&mut self) -> Result<CheckOutcome> {
        self.ensure_state_loaded().await?;

        let page = match self.navigate().await {
            Navigation::Ready(page) => page,
            Navigation::AuthRequired(url) => {
                tracing::error!(
                    "🔒 Session expired / login required ({}). Regenerate storage_state.json.",
                    url
                );
                return Ok(CheckOutcome::AuthRequired { url });
            }
            Navigation::Failed(attempts) => return Ok(CheckOutcome::NavigationFailed { attempts }),
        };

        let candidates = extract_candidates(&page.html, self.config.target_url());
        let report = find_first_non_foiler(&candidates, self.config.max_scan_items());

        let Some(listing) = report.listing.clone() else {
            tracing::info!("No valid card detected on this iteration");
            return Ok(CheckOutcome::NoListing { report });
        };

        tracing::info!(
            "💶 Current min (first non-Foiler): {:.2} € - {} - {}",
            listing.price,
            listing.title,
            listing.url
        );

        let previous_best = self.tracker.best_price();
        let new_low = self.tracker.is_new_low(listing.price);
        if new_low {
            self.alert(&listing, previous_best).await;
        }

        self.record_history(&listing, new_low);

        Ok(CheckOutcome::Observed {
            listing,
            new_low,
            previous_best,
        })
    }

    async fn alert(&mut self, listing: &Listing, previous_best: Option<f64>) {
        tracing::info!(
            "🚨 New lowest price {:.2} € (previous {})",
            listing.price,
            previous_best
                .map(|p| format!("{:.2} €", p))
                .unwrap_or_else(|| "∞".to_string())
        );

        match self.notifier.notify(listing).await {
            Ok(NotifyOutcome::Sent { status }) => {
                tracing::debug!("Notification delivered (HTTP {})", status)
            }
            Ok(NotifyOutcome::Skipped) => {}
            Err(e) => tracing::error!("❌ Notification failed: {}", e),
        }

        // 不論通知是否成功都更新最低價，避免每輪重複通知
        self.tracker.record(listing);
        if let Some(path) = self.config.state_path() {
            if let Err(e) = self.tracker.save(&self.storage, path).await {
                tracing::error!("❌ Failed to persist price state to {}: {}", path, e);
            }
        }
    }

    fn record_history(&self, listing: &Listing, new_low: bool) {
        let Some(history) = &self.history else {
            return;
        };
        let observation = Observation {
            observed_at: Utc::now(),
            title: listing.title.clone(),
            price: listing.price,
            url: listing.url.clone(),
            new_low,
        };
        if let Err(e) = history.append(&observation) {
            tracing::warn!(
                "⚠️ Could not append to history {}: {}",
                history.path().display(),
                e
            );
        }
    }

    /// Polls until `shutdown` resolves. Returns the number of checks started.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<u64>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let poll = self.config.poll_interval();

        tracing::info!(
            "🚀 Watching marketplace (first non-Foiler card): {}",
            self.config.target_url()
        );

        let mut iteration: u64 = 0;
        loop {
            iteration += 1;
            tracing::info!("🔄 Check #{} loading...", iteration);

            let result = tokio::select! {
                result = self.check_once() => result,
                _ = &mut shutdown => {
                    tracing::info!("🛑 Shutdown requested during check #{}", iteration);
                    return Ok(iteration);
                }
            };

            let pause = match result {
                Ok(CheckOutcome::AuthRequired { .. }) => poll.max(AUTH_BACKOFF),
                Ok(_) => poll,
                Err(e) => {
                    tracing::error!(
                        "❌ Check #{} failed: {} (Category: {:?}, Severity: {:?})",
                        iteration,
                        e,
                        e.category(),
                        e.severity()
                    );
                    poll
                }
            };

            self.resources.log_iteration(iteration);

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = &mut shutdown => {
                    tracing::info!("🛑 Shutdown requested, stopping after {} checks", iteration);
                    return Ok(iteration);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    struct FixedPage {
        final_url: String,
        hits: Arc<Mutex<Vec<Instant>>>,
    }

    #[async_trait]
    impl PageSource for FixedPage {
        async fn load(&self, _url: &str) -> Result<LoadedPage> {
            self.hits.lock().unwrap().push(Instant::now());
            Ok(LoadedPage {
                final_url: self.final_url.clone(),
                html: "<html><body>Connexion</body></html>".to_string(),
            })
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn notify(&self, _listing: &Listing) -> Result<NotifyOutcome> {
            Ok(NotifyOutcome::Skipped)
        }
    }

    struct UnreachableStorage {
        reads: Arc<AtomicUsize>,
    }

    impl Storage for UnreachableStorage {
        async fn read_file(&self, _path: &str) -> Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Err(MonitorError::StorageError {
                message: "bucket unreachable".to_string(),
            })
        }

        async fn write_file(&self, _path: &str, _data: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            target_url: "https://www.altered.gg/fr-fr/cards/market".to_string(),
            poll_seconds: 1,
            retry_delay_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_redirect_backs_off_at_least_a_minute() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let source = FixedPage {
            final_url: "https://auth.altered.gg/login".to_string(),
            hits: Arc::clone(&hits),
        };
        let storage = UnreachableStorage {
            reads: Arc::new(AtomicUsize::new(0)),
        };
        let mut engine = MonitorEngine::new(source, SilentNotifier, storage, fast_config());

        let checks = engine
            .run(tokio::time::sleep(Duration::from_secs(150)))
            .await
            .unwrap();

        let hits = hits.lock().unwrap();
        assert_eq!(checks, 3);
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= AUTH_BACKOFF, "gap was {:?}", gap);
            assert!(gap < AUTH_BACKOFF + Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_keeps_checking_after_errors() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let reads = Arc::new(AtomicUsize::new(0));
        let source = FixedPage {
            final_url: "https://www.altered.gg/fr-fr/cards/market".to_string(),
            hits: Arc::clone(&hits),
        };
        let storage = UnreachableStorage {
            reads: Arc::clone(&reads),
        };
        let config = MonitorConfig {
            state_file: Some("state.json".to_string()),
            ..fast_config()
        };
        let mut engine = MonitorEngine::new(source, SilentNotifier, storage, config);

        let checks = engine
            .run(tokio::time::sleep(Duration::from_millis(3500)))
            .await
            .unwrap();

        // 每輪都重試載入狀態，失敗後照常等一個輪詢間隔
        assert_eq!(checks, 4);
        assert_eq!(reads.load(Ordering::SeqCst), 4);
        assert!(hits.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_badge_fails_after_all_tries() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let source = FixedPage {
            final_url: "https://www.altered.gg/fr-fr/cards/market".to_string(),
            hits: Arc::clone(&hits),
        };
        let storage = UnreachableStorage {
            reads: Arc::new(AtomicUsize::new(0)),
        };
        let mut engine = MonitorEngine::new(source, SilentNotifier, storage, fast_config());

        let outcome = engine.check_once().await.unwrap();

        assert_eq!(outcome, CheckOutcome::NavigationFailed { attempts: 3 });
        let hits = hits.lock().unwrap();
        assert_eq!(hits.len(), 3);
        let spread = hits[2] - hits[0];
        assert!(spread >= Duration::from_millis(20) && spread < Duration::from_millis(30));
    }
}
