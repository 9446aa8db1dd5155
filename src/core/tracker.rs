use crate::core::{Listing, PriceState, Storage};
use crate::utils::error::{MonitorError, Result};
use chrono::Utc;

/// Prices closer than this are treated as equal.
pub const PRICE_EPSILON: f64 = 1e-9;

/// Keeps the lowest price seen so far and decides when to alert.
#[derive(Debug, Clone, Default)]
pub struct PriceTracker {
    state: PriceState,
}

impl PriceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 從 Storage 載入；檔案不存在時從頭開始
    pub async fn load<S: Storage>(storage: &S, path: &str) -> Result<Self> {
        match storage.read_file(path).await {
            Ok(bytes) => {
                let state: PriceState = serde_json::from_slice(&bytes)?;
                tracing::info!(
                    "💾 Loaded price state from {} (best: {})",
                    path,
                    state
                        .best_price
                        .map(|p| format!("{:.2} €", p))
                        .unwrap_or_else(|| "∞".to_string())
                );
                Ok(Self { state })
            }
            Err(MonitorError::StateNotFound { .. }) => {
                tracing::info!("💾 No price state at {}, starting fresh", path);
                Ok(Self::new())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn save<S: Storage>(&self, storage: &S, path: &str) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.state)?;
        storage.write_file(path, &data).await
    }

    pub fn best_price(&self) -> Option<f64> {
        self.state.best_price
    }

    pub fn state(&self) -> &PriceState {
        &self.state
    }

    pub fn is_new_low(&self, price: f64) -> bool {
        match self.state.best_price {
            None => true,
            Some(best) => price < best - PRICE_EPSILON,
        }
    }

    pub fn record(&mut self, listing: &Listing) {
        self.state = PriceState {
            best_price: Some(listing.price),
            best_title: Some(listing.title.clone()),
            best_url: Some(listing.url.clone()),
            updated_at: Some(Utc::now()),
        };
    }
}
