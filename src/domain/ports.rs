use crate::domain::model::{Listing, LoadedPage, NotifyOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn target_url(&self) -> &str;
    fn auth_url_prefix(&self) -> &str;
    fn poll_interval(&self) -> Duration;
    fn max_goto_retries(&self) -> u32;
    fn retry_delay(&self) -> Duration;
    fn max_scan_items(&self) -> usize;
    fn state_path(&self) -> Option<&str>;
    fn history_path(&self) -> Option<&str>;
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn load(&self, url: &str) -> Result<LoadedPage>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, listing: &Listing) -> Result<NotifyOutcome>;
}

#[async_trait]
impl PageSource for Box<dyn PageSource> {
    async fn load(&self, url: &str) -> Result<LoadedPage> {
        (**self).load(url).await
    }
}
