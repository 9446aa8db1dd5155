use crate::adapters::session::SessionState;
use crate::core::{LoadedPage, PageSource};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Plain HTTP page source. Only sees server-rendered markup.
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(
        user_agent: Option<&str>,
        request_timeout: Duration,
        session: Option<&SessionState>,
    ) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        if let Some(session) = session {
            let mut seeded = 0usize;
            for cookie in session.live_cookies() {
                if let Some(origin) = cookie.origin_url() {
                    jar.add_cookie_str(&cookie.to_set_cookie(), &origin);
                    seeded += 1;
                }
            }
            tracing::debug!("Seeded {} session cookies into HTTP client", seeded);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("fr-FR,fr;q=0.9"));

        let mut builder = Client::builder()
            .cookie_provider(jar)
            .default_headers(headers)
            .timeout(request_timeout);
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn load(&self, url: &str) -> Result<LoadedPage> {
        tracing::debug!("Making page request to: {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let final_url = response.url().to_string();
        tracing::debug!("Page response status: {} ({})", status, final_url);
        if !status.is_success() {
            tracing::warn!("⚠️ Page returned HTTP {} for {}", status, final_url);
        }

        let html = response.text().await?;
        Ok(LoadedPage { final_url, html })
    }
}
