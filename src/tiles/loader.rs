//! Network side of the tile cache.
//!
//! [`TileFetcher`] is the only place the engine touches the network. The
//! default [`HttpFetcher`] shares one `reqwest` client across every service so
//! TLS and connection pools are set up once per process.

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::prelude::Duration;
use crate::{Result, TileError};

/// Shared async HTTP client used for tile and metadata fetches
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("tilepyramid/", env!("CARGO_PKG_VERSION")))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
});

/// Anything able to turn a URL into raw bytes.
#[async_trait]
pub trait TileFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Retry and timeout settings of [`HttpFetcher`]
#[derive(Debug, Clone, PartialEq)]
pub struct FetcherConfig {
    /// Extra attempts after the first failure
    pub max_retries: usize,
    /// Delay before each retry
    pub retry_delay: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
        }
    }
}

impl FetcherConfig {
    pub fn low_resource() -> Self {
        Self {
            max_retries: 1,
            retry_delay: Duration::from_millis(250),
            timeout: Duration::from_secs(20),
        }
    }

    pub fn high_performance() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(25),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn for_testing() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(2),
        }
    }
}

/// HTTP fetcher with a small retry loop.
///
/// Client errors (4xx) are final; transport errors and 5xx responses are
/// retried. Needs a tokio reactor, so pair it with `TokioSpawner`.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<Vec<u8>, (TileError, bool)> {
        let response = HTTP_CLIENT
            .get(url)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| (TileError::Network(e), true))?;

        let status = response.status();
        if !status.is_success() {
            let error = TileError::FetchFailed {
                key: url.to_string(),
                reason: format!("HTTP {}", status),
            };
            return Err((error, !status.is_client_error()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| (TileError::Network(e), true))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            log::debug!("fetch {} attempt {}", url, attempt + 1);
            match self.fetch_once(url).await {
                Ok(data) => {
                    log::debug!("downloaded {} ({} bytes)", url, data.len());
                    return Ok(data);
                }
                Err((error, retryable)) => {
                    if !retryable || attempt >= self.config.max_retries {
                        log::warn!("giving up on {}: {}", url, error);
                        return Err(error);
                    }
                    log::debug!("{} failed on attempt {}: {}", url, attempt + 1, error);
                    attempt += 1;
                    pause(self.config.retry_delay).await;
                }
            }
        }
    }
}

async fn pause(delay: Duration) {
    #[cfg(feature = "tokio-runtime")]
    ::tokio::time::sleep(delay).await;
    #[cfg(not(feature = "tokio-runtime"))]
    let _ = delay;
}
