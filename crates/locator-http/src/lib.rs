//! Locator HTTP - one-shot HTTP lookup locator
//!
//! Each `locate()` issues a single GET against a discovery endpoint and
//! extracts a location from the response body. There is no state machine:
//! no caching, no watches, no retries.
//!
//! The default body format is a server list:
//!
//! ```text
//! {"servers": [{"address": "10.0.0.1", "port": 9000}, ...]}
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use locator_core::extract::port_from_json;
use locator_core::{DataExtractor, Location, Locator, LocatorError, LocatorResult};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Server List Extractor
// ============================================================================

#[derive(Debug, Deserialize)]
struct ServerList {
    servers: Option<Vec<ServerEntry>>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    address: Option<String>,
    port: Option<serde_json::Value>,
}

/// Default extractor for `{"servers": [...]}` bodies.
///
/// Picks one usable entry per call, rotating through the list so repeated
/// lookups spread across the advertised servers.
#[derive(Debug, Default)]
pub struct ServerListExtractor {
    next: AtomicUsize,
}

impl ServerListExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataExtractor for ServerListExtractor {
    fn extract(&self, data: &[u8]) -> Option<Location> {
        let list: ServerList = serde_json::from_slice(data).ok()?;
        let usable: Vec<Location> = list
            .servers?
            .into_iter()
            .filter_map(|entry| {
                let address = entry.address.filter(|a| !a.is_empty())?;
                let port = entry.port.as_ref().and_then(port_from_json);
                Some(Location::from_parts(address, port))
            })
            .collect();

        if usable.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % usable.len();
        usable.into_iter().nth(index)
    }
}

// ============================================================================
// HTTP Locator
// ============================================================================

/// Locator resolving through one HTTP GET per call.
pub struct HttpLocator {
    url: String,
    client: reqwest::Client,
    extractor: Arc<dyn DataExtractor>,
}

impl HttpLocator {
    /// Creates a locator for `url` with the default server list extractor.
    ///
    /// # Errors
    ///
    /// - `LocatorError::InvalidResource` if the URL is not `http://` or `https://`
    /// - `LocatorError::Http` if the HTTP client cannot be built
    pub fn new(url: impl Into<String>) -> LocatorResult<Self> {
        Self::with_extractor(url, Arc::new(ServerListExtractor::new()))
    }

    /// Creates a locator with a custom body extractor.
    pub fn with_extractor(
        url: impl Into<String>,
        extractor: Arc<dyn DataExtractor>,
    ) -> LocatorResult<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(LocatorError::InvalidResource("must have resource".to_string()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(LocatorError::InvalidResource(format!("invalid url: {url}")));
        }

        Ok(Self {
            url,
            client: build_client(DEFAULT_REQUEST_TIMEOUT)?,
            extractor,
        })
    }

    /// Replaces the per-request timeout.
    ///
    /// # Errors
    ///
    /// - `LocatorError::Http` if the HTTP client cannot be built
    pub fn with_request_timeout(mut self, timeout: Duration) -> LocatorResult<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// The lookup URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn build_client(timeout: Duration) -> LocatorResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("locators/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(LocatorError::http)
}

#[async_trait]
impl Locator for HttpLocator {
    async fn locate(&self) -> LocatorResult<Location> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            warn!(url = %self.url, error = %e, "HTTP lookup failed");
            LocatorError::http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %self.url, status = status.as_u16(), "HTTP lookup returned non-2xx");
            return Err(LocatorError::BadResponse {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(LocatorError::http)?;
        let location = self
            .extractor
            .extract(&body)
            .ok_or(LocatorError::MalformedResponse)?;

        debug!(url = %self.url, location = %location, "HTTP lookup resolved");
        Ok(location)
    }
}
