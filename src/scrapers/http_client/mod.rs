//! HTTP fetching through an escalating chain of transports.
//!
//! The forum sits behind aggressive anti-scraping measures, so a single
//! client configuration is never enough. Every fetch walks an ordered list
//! of transports until one succeeds:
//!
//! 1. A pool-free direct request (quick, cheap, often sufficient).
//! 2. A persistent browser-like session: large connection pool, cookie
//!    jar, rotated user agents, generous redirect budget. On failure the
//!    session is rebuilt with a fresh cookie jar and tried once more.
//! 3. A SOCKS5 proxy (Tor) as the last resort.
//!
//! The whole chain is itself wrapped in a jittered outer retry, so a call
//! only fails after every tier has been exhausted several times over.

mod user_agent;

pub use user_agent::{browser_headers, random_user_agent, USER_AGENTS};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Proxy};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::utils::{retry, RetryPolicy};

/// A fetched page.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code of the final response.
    pub status: u16,
    /// Decoded body text.
    pub body: String,
}

/// Errors produced by the transport chain.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The redirect budget was exhausted. Callers treat this as "thread
    /// unreachable further", not as a transient failure.
    #[error("redirect limit exceeded fetching {url}")]
    RedirectStorm { url: String },

    /// A transport-level failure (timeout, reset, bad status on the
    /// direct tier, proxy unavailable, ...).
    #[error("{tier} transport failed for {url}: {source}")]
    Transport {
        tier: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Whether this failure was a redirect loop/storm.
    pub fn is_redirect_storm(&self) -> bool {
        matches!(self, FetchError::RedirectStorm { .. })
    }

    fn from_reqwest(tier: &'static str, url: &str, source: reqwest::Error) -> Self {
        if source.is_redirect() {
            FetchError::RedirectStorm {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                tier,
                url: url.to_string(),
                source,
            }
        }
    }
}

/// One tier of the escalation chain. Every tier exposes the same attempt
/// signature so adding or removing one never changes the chain's shape.
#[async_trait]
trait Transport: Send + Sync {
    fn tier(&self) -> &'static str;

    async fn attempt(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Tier 1: minimal, connection-pool-free GET.
struct DirectTransport {
    client: Client,
}

impl DirectTransport {
    fn new() -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(Duration::from_secs(40))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    async fn get_once(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let map = |e| FetchError::from_reqwest("direct", url, e);

        // A bare request treats any error status as a failure, pushing the
        // page to the pooled tier which returns bodies regardless.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(map)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map)?;
        Ok(FetchResponse { status, body })
    }
}

#[async_trait]
impl Transport for DirectTransport {
    fn tier(&self) -> &'static str {
        "direct"
    }

    async fn attempt(&self, url: &str) -> Result<FetchResponse, FetchError> {
        retry(&RetryPolicy::DIRECT_TRANSPORT, || self.get_once(url)).await
    }
}

/// Tier 2: persistent session with browser-like headers.
struct PooledTransport {
    session: RwLock<Client>,
}

impl PooledTransport {
    fn new() -> Self {
        Self {
            session: RwLock::new(Self::build_session()),
        }
    }

    fn build_session() -> Client {
        Client::builder()
            .pool_max_idle_per_host(150)
            .cookie_store(true)
            .redirect(Policy::limited(60))
            .connect_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client")
    }

    async fn get_once(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let map = |e| FetchError::from_reqwest("pooled", url, e);

        let client = self.session.read().await.clone();
        let mut request = client.get(url);
        for (name, value) in browser_headers() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(map)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map)?;
        Ok(FetchResponse { status, body })
    }

    /// Replace the session with a fresh one (empty cookie jar, same
    /// settings).
    async fn reset_session(&self) {
        let mut session = self.session.write().await;
        *session = Self::build_session();
    }
}

#[async_trait]
impl Transport for PooledTransport {
    fn tier(&self) -> &'static str {
        "pooled"
    }

    async fn attempt(&self, url: &str) -> Result<FetchResponse, FetchError> {
        match self.get_once(url).await {
            Ok(response) => Ok(response),
            Err(first) => {
                debug!("pooled session failed ({first}); clearing cookies and retrying");
                self.reset_session().await;
                self.get_once(url).await
            }
        }
    }
}

/// Tier 3: anonymizing fallback through a SOCKS5 (Tor) proxy.
struct ProxyTransport {
    proxy_url: String,
}

impl ProxyTransport {
    const RETRY: RetryPolicy = RetryPolicy {
        tries: 4,
        delay: Duration::from_secs(1),
        backoff: 1.5,
        max_delay: Duration::from_secs(10),
        jitter: None,
    };

    fn new(proxy_url: &str) -> Self {
        Self {
            proxy_url: proxy_url.to_string(),
        }
    }

    async fn get_once(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let map = |e| FetchError::from_reqwest("proxy", url, e);

        // Built per attempt: each try gets a fresh proxy connection, and a
        // misconfigured proxy surfaces as a normal transport error.
        let client = Proxy::all(&self.proxy_url)
            .and_then(|proxy| {
                Client::builder()
                    .proxy(proxy)
                    .timeout(Duration::from_secs(60))
                    .build()
            })
            .map_err(map)?;

        let response = client.get(url).send().await.map_err(map)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map)?;
        Ok(FetchResponse { status, body })
    }
}

#[async_trait]
impl Transport for ProxyTransport {
    fn tier(&self) -> &'static str {
        "proxy"
    }

    async fn attempt(&self, url: &str) -> Result<FetchResponse, FetchError> {
        retry(&Self::RETRY, || self.get_once(url)).await
    }
}

/// HTTP client that escalates through the transport chain with an outer
/// retry around the whole sequence.
pub struct ResilientClient {
    transports: Vec<Box<dyn Transport>>,
}

impl ResilientClient {
    /// Build the standard three-tier chain.
    pub fn new(socks_proxy: &str) -> Self {
        Self {
            transports: vec![
                Box::new(DirectTransport::new()),
                Box::new(PooledTransport::new()),
                Box::new(ProxyTransport::new(socks_proxy)),
            ],
        }
    }

    /// Fetch a URL, escalating through every tier, retrying the whole
    /// chain on failure.
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        retry(&RetryPolicy::FETCH, || self.escalate(url)).await
    }

    async fn escalate(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let mut last_error = None;

        for transport in &self.transports {
            match transport.attempt(url).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    debug!("{} tier failed for {url}: {err}", transport.tier());
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.expect("transport chain is never empty"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_storm_detection() {
        let err = FetchError::RedirectStorm {
            url: "https://example.com/thread".to_string(),
        };
        assert!(err.is_redirect_storm());
    }

    #[test]
    fn test_chain_order() {
        let client = ResilientClient::new("socks5h://127.0.0.1:9050");
        let tiers: Vec<_> = client.transports.iter().map(|t| t.tier()).collect();
        assert_eq!(tiers, vec!["direct", "pooled", "proxy"]);
    }
}
