//! Reachability checker.
//!
//! One GET per check, bounded by a timeout, no retries. Redirect chains that
//! end on a domain-parking provider are reported as parked; any transport
//! failure is reported as dead.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{StatusCode, Url};

use crate::types::verification::LinkStatus;

/// Registrar and marketplace hosts that serve parked-domain pages.
pub const PARKING_DOMAINS: &[&str] = &[
    "hugedomains.com",
    "godaddy.com",
    "namecheap.com",
    "sedo.com",
    "dan.com",
    "squadhelp.com",
    "afternic.com",
    "domainmarket.com",
    "uniregistry.com",
    "namesilo.com",
];

/// Determines whether a URL is live, dead or parked.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    /// Always yields a terminal status; failures map to `Dead`.
    async fn check(&self, url: &str) -> LinkStatus;
}

/// `StatusChecker` over a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpStatusChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpStatusChecker {
    /// Builds a checker with its own client.
    ///
    /// # Errors
    /// Returns `reqwest::Error` if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, timeout))
    }

    /// Uses a caller-provided client, e.g. one with DNS overrides.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl StatusChecker for HttpStatusChecker {
    async fn check(&self, url: &str) -> LinkStatus {
        let requested = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("Status check for {} skipped, unparseable URL: {}", url, err);
                return LinkStatus::Dead;
            }
        };

        let response = match self
            .client
            .get(requested.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    "Status check for {} failed (timeout: {}): {}",
                    url,
                    err.is_timeout(),
                    err
                );
                return LinkStatus::Dead;
            }
        };

        let redirected = response.url() != &requested;
        let status = classify_response(redirected, response.url(), response.status());
        debug!("Status check for {} -> {:?} ({})", url, status, response.status());
        status
    }
}

/// Maps a completed response to a reachability verdict.
pub fn classify_response(redirected: bool, final_url: &Url, status: StatusCode) -> LinkStatus {
    if redirected && final_url.host_str().is_some_and(is_parking_host) {
        return LinkStatus::Parked;
    }
    if status.is_success() {
        LinkStatus::Live
    } else {
        LinkStatus::Dead
    }
}

/// Exact or subdomain match against [`PARKING_DOMAINS`].
pub fn is_parking_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    PARKING_DOMAINS.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}
