//! Safety checker.
//!
//! Asks a URL-reputation service (VirusTotal v3 wire shape) for a verdict.
//! A URL the service has never seen is submitted for scanning and reported as
//! `Scanning`; the checker never polls. A later check that passes the cached
//! `Scanning` verdict back in only looks up and never resubmits.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use log::{debug, warn};
use reqwest::{header, StatusCode};
use serde::Deserialize;

use crate::types::errors::ReportError;
use crate::types::verification::{AnalysisStats, SafetyData, SafetyStatus};

/// Detections at or above this count are `Unsafe`; 1 up to this count is `Warning`.
pub const UNSAFE_DETECTION_THRESHOLD: u32 = 5;

const API_KEY_HEADER: &str = "x-apikey";
const REPORT_BASE: &str = "https://www.virustotal.com/gui";
const RATE_LIMIT_MESSAGE: &str = "Rate limit reached (4/min)";

/// Produces a safety verdict for one URL.
#[async_trait]
pub trait SafetyChecker: Send + Sync {
    /// `previous` is the last cached verdict for this URL, if any.
    async fn check(
        &self,
        url: &str,
        credential: Option<&str>,
        previous: Option<&SafetyData>,
    ) -> SafetyData;
}

/// `SafetyChecker` speaking the VirusTotal v3 URL API.
#[derive(Debug, Clone)]
pub struct VirusTotalChecker {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    data: Option<LookupData>,
}

#[derive(Debug, Deserialize)]
struct LookupData {
    attributes: Option<LookupAttributes>,
}

#[derive(Debug, Deserialize)]
struct LookupAttributes {
    last_analysis_stats: Option<AnalysisStats>,
}

enum Lookup {
    Stats(AnalysisStats),
    NoStats,
    NotFound,
    RateLimited,
    Failed(String),
}

impl VirusTotalChecker {
    /// # Errors
    /// Returns `reqwest::Error` if the TLS backend cannot be initialized.
    pub fn new(api_base: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, api_base))
    }

    pub fn with_client(client: reqwest::Client, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn lookup(&self, url: &str, credential: &str) -> Lookup {
        let endpoint = format!("{}/urls/{}", self.api_base, url_id(url));
        let response = match self
            .client
            .get(&endpoint)
            .header(API_KEY_HEADER, credential)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Lookup::Failed(format!("lookup request failed: {}", err)),
        };

        match response.status() {
            StatusCode::NOT_FOUND => Lookup::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Lookup::RateLimited,
            status if status.is_success() => {
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(err) => return Lookup::Failed(format!("lookup body unreadable: {}", err)),
                };
                match serde_json::from_str::<LookupResponse>(&body) {
                    Ok(parsed) => parsed
                        .data
                        .and_then(|d| d.attributes)
                        .and_then(|a| a.last_analysis_stats)
                        .map_or(Lookup::NoStats, Lookup::Stats),
                    Err(err) => Lookup::Failed(format!("lookup response malformed: {}", err)),
                }
            }
            status => Lookup::Failed(format!("lookup failed: HTTP {}", status)),
        }
    }

    async fn submit(&self, url: &str, credential: &str) -> SafetyData {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("url", url)
            .finish();
        let response = self
            .client
            .post(format!("{}/urls", self.api_base))
            .header(API_KEY_HEADER, credential)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                SafetyData::with_status(SafetyStatus::Scanning).with_message("Scanning in progress...")
            }
            Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                SafetyData::with_status(SafetyStatus::RateLimited).with_message(RATE_LIMIT_MESSAGE)
            }
            Ok(response) => SafetyData::with_status(SafetyStatus::Error)
                .with_message(format!("scan submission failed: HTTP {}", response.status())),
            Err(err) => SafetyData::with_status(SafetyStatus::Error)
                .with_message(format!("scan submission failed: {}", err)),
        }
    }
}

#[async_trait]
impl SafetyChecker for VirusTotalChecker {
    async fn check(
        &self,
        url: &str,
        credential: Option<&str>,
        previous: Option<&SafetyData>,
    ) -> SafetyData {
        let Some(credential) = credential.filter(|c| !c.trim().is_empty()) else {
            return SafetyData::unknown().with_message("VirusTotal API key not configured");
        };
        let resuming = previous.is_some_and(|p| p.status == SafetyStatus::Scanning);

        let verdict = match self.lookup(url, credential).await {
            Lookup::Stats(stats) => classify(&stats),
            Lookup::NoStats if resuming => {
                SafetyData::with_status(SafetyStatus::Scanning).with_message("Scanning in progress...")
            }
            Lookup::NoStats => SafetyData::unknown(),
            Lookup::NotFound if resuming => {
                SafetyData::with_status(SafetyStatus::Scanning).with_message("Scanning in progress...")
            }
            Lookup::NotFound => self.submit(url, credential).await,
            Lookup::RateLimited => {
                SafetyData::with_status(SafetyStatus::RateLimited).with_message(RATE_LIMIT_MESSAGE)
            }
            Lookup::Failed(message) => {
                warn!("Safety check for {} failed: {}", url, message);
                SafetyData::with_status(SafetyStatus::Error).with_message(message)
            }
        };
        debug!("Safety check for {} -> {:?}", url, verdict.status);
        verdict
    }
}

/// Turns analysis counts into a verdict.
pub fn classify(stats: &AnalysisStats) -> SafetyData {
    let detections = stats.malicious.saturating_add(stats.suspicious);
    let total = detections
        .saturating_add(stats.undetected)
        .saturating_add(stats.harmless);
    let status = if detections == 0 {
        SafetyStatus::Safe
    } else if detections >= UNSAFE_DETECTION_THRESHOLD {
        SafetyStatus::Unsafe
    } else {
        SafetyStatus::Warning
    };
    SafetyData {
        status,
        detections,
        total,
        malicious: Some(stats.malicious),
        suspicious: Some(stats.suspicious),
        undetected: Some(stats.undetected),
        harmless: Some(stats.harmless),
        message: None,
    }
}

/// The service's identifier for a URL: unpadded standard base64 of the URL.
pub fn url_id(url: &str) -> String {
    STANDARD_NO_PAD.encode(url.as_bytes())
}

/// Link to the service's per-URL report page.
pub fn url_report_url(url: &str) -> String {
    format!("{}/url/{}", REPORT_BASE, url_id(url))
}

/// Link to the service's report page for the URL's domain.
///
/// # Errors
/// Returns `ReportError::InvalidUrl` if no hostname can be extracted.
pub fn domain_report_url(url: &str) -> Result<String, ReportError> {
    let parsed = url::Url::parse(url).map_err(|_| ReportError::InvalidUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ReportError::InvalidUrl(url.to_string()))?;
    Ok(format!("{}/domain/{}", REPORT_BASE, host))
}
