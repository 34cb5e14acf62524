use serde::{Deserialize, Serialize};

/// Reachability of a bookmarked URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Unchecked,
    Checking,
    Live,
    Dead,
    Parked,
}

impl LinkStatus {
    /// Whether this is a verdict a checker can produce (and the cache can hold).
    pub fn is_terminal(self) -> bool {
        match self {
            LinkStatus::Live | LinkStatus::Dead | LinkStatus::Parked => true,
            LinkStatus::Unchecked | LinkStatus::Checking => false,
        }
    }

    /// Tooltip text for the status indicator.
    pub fn describe(self) -> &'static str {
        match self {
            LinkStatus::Live => "Link is live and accessible",
            LinkStatus::Dead => "Link is dead or unreachable",
            LinkStatus::Parked => "Domain is parked or for sale",
            LinkStatus::Checking => "Checking link status...",
            LinkStatus::Unchecked => "Link status not yet checked",
        }
    }
}

/// Safety verdict for a bookmarked URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    Unknown,
    Checking,
    Scanning,
    Safe,
    Unsafe,
    Warning,
    RateLimited,
    Error,
}

impl SafetyStatus {
    /// Settled verdicts are served from a fresh cache entry without asking the
    /// service again. `Scanning`, `RateLimited` and `Unknown` must be re-checked.
    pub fn is_settled(self) -> bool {
        match self {
            SafetyStatus::Safe | SafetyStatus::Unsafe | SafetyStatus::Warning | SafetyStatus::Error => true,
            SafetyStatus::Unknown
            | SafetyStatus::Checking
            | SafetyStatus::Scanning
            | SafetyStatus::RateLimited => false,
        }
    }
}

/// Normalized result of a safety check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyData {
    pub status: SafetyStatus,
    pub detections: u32,
    pub total: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malicious: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspicious: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undetected: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmless: Option<u32>,
    /// Diagnostic shown to the user; never part of any key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SafetyData {
    /// A verdict with no counts.
    pub fn with_status(status: SafetyStatus) -> Self {
        Self {
            status,
            detections: 0,
            total: 0,
            malicious: None,
            suspicious: None,
            undetected: None,
            harmless: None,
            message: None,
        }
    }

    pub fn unknown() -> Self {
        Self::with_status(SafetyStatus::Unknown)
    }

    pub fn checking() -> Self {
        Self::with_status(SafetyStatus::Checking)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Tooltip text for the shield indicator.
    pub fn summary(&self) -> String {
        let mut text = match self.status {
            SafetyStatus::Safe => format!(
                "Clean - no threats detected\n0/{} security vendors flagged this URL",
                self.total
            ),
            SafetyStatus::Unsafe => format!(
                "Malicious - multiple threats detected\n{}/{} security vendors flagged this URL",
                self.detections, self.total
            ),
            SafetyStatus::Warning => format!(
                "Suspicious - some vendors flagged this URL\n{}/{} security vendors flagged this URL",
                self.detections, self.total
            ),
            SafetyStatus::Scanning => "Scan in progress".to_string(),
            SafetyStatus::Checking => "Checking safety...".to_string(),
            SafetyStatus::RateLimited => "Rate limit reached, try again in a moment".to_string(),
            SafetyStatus::Error => "Error during security check".to_string(),
            SafetyStatus::Unknown => "Security status unknown".to_string(),
        };
        if matches!(self.status, SafetyStatus::Unsafe | SafetyStatus::Warning) {
            if let Some(count) = self.malicious.filter(|c| *c > 0) {
                text.push_str(&format!("\n{} marked as malicious", count));
            }
            if let Some(count) = self.suspicious.filter(|c| *c > 0) {
                text.push_str(&format!("\n{} marked as suspicious", count));
            }
        }
        if let Some(message) = &self.message {
            text.push('\n');
            text.push_str(message);
        }
        text
    }
}

impl Default for SafetyData {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Raw vendor counts from the safety service's last analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    #[serde(default)]
    pub malicious: u32,
    #[serde(default)]
    pub suspicious: u32,
    #[serde(default)]
    pub undetected: u32,
    #[serde(default)]
    pub harmless: u32,
}

/// One URL's entry in the verification cache blob.
///
/// Each pass writes only its own field and its own write time. `timestamp` is
/// epoch milliseconds of the last write to either half; entries without a
/// per-half time fall back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    #[serde(default)]
    pub link_status: Option<LinkStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_checked_at: Option<i64>,
    #[serde(default)]
    pub safety_data: Option<SafetyData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_checked_at: Option<i64>,
    pub timestamp: i64,
}

impl CacheEntry {
    /// When the link status was written.
    pub fn link_written_at(&self) -> i64 {
        self.link_checked_at.unwrap_or(self.timestamp)
    }

    /// When the safety verdict was written.
    pub fn safety_written_at(&self) -> i64 {
        self.safety_checked_at.unwrap_or(self.timestamp)
    }
}
