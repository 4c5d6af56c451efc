use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::calendar::TradingCalendar;
use super::classify::{BanRule, SicRange};
use super::error::{Result, ScanError};

/// Forms scanned when the configuration does not override `form_types`.
pub const DEFAULT_FORM_TYPES: &[&str] = &[
    "8-K", "6-K", "10-Q", "10-K", "3", "4", "SC 13D", "SC 13D/A", "SC 13G", "SC 13G/A",
];

/// Configuration for one scan run.
///
/// Every key except `contact_identity` has a default, so a minimal file is a single line:
///
/// ```toml
/// contact_identity = "SnapshotBot ops@example.com"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Sent as the `User-Agent` of every request. SEC fair access requires a contact.
    #[serde(default)]
    pub contact_identity: String,

    /// Minimum seconds between two outbound requests.
    #[serde(default = "default_request_rate")]
    pub request_rate: f64,

    /// Retries allowed for one request on 429/5xx or network failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Wall-clock budget for the whole scan.
    #[serde(default = "default_run_budget_secs")]
    pub run_budget_secs: u64,

    /// Header fetches kept in flight. All of them share the one rate limiter.
    #[serde(default = "default_header_workers")]
    pub header_workers: usize,

    /// IANA zone the window and every output timestamp are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Market holidays in addition to weekends.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,

    #[serde(default = "default_form_types")]
    pub form_types: Vec<String>,

    /// Inclusive SIC code ranges, written as `[[6000, 6999]]`.
    #[serde(default)]
    pub ban_sic_ranges: Vec<SicRange>,

    /// Case-insensitive substrings matched against company name and industry.
    #[serde(default)]
    pub ban_keywords: Vec<String>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub urls: ScanUrls,
}

/// Base URLs for the EDGAR services the scanner reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanUrls {
    /// Base URL for EDGAR archives (daily indices and filing headers).
    #[serde(default = "default_archives_url")]
    pub archives: String,
    /// Base URL for the EDGAR data API (issuer submissions).
    #[serde(default = "default_data_url")]
    pub data: String,
    /// Full URL of the ticker table used when a submissions document lists no ticker.
    #[serde(default = "default_tickers_url")]
    pub tickers: String,
}

impl Default for ScanUrls {
    fn default() -> Self {
        Self {
            archives: default_archives_url(),
            data: default_data_url(),
            tickers: default_tickers_url(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            contact_identity: String::new(),
            request_rate: default_request_rate(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            run_budget_secs: default_run_budget_secs(),
            header_workers: default_header_workers(),
            timezone: default_timezone(),
            holidays: Vec::new(),
            form_types: default_form_types(),
            ban_sic_ranges: Vec::new(),
            ban_keywords: Vec::new(),
            output_dir: default_output_dir(),
            urls: ScanUrls::default(),
        }
    }
}

// ~0.7 requests per second
fn default_request_rate() -> f64 {
    1.0 / 0.7
}
fn default_max_retries() -> u32 {
    5
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_run_budget_secs() -> u64 {
    30 * 60
}
fn default_header_workers() -> usize {
    4
}
fn default_timezone() -> String {
    "America/New_York".into()
}
fn default_form_types() -> Vec<String> {
    DEFAULT_FORM_TYPES.iter().map(|f| f.to_string()).collect()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}
fn default_archives_url() -> String {
    "https://www.sec.gov/Archives/edgar".into()
}
fn default_data_url() -> String {
    "https://data.sec.gov".into()
}
fn default_tickers_url() -> String {
    "https://www.sec.gov/files/company_tickers.json".into()
}

impl ScanConfig {
    /// Creates a configuration with defaults and the given contact identity.
    pub fn new(contact_identity: impl Into<String>) -> Self {
        Self {
            contact_identity: contact_identity.into(),
            ..Self::default()
        }
    }

    /// Loads and validates a TOML configuration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScanError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ScanError::Configuration(msg) => {
                ScanError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses a TOML document. Validation is left to the caller so overrides can be
    /// applied first.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ScanError::Configuration(e.to_string()))
    }

    /// Checks every value the run depends on before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.contact_identity.trim().is_empty() {
            return Err(ScanError::Configuration(
                "contact_identity is required (e.g. \"AppName admin@example.com\")".into(),
            ));
        }
        if !self.request_rate.is_finite() || self.request_rate <= 0.0 {
            return Err(ScanError::Configuration(format!(
                "request_rate must be a positive number of seconds, got {}",
                self.request_rate
            )));
        }
        self.request_interval()?;
        if self.header_workers == 0 {
            return Err(ScanError::Configuration(
                "header_workers must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 || self.run_budget_secs == 0 {
            return Err(ScanError::Configuration(
                "request_timeout_secs and run_budget_secs must be greater than zero".into(),
            ));
        }
        if self.form_types.is_empty() {
            return Err(ScanError::Configuration("form_types is empty".into()));
        }
        if let Some(range) = self.ban_sic_ranges.iter().find(|r| r.low > r.high) {
            return Err(ScanError::Configuration(format!(
                "ban_sic_ranges entry [{}, {}] is inverted",
                range.low, range.high
            )));
        }
        self.time_zone()?;
        Ok(())
    }

    pub fn time_zone(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone).map_err(|e| {
            ScanError::Configuration(format!("unknown timezone {:?}: {e}", self.timezone))
        })
    }

    pub fn calendar(&self) -> TradingCalendar {
        TradingCalendar::new(self.holidays.iter().copied())
    }

    pub fn ban_rule(&self) -> BanRule {
        BanRule::new(self.ban_sic_ranges.iter().copied(), &self.ban_keywords)
    }

    /// `request_rate` as a duration.
    ///
    /// # Errors
    ///
    /// `ScanError::Configuration` when the value is negative, not finite, or too large
    /// for a `Duration`.
    pub fn request_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.request_rate).map_err(|e| {
            ScanError::Configuration(format!(
                "request_rate {} is out of range: {e}",
                self.request_rate
            ))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }
}
