//! Issuer metadata, looked up at most once per CIK per run.
//!
//! Many filings in one window share an issuer (a Form 4 batch, an 8-K with its exhibits'
//! amendments), and header workers run concurrently. Each CIK gets one [`OnceCell`]; the
//! first worker to reach it performs the lookup and every other worker awaits that result.
//! A failed lookup is cached too, as an unresolved [`Enrichment`], so it is not retried
//! within the run.
//!
//! When a submissions document lists no ticker, the SEC's `company_tickers.json` table is
//! consulted. It is fetched on first need and kept for the rest of the run.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use super::client::SecClient;
use super::error::Result;
use super::parsing::utils::{
    deserialize_non_blank, deserialize_optional_code, deserialize_str_to_u64,
};
use super::traits::ProfileSource;

/// CIK to primary ticker.
pub type TickerMap = HashMap<u64, String>;

/// `{data}/submissions/CIK{cik:010}.json`
pub fn submissions_url(data_url: &str, cik: u64) -> String {
    format!(
        "{}/submissions/CIK{:010}.json",
        data_url.trim_end_matches('/'),
        cik
    )
}

/// The parts of an EDGAR submissions document the scanner uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerProfile {
    #[serde(default, deserialize_with = "deserialize_str_to_u64")]
    pub cik: u64,
    #[serde(default, deserialize_with = "deserialize_non_blank")]
    pub name: Option<String>,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_code")]
    pub sic: Option<u32>,
    #[serde(
        default,
        rename = "sicDescription",
        deserialize_with = "deserialize_non_blank"
    )]
    pub sic_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TickerRow {
    #[serde(deserialize_with = "deserialize_str_to_u64")]
    cik_str: u64,
    #[serde(default)]
    ticker: String,
}

/// `company_tickers.json`: an object of rows keyed by rank (`"0"`, `"1"`, ...).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CompanyTickers(HashMap<String, TickerRow>);

impl CompanyTickers {
    /// Collapses the table to one ticker per CIK. A CIK with several share classes keeps
    /// its best-ranked ticker.
    pub fn into_map(self) -> TickerMap {
        let ranked: BTreeMap<u64, TickerRow> = self
            .0
            .into_iter()
            .filter_map(|(rank, row)| Some((rank.trim().parse().ok()?, row)))
            .collect();

        let mut map = TickerMap::new();
        for row in ranked.into_values() {
            let ticker = row.ticker.trim();
            if !ticker.is_empty() {
                map.entry(row.cik_str).or_insert_with(|| ticker.to_string());
            }
        }
        map
    }
}

/// Cached metadata for one issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub ticker: Option<String>,
    pub sic_code: Option<u32>,
    pub industry: Option<String>,
    /// False when the profile lookup failed; only `ticker` may then be set, from the
    /// ticker table.
    pub resolved: bool,
}

impl Enrichment {
    pub fn unresolved() -> Self {
        Self::default()
    }
}

impl From<IssuerProfile> for Enrichment {
    fn from(profile: IssuerProfile) -> Self {
        Self {
            ticker: profile
                .tickers
                .into_iter()
                .map(|t| t.trim().to_string())
                .find(|t| !t.is_empty()),
            sic_code: profile.sic,
            industry: profile.sic_description,
            resolved: true,
        }
    }
}

/// Per-run memo of issuer lookups.
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    entries: Mutex<HashMap<u64, Arc<OnceCell<Enrichment>>>>,
    tickers: OnceCell<TickerMap>,
    lookups: AtomicU64,
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the enrichment for `cik`, looking it up through `source` on first use.
    ///
    /// Never fails: a lookup error is logged and yields [`Enrichment::unresolved`], with
    /// the ticker still taken from the ticker table when it lists `cik`.
    pub async fn enrich<P: ProfileSource + ?Sized>(&self, source: &P, cik: u64) -> Enrichment {
        let cell = {
            let mut entries = self.entries.lock().await;
            Arc::clone(entries.entry(cik).or_default())
        };

        cell.get_or_init(|| async {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            let mut enrichment = match source.issuer_profile(cik).await {
                Ok(profile) => Enrichment::from(profile),
                Err(e) => {
                    tracing::warn!(cik, error = %e, "issuer lookup failed; continuing without it");
                    Enrichment::unresolved()
                }
            };
            if enrichment.ticker.is_none() {
                enrichment.ticker = self.ticker_map(source).await.get(&cik).cloned();
            }
            enrichment
        })
        .await
        .clone()
    }

    /// Lookups performed, one per distinct CIK at most.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    async fn ticker_map<P: ProfileSource + ?Sized>(&self, source: &P) -> &TickerMap {
        self.tickers
            .get_or_init(|| async {
                match source.ticker_map().await {
                    Ok(map) => {
                        tracing::debug!(tickers = map.len(), "loaded ticker table");
                        map
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "ticker table unavailable; continuing without it");
                        TickerMap::new()
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl ProfileSource for SecClient {
    async fn issuer_profile(&self, cik: u64) -> Result<IssuerProfile> {
        let url = submissions_url(&self.data_url, cik);
        tracing::debug!(%url, "fetching issuer profile");
        self.fetch_json(&url).await
    }

    async fn ticker_map(&self) -> Result<TickerMap> {
        tracing::debug!(url = %self.tickers_url, "fetching ticker table");
        let table: CompanyTickers = self.fetch_json(&self.tickers_url).await?;
        Ok(table.into_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use futures_util::future::join_all;
    use std::time::Duration;

    struct SlowProfiles {
        calls: AtomicU64,
        ticker_loads: AtomicU64,
    }

    impl SlowProfiles {
        fn new() -> Self {
            Self {
                calls: AtomicU64::new(0),
                ticker_loads: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileSource for SlowProfiles {
        async fn issuer_profile(&self, cik: u64) -> Result<IssuerProfile> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            match cik {
                404 | 405 => Err(ScanError::PermanentRequest {
                    url: submissions_url("https://data.sec.gov", cik),
                    status: 404,
                }),
                1214156 => Ok(IssuerProfile {
                    cik,
                    name: Some("Example Director".into()),
                    ..IssuerProfile::default()
                }),
                _ => Ok(IssuerProfile {
                    cik,
                    name: Some("Apple Inc.".into()),
                    tickers: vec!["AAPL".into()],
                    sic: Some(3571),
                    sic_description: Some("Electronic Computers".into()),
                }),
            }
        }

        async fn ticker_map(&self) -> Result<TickerMap> {
            self.ticker_loads.fetch_add(1, Ordering::SeqCst);
            Ok(TickerMap::from([(405, "LUCK".to_string())]))
        }
    }

    #[test]
    fn builds_submissions_url() {
        assert_eq!(
            submissions_url("https://data.sec.gov", 320193),
            "https://data.sec.gov/submissions/CIK0000320193.json"
        );
    }

    #[test]
    fn parses_submissions_document() {
        let json = r#"{
            "cik": "320193",
            "entityType": "operating",
            "sic": "3571",
            "sicDescription": "Electronic Computers",
            "name": "Apple Inc.",
            "tickers": ["AAPL"],
            "exchanges": ["Nasdaq"],
            "filings": {"recent": {}}
        }"#;
        let profile: IssuerProfile = serde_json::from_str(json).unwrap();
        let enrichment = Enrichment::from(profile);

        assert_eq!(enrichment.ticker.as_deref(), Some("AAPL"));
        assert_eq!(enrichment.sic_code, Some(3571));
        assert_eq!(enrichment.industry.as_deref(), Some("Electronic Computers"));
        assert!(enrichment.resolved);
    }

    #[test]
    fn sparse_submissions_document() {
        let profile: IssuerProfile =
            serde_json::from_str(r#"{"cik": "1", "sic": "", "sicDescription": "", "tickers": []}"#)
                .unwrap();
        let enrichment = Enrichment::from(profile);
        assert_eq!(enrichment, Enrichment { resolved: true, ..Enrichment::default() });
    }

    #[tokio::test]
    async fn concurrent_lookups_for_one_cik_happen_once() {
        let source = SlowProfiles::new();
        let cache = EnrichmentCache::new();

        let results = join_all((0..8).map(|_| cache.enrich(&source, 320193))).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.lookups(), 1);
        assert!(results.iter().all(|e| e.ticker.as_deref() == Some("AAPL")));
    }

    #[tokio::test]
    async fn failures_are_cached_as_partial() {
        let source = SlowProfiles::new();
        let cache = EnrichmentCache::new();

        let first = cache.enrich(&source, 404).await;
        let second = cache.enrich(&source, 404).await;

        assert!(!first.resolved);
        assert_eq!(first, second);
        assert_eq!(first.ticker, None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ticker_table_fills_missing_tickers_and_loads_once() {
        let source = SlowProfiles::new();
        let cache = EnrichmentCache::new();

        let apple = cache.enrich(&source, 320193).await;
        assert_eq!(apple.ticker.as_deref(), Some("AAPL"));
        assert_eq!(source.ticker_loads.load(Ordering::SeqCst), 0);

        let failed = cache.enrich(&source, 405).await;
        assert!(!failed.resolved);
        assert_eq!(failed.ticker.as_deref(), Some("LUCK"));

        let owner = cache.enrich(&source, 1214156).await;
        assert!(owner.resolved);
        assert_eq!(owner.ticker, None);

        assert_eq!(source.ticker_loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.lookups(), 3);
    }

    #[test]
    fn company_tickers_keep_best_ranked_share_class() {
        let json = r#"{
            "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
            "10": {"cik_str": 1652044, "ticker": "GOOG", "title": "Alphabet Inc."},
            "2": {"cik_str": 1652044, "ticker": "GOOGL", "title": "Alphabet Inc."},
            "3": {"cik_str": "70858", "ticker": " ", "title": "BANK OF AMERICA CORP"}
        }"#;
        let map = serde_json::from_str::<CompanyTickers>(json).unwrap().into_map();

        assert_eq!(map.get(&320193).map(String::as_str), Some("AAPL"));
        assert_eq!(map.get(&1652044).map(String::as_str), Some("GOOGL"));
        assert!(!map.contains_key(&70858));
    }
}
