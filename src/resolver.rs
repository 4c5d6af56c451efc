//! Acceptance-time resolution.
//!
//! An index lists a filing under the day it was disseminated, which is not the instant
//! it was accepted. The header's `ACCEPTANCE-DATETIME` is authoritative, so every
//! candidate's header is fetched and its instant checked against the window.

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;

use super::artifacts::FilingRecord;
use super::calendar::ScanWindow;
use super::client::SecClient;
use super::enrichment::Enrichment;
use super::error::{Result, ScanError};
use super::index::IndexEntry;
use super::parsing::header::FilingHeader;
use super::traits::HeaderSource;

/// `{archives}/data/{cik}/{accession without dashes}/{accession}.hdr.sgml`
pub fn header_url(archives_url: &str, cik: u64, accession: &str) -> String {
    format!(
        "{}/data/{}/{}/{}.hdr.sgml",
        archives_url.trim_end_matches('/'),
        cik,
        accession.replace('-', ""),
        accession
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Admitted(FilingDraft),
    /// Accepted at the given instant, which lies outside the window.
    OutsideWindow(DateTime<Tz>),
}

/// An admitted filing waiting for enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct FilingDraft {
    pub entry: IndexEntry,
    pub header: FilingHeader,
    /// Acceptance instant in the window's zone.
    pub accepted: DateTime<Tz>,
}

impl FilingDraft {
    /// The issuer the record describes, and the key it is enriched under.
    ///
    /// The index lists an ownership form once per party, so the entry that survived
    /// deduplication may be the insider's. The header's subject company overrides it.
    pub fn cik(&self) -> u64 {
        self.header
            .subject
            .as_ref()
            .map_or(self.entry.cik, |subject| subject.cik)
    }

    /// Completes the record. Profile data wins; the header's SIC and industry fill gaps.
    pub fn into_record(self, enrichment: &Enrichment) -> FilingRecord {
        let cik = self.cik();
        let FilingDraft {
            entry,
            header,
            accepted,
        } = self;
        let company_name = header
            .subject
            .and_then(|subject| subject.name)
            .unwrap_or(entry.company_name);

        FilingRecord {
            cik,
            company_name,
            ticker: enrichment.ticker.clone(),
            industry: enrichment.industry.clone().or(header.industry),
            sic_code: enrichment.sic_code.or(header.sic_code),
            form_type: entry.form_type,
            accepted_instant: accepted.fixed_offset(),
            accession_ref: entry.accession_ref,
            index_date: entry.index_date,
            raw_header_fields: header.fields,
        }
    }
}

pub struct AcceptanceResolver<'a, S: HeaderSource + ?Sized> {
    source: &'a S,
    window: &'a ScanWindow,
}

impl<'a, S: HeaderSource + ?Sized> AcceptanceResolver<'a, S> {
    pub fn new(source: &'a S, window: &'a ScanWindow) -> Self {
        Self { source, window }
    }

    /// Fetches and parses the header of `entry` and checks its acceptance instant.
    ///
    /// # Errors
    ///
    /// Fetch errors from the source, and `ScanError::HeaderParse` for a header without a
    /// usable acceptance instant or one naming a different accession number.
    pub async fn resolve(&self, entry: &IndexEntry) -> Result<Resolution> {
        let text = self
            .source
            .filing_header(entry.cik, &entry.accession_ref)
            .await?;
        let header = FilingHeader::parse(&text)?;

        if let Some(accession) = header
            .accession_number
            .as_ref()
            .filter(|a| **a != entry.accession_ref)
        {
            return Err(ScanError::HeaderParse(format!(
                "header for {} names accession {}",
                entry.accession_ref, accession
            )));
        }

        let accepted = header.accepted_at(self.window.time_zone())?;
        if !self.window.contains(&accepted) {
            return Ok(Resolution::OutsideWindow(accepted));
        }

        Ok(Resolution::Admitted(FilingDraft {
            entry: entry.clone(),
            header,
            accepted,
        }))
    }
}

#[async_trait]
impl HeaderSource for SecClient {
    async fn filing_header(&self, cik: u64, accession: &str) -> Result<String> {
        let url = header_url(&self.archives_url, cik, accession);
        tracing::debug!(%url, "fetching filing header");
        self.fetch_text(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::America::New_York;
    use std::collections::HashMap;

    struct FakeHeaders(HashMap<String, String>);

    #[async_trait]
    impl HeaderSource for FakeHeaders {
        async fn filing_header(&self, _cik: u64, accession: &str) -> Result<String> {
            self.0.get(accession).cloned().ok_or(ScanError::PermanentRequest {
                url: accession.to_string(),
                status: 404,
            })
        }
    }

    fn entry(accession: &str) -> IndexEntry {
        IndexEntry {
            cik: 320193,
            company_name: "Apple Inc.".into(),
            form_type: "8-K".into(),
            index_date: NaiveDate::from_ymd_opt(2025, 9, 8).unwrap(),
            date_filed: "20250908".into(),
            accession_ref: accession.into(),
            filename: format!("edgar/data/320193/{accession}.txt"),
        }
    }

    fn header(accepted: &str) -> String {
        format!("<SEC-HEADER>\n<ACCEPTANCE-DATETIME>{accepted}\n<ASSIGNED-SIC>3571\n</SEC-HEADER>\n")
    }

    fn window() -> ScanWindow {
        ScanWindow::for_trading_day(NaiveDate::from_ymd_opt(2025, 9, 8).unwrap(), New_York)
            .unwrap()
    }

    #[test]
    fn builds_header_url() {
        assert_eq!(
            header_url("https://www.sec.gov/Archives/edgar", 1000045, "0000950170-23-002704"),
            "https://www.sec.gov/Archives/edgar/data/1000045/000095017023002704/0000950170-23-002704.hdr.sgml"
        );
    }

    #[tokio::test]
    async fn boundaries_are_half_open() {
        let source = FakeHeaders(HashMap::from([
            ("0000000001-25-000001".to_string(), header("20250908093000")),
            ("0000000002-25-000001".to_string(), header("20250909085959")),
            ("0000000003-25-000001".to_string(), header("20250909090000")),
            ("0000000004-25-000001".to_string(), header("20250908092959")),
        ]));
        let window = window();
        let resolver = AcceptanceResolver::new(&source, &window);

        let admitted = |r: Resolution| matches!(r, Resolution::Admitted(_));
        assert!(admitted(resolver.resolve(&entry("0000000001-25-000001")).await.unwrap()));
        assert!(admitted(resolver.resolve(&entry("0000000002-25-000001")).await.unwrap()));
        assert!(!admitted(resolver.resolve(&entry("0000000003-25-000001")).await.unwrap()));
        assert!(!admitted(resolver.resolve(&entry("0000000004-25-000001")).await.unwrap()));
    }

    #[tokio::test]
    async fn malformed_header_is_an_error_not_a_record() {
        let source = FakeHeaders(HashMap::from([(
            "0000000001-25-000001".to_string(),
            "<SEC-HEADER>\n<TYPE>8-K\n</SEC-HEADER>\n".to_string(),
        )]));
        let window = window();
        let result = AcceptanceResolver::new(&source, &window)
            .resolve(&entry("0000000001-25-000001"))
            .await;
        assert!(matches!(result, Err(ScanError::HeaderParse(_))));
    }

    #[tokio::test]
    async fn mismatched_accession_is_rejected() {
        let source = FakeHeaders(HashMap::from([(
            "0000000001-25-000001".to_string(),
            "<ACCEPTANCE-DATETIME>20250908100000\n<ACCESSION-NUMBER>0000000009-25-000009\n"
                .to_string(),
        )]));
        let window = window();
        let result = AcceptanceResolver::new(&source, &window)
            .resolve(&entry("0000000001-25-000001"))
            .await;
        assert!(matches!(result, Err(ScanError::HeaderParse(_))));
    }

    #[tokio::test]
    async fn header_sic_fills_missing_enrichment() {
        let source = FakeHeaders(HashMap::from([(
            "0000000001-25-000001".to_string(),
            header("20250908100000"),
        )]));
        let window = window();
        let Resolution::Admitted(draft) = AcceptanceResolver::new(&source, &window)
            .resolve(&entry("0000000001-25-000001"))
            .await
            .unwrap()
        else {
            panic!("expected admission");
        };

        assert_eq!(draft.cik(), 320193);
        let record = draft.into_record(&Enrichment::unresolved());
        assert_eq!(record.sic_code, Some(3571));
        assert_eq!(record.ticker, None);
        assert_eq!(record.accepted_instant.to_rfc3339(), "2025-09-08T10:00:00-04:00");
        assert_eq!(
            record.raw_header_fields.get("ACCEPTANCE-DATETIME").map(String::as_str),
            Some("20250908100000")
        );
    }

    #[tokio::test]
    async fn ownership_form_is_recorded_under_its_issuer() {
        let accession = "0000320193-25-000072";
        let source = FakeHeaders(HashMap::from([(
            accession.to_string(),
            "<SEC-HEADER>\n<ACCEPTANCE-DATETIME>20250908163045\n<TYPE>4\n\
             <REPORTING-OWNER>\n<OWNER-DATA>\n<CONFORMED-NAME>Example Director\n\
             <CIK>0001214156\n</OWNER-DATA>\n</REPORTING-OWNER>\n\
             <ISSUER>\n<COMPANY-DATA>\n<CONFORMED-NAME>Apple Inc.\n<CIK>0000320193\n\
             <ASSIGNED-SIC>3571\n</COMPANY-DATA>\n</ISSUER>\n</SEC-HEADER>\n"
                .to_string(),
        )]));
        let owner_entry = IndexEntry {
            cik: 1214156,
            company_name: "Example Director".into(),
            form_type: "4".into(),
            ..entry(accession)
        };
        let window = window();

        let Resolution::Admitted(draft) = AcceptanceResolver::new(&source, &window)
            .resolve(&owner_entry)
            .await
            .unwrap()
        else {
            panic!("expected admission");
        };

        assert_eq!(draft.cik(), 320193);
        let record = draft.into_record(&Enrichment {
            ticker: Some("AAPL".into()),
            resolved: true,
            ..Enrichment::default()
        });
        assert_eq!(record.cik, 320193);
        assert_eq!(record.company_name, "Apple Inc.");
        assert_eq!(record.ticker.as_deref(), Some("AAPL"));
        assert_eq!(record.sic_code, Some(3571));
        assert_eq!(record.form_type, "4");
    }
}
