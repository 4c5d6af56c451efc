#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use edgarsnap::{ScanConfig, SicRange};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn fixture_path(relative: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn read_fixture(relative: impl AsRef<Path>) -> String {
    fs::read_to_string(fixture_path(relative)).expect("fixture file should be readable")
}

pub const TICKERS_PATH: &str = "/files/company_tickers.json";

/// Tuesday 2025-09-09 12:00 in New York; the window is Monday 09:30 to Tuesday 09:00.
pub fn tuesday_noon() -> DateTime<Utc> {
    New_York
        .with_ymd_and_hms(2025, 9, 9, 12, 0, 0)
        .unwrap()
        .with_timezone(&Utc)
}

/// A configuration pointed at `server` with fast pacing and the default ban policy.
pub fn config(server: &MockServer, output_dir: &Path) -> ScanConfig {
    let mut config = ScanConfig::new("edgarsnap-tests ops@example.com");
    config.urls.archives = format!("{}/Archives/edgar", server.uri());
    config.urls.data = server.uri();
    config.urls.tickers = format!("{}{TICKERS_PATH}", server.uri());
    config.request_rate = 0.001;
    config.max_retries = 2;
    config.request_timeout_secs = 5;
    config.run_budget_secs = 60;
    config.output_dir = output_dir.to_path_buf();
    config.ban_sic_ranges = vec![SicRange::new(6000, 6999)];
    config.ban_keywords = vec!["casino".into(), "tobacco".into()];
    config
}

pub fn index_path(day: &str) -> String {
    let quarter = match &day[4..6] {
        "01" | "02" | "03" => 1,
        "04" | "05" | "06" => 2,
        "07" | "08" | "09" => 3,
        _ => 4,
    };
    format!("/Archives/edgar/daily-index/{}/QTR{quarter}/master.{day}.idx", &day[..4])
}

pub fn header_path(cik: u64, accession: &str) -> String {
    format!(
        "/Archives/edgar/data/{cik}/{}/{accession}.hdr.sgml",
        accession.replace('-', "")
    )
}

pub fn submissions_path(cik: u64) -> String {
    format!("/submissions/CIK{cik:010}.json")
}

pub async fn mount_body(server: &MockServer, at: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.into()))
        .mount(server)
        .await;
}

pub async fn mount_index(server: &MockServer, day: &str) {
    mount_body(
        server,
        &index_path(day),
        read_fixture(format!("index/master.{day}.idx")),
    )
    .await;
}

pub async fn mount_header(server: &MockServer, cik: u64, accession: &str) {
    mount_body(
        server,
        &header_path(cik, accession),
        read_fixture(format!("headers/{accession}.hdr.sgml")),
    )
    .await;
}

/// Builds a master index from `CIK|Company|Form|Date|Filename` lines.
pub fn master_index(lines: &[&str]) -> String {
    format!(
        "Description:           Daily Index of EDGAR Dissemination Feed by Company Name\n\n\
         CIK|Company Name|Form Type|Date Filed|File Name\n\
         --------------------------------------------------------------------------------\n{}\n",
        lines.join("\n")
    )
}

pub fn sgml_header(accession: &str, form: &str, accepted: &str) -> String {
    format!(
        "<SEC-HEADER>{accession}.hdr.sgml : {date}\n\
         <ACCEPTANCE-DATETIME>{accepted}\n\
         <ACCESSION-NUMBER>{accession}\n\
         <TYPE>{form}\n\
         </SEC-HEADER>\n",
        date = &accepted[..8]
    )
}
