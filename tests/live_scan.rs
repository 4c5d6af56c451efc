use chrono::NaiveDate;
use chrono_tz::America::New_York;
use edgarsnap::{
    FormTypeFilter, HeaderSource, IndexSource, ProfileSource, RunStats, ScanConfig, ScanWindow,
    SecClient, index,
};

fn client() -> SecClient {
    SecClient::new(&ScanConfig::new("test_agent example@example.com")).unwrap()
}

#[tokio::test]
#[ignore]
async fn get_daily_master_index() {
    let content = client()
        .daily_index(NaiveDate::from_ymd_opt(2025, 9, 8).unwrap())
        .await
        .unwrap();
    assert!(content.contains("CIK|Company Name|Form Type|Date Filed|File Name"));
}

#[tokio::test]
#[ignore]
async fn read_window_and_resolve_one_header() {
    let client = client();
    let window =
        ScanWindow::for_trading_day(NaiveDate::from_ymd_opt(2025, 9, 8).unwrap(), New_York)
            .unwrap();
    let mut stats = RunStats::new(chrono::Utc::now(), "America/New_York");

    let entries = index::read_window(
        &client,
        &window,
        &FormTypeFilter::new(edgarsnap::DEFAULT_FORM_TYPES),
        &mut stats,
    )
    .await
    .unwrap();
    assert!(!entries.is_empty());

    let entry = &entries[0];
    let header = client
        .filing_header(entry.cik, &entry.accession_ref)
        .await
        .unwrap();
    assert!(header.contains("ACCEPTANCE-DATETIME"));
}

#[tokio::test]
#[ignore]
async fn get_issuer_profile() {
    let profile = client().issuer_profile(320193).await.unwrap();
    assert_eq!(profile.tickers.first().map(String::as_str), Some("AAPL"));
    assert_eq!(profile.sic, Some(3571));
}
