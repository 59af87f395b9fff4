//! Kraken Futures 클라이언트 HTTP 테스트 (mockito).

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use mockito::{Matcher, Server};
use pnl_core::SnapshotEndpoint;
use pnl_exchange::{
    fetch_live_snapshot, ExchangeError, KrakenFuturesClient, KrakenFuturesConfig, NonceSource,
    RetryConfig, SnapshotRequest,
};
use secrecy::SecretString;

const API_KEY: &str = "public-key";
const SECRET: &str = "cG5sLWxlZGdlci10ZXN0LXNlY3JldC1rZXktMDEyMzQ1Njc4OWFiY2RlZg==";
const FIXED_NONCE: u64 = 1_700_000_000_000;

fn client(server: &Server, max_retries: u32) -> KrakenFuturesClient {
    let config = KrakenFuturesConfig::new(API_KEY, SecretString::from(SECRET))
        .with_base_url(server.url())
        .with_timeout(Duration::from_secs(5));

    KrakenFuturesClient::new(config)
        .unwrap()
        .with_nonce_source(NonceSource::with_clock(Arc::new(|| FIXED_NONCE)))
        .with_retry_config(RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(10),
            add_jitter: false,
            ..Default::default()
        })
}

#[tokio::test]
async fn open_positions_request_is_signed() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/derivatives/api/v3/openpositions")
        .match_header("APIKey", API_KEY)
        .match_header("Nonce", "1700000000000")
        .match_header(
            "Authent",
            "QfvoBhyLUfWr6EZcxwwVP6obapjJCSkkPiEdcL4nUoYQlDZOUQHJFbCu4GwmVyDlrgEGF7/maDKyWz6HJ06kRg==",
        )
        .match_header("Accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"result":"success","openPositions":[
                {"side":"long","symbol":"PF_XBTUSD","price":64000.5,"size":0.01},
                {"side":"short","symbol":"PF_ETHUSD","price":3500.0,"size":1}
            ],"serverTime":"2024-03-05T14:22:01.000Z"}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let positions = client(&server, 0).fetch_open_positions().await.unwrap();

    mock.assert_async().await;
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0]["symbol"], "PF_XBTUSD");
}

#[tokio::test]
async fn fills_query_is_part_of_signature() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/derivatives/api/v3/fills")
        .match_query(Matcher::UrlEncoded(
            "lastFillTime".into(),
            "2024-01-01T00:00:00.000Z".into(),
        ))
        .match_header(
            "Authent",
            "m9lrFQcdPWzXZ+1wQ5FvNu3UTdDIJLNLZiO0WeUPgQEnkVxuwwmeAZoWFSNBZ56YD3sS4B46S89BVsRPwfBFhw==",
        )
        .with_status(200)
        .with_body(r#"{"result":"success","fills":[{"fill_id":"f-1","symbol":"PF_XBTUSD"}]}"#)
        .create_async()
        .await;

    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let fills = client(&server, 0).fetch_fills(Some(since)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(fills.len(), 1);
}

#[tokio::test]
async fn accounts_payload_is_a_mapping() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/derivatives/api/v3/accounts")
        .with_status(200)
        .with_body(
            r#"{"result":"success","accounts":{
                "flex":{"type":"multiCollateralMarginAccount"},
                "cash":{"type":"cashAccount","balances":{"usd":100}}
            }}"#,
        )
        .create_async()
        .await;

    let accounts = client(&server, 0).fetch_accounts().await.unwrap();

    assert_eq!(accounts.keys().collect::<Vec<_>>(), ["flex", "cash"]);
}

#[tokio::test]
async fn error_result_is_rejected_without_retry() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/derivatives/api/v3/openpositions")
        .with_status(200)
        .with_body(r#"{"result":"error","error":"apiLimitExceeded"}"#)
        .expect(1)
        .create_async()
        .await;

    let result = client(&server, 3).fetch_open_positions().await;

    mock.assert_async().await;
    assert!(matches!(result, Err(ExchangeError::Rejected(reason)) if reason == "apiLimitExceeded"));
}

#[tokio::test]
async fn server_error_is_retried_with_fresh_nonce() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("GET", "/derivatives/api/v3/openpositions")
        .match_header("Nonce", "1700000000000")
        .with_status(503)
        .with_body("maintenance")
        .expect(1)
        .create_async()
        .await;
    let recovered = server
        .mock("GET", "/derivatives/api/v3/openpositions")
        .match_header("Nonce", "1700000000001")
        .match_header(
            "Authent",
            "kv4rgvS/M6JUDIBm3F7VRAVa6B8EKXRqoGZB+5E/cB69ajaK4BaJpa1qzRwHiUsTWzFK7hKHeQahDhs/UqO8aA==",
        )
        .with_status(200)
        .with_body(r#"{"result":"success","openPositions":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let positions = client(&server, 2).fetch_open_positions().await.unwrap();

    failing.assert_async().await;
    recovered.assert_async().await;
    assert!(positions.is_empty());
}

#[tokio::test]
async fn unauthorized_is_fatal() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/derivatives/api/v3/accounts")
        .with_status(401)
        .with_body(r#"{"result":"error","error":"authenticationError"}"#)
        .expect(1)
        .create_async()
        .await;

    let result = client(&server, 3).fetch_accounts().await;

    mock.assert_async().await;
    assert!(matches!(result, Err(ExchangeError::HttpStatus { status: 401, .. })));
}

#[tokio::test]
async fn missing_payload_key_is_reported() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/derivatives/api/v3/openpositions")
        .with_status(200)
        .with_body(r#"{"result":"success"}"#)
        .create_async()
        .await;

    let result = client(&server, 0).fetch_open_positions().await;

    assert!(matches!(result, Err(ExchangeError::MissingPayload(key)) if key == "openPositions"));
}

#[tokio::test]
async fn snapshot_folds_endpoint_failures_into_warnings() {
    let mut server = Server::new_async().await;
    let positions = server
        .mock("GET", "/derivatives/api/v3/openpositions")
        .match_header("APIKey", API_KEY)
        .with_status(200)
        .with_body(r#"{"result":"success","openPositions":[{"symbol":"PF_XBTUSD"}]}"#)
        .create_async()
        .await;
    let accounts = server
        .mock("GET", "/derivatives/api/v3/accounts")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;
    let fills = server
        .mock("GET", "/derivatives/api/v3/fills")
        .expect(0)
        .create_async()
        .await;

    let request = SnapshotRequest::default().with_fills(false);
    let snapshot = fetch_live_snapshot(&client(&server, 0), &request).await;

    positions.assert_async().await;
    accounts.assert_async().await;
    fills.assert_async().await;

    assert!(snapshot.fetched_at.is_some());
    assert_eq!(snapshot.open_positions.as_ref().map(Vec::len), Some(1));
    assert!(snapshot.accounts.is_none());
    assert!(snapshot.fills.is_none());
    assert_eq!(snapshot.warnings.len(), 1);
    assert_eq!(snapshot.warnings[0].endpoint, SnapshotEndpoint::Accounts);
    assert!(snapshot.warnings[0].message.contains("500"));
}

#[tokio::test]
async fn snapshot_passes_last_fill_time_to_fills() {
    let mut server = Server::new_async().await;
    let fills = server
        .mock("GET", "/derivatives/api/v3/fills")
        .match_query(Matcher::UrlEncoded(
            "lastFillTime".into(),
            "2024-01-01T00:00:00.000Z".into(),
        ))
        .match_header(
            "Authent",
            "m9lrFQcdPWzXZ+1wQ5FvNu3UTdDIJLNLZiO0WeUPgQEnkVxuwwmeAZoWFSNBZ56YD3sS4B46S89BVsRPwfBFhw==",
        )
        .with_status(200)
        .with_body(r#"{"result":"success","fills":[{"fill_id":"f-1"},{"fill_id":"f-2"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let request = SnapshotRequest {
        open_positions: false,
        accounts: false,
        ..Default::default()
    }
    .with_last_fill_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let snapshot = fetch_live_snapshot(&client(&server, 0), &request).await;

    fills.assert_async().await;
    assert_eq!(snapshot.fills.as_ref().map(Vec::len), Some(2));
    assert!(snapshot.open_positions.is_none());
    assert!(snapshot.warnings.is_empty());
}
