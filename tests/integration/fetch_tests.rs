//! Integration tests for the HTTP fetch engine on its own

use crate::{html_source, test_config};
use promo_harvest::crawler::{build_http_client, HttpFetcher, PageFetcher};
use promo_harvest::{FetchError, Request};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(start: &str, backoff_base_ms: u64) -> HttpFetcher {
    let mut config = test_config(Path::new("unused.db"), &html_source("shop", start));
    config.fetch.backoff_base_ms = backoff_base_ms;
    let client = build_http_client(&config.fetch).unwrap();
    HttpFetcher::new(client, &config.sources[0], &config.fetch).unwrap()
}

#[tokio::test]
async fn test_retry_never_sleeps_past_deadline() {
    // Bind a server to get a free port, then shut it down
    let address = {
        let mock_server = MockServer::start().await;
        mock_server.uri()
    };
    let start = format!("{}/promos", address);
    let mut fetcher = fetcher(&start, 500);

    let request = Request::first(Url::parse(&start).unwrap());
    let began = Instant::now();
    let result = fetcher
        .fetch(&request, began + Duration::from_millis(200))
        .await;

    assert_eq!(result.unwrap_err(), FetchError::DeadlineExceeded);
    assert!(began.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn test_attempt_timeout_is_clamped_to_deadline() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let mut fetcher = fetcher(&start, 10);

    let request = Request::first(Url::parse(&start).unwrap());
    let began = Instant::now();
    let result = fetcher
        .fetch(&request, began + Duration::from_millis(300))
        .await;

    assert_eq!(result.unwrap_err(), FetchError::DeadlineExceeded);
    assert!(began.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_challenge_marker_on_success_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Just a moment...</title></head>
<body><div id="cf-challenge-running"></div></body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let mut fetcher = fetcher(&start, 10);

    let request = Request::first(Url::parse(&start).unwrap());
    let result = fetcher
        .fetch(&request, Instant::now() + Duration::from_secs(5))
        .await;

    assert!(matches!(
        result.unwrap_err(),
        FetchError::Challenge { status: 200, .. }
    ));
}
