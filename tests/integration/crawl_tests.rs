//! Integration tests for the crawl pipeline
//!
//! These tests use wiremock to stand in for the listing sites and run the
//! full fetch, paginate, normalize and load cycle against a temporary
//! database.

use crate::{card, html_source, listing, test_config};
use promo_harvest::crawler::run_pipeline;
use promo_harvest::output::JobReport;
use promo_harvest::storage::{open_storage, ProductQuery, Storage, StoragePool};
use promo_harvest::{Config, JobState, Price};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn harvest(config: Config) -> Vec<JobReport> {
    let pool = Arc::new(
        StoragePool::new(&config.storage.database_path, config.storage.pool_size).unwrap(),
    );
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    run_pipeline(Arc::new(config), pool, cancel_rx, "test-hash")
        .await
        .expect("pipeline should start")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_html_listing_two_pages() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    // Page 2 is mounted first so it wins over the unfiltered page 1 mock
    Mock::given(method("GET"))
        .and(path("/promos"))
        .and(query_param("page", "2"))
        .respond_with(html(listing(&[], Some("?page=1"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/promos"))
        .respond_with(html(listing(
            &[
                card("Café moulu", "Carte Noire", "250 g", &["3", ",20 €"], "12,80 €/kg"),
                card("Pâtes", "Panzani", "500 g", &["0", ",99 €"], "1,98 €/kg"),
                card("Lait demi-écrémé", "Lactel", "1 L", &["1", ",15 €"], "1,15 €/L"),
            ],
            Some("?page=2"),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let config = test_config(&db_path, &html_source("shop", &start));
    let reports = harvest(config).await;

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.state, JobState::Exhausted, "reason: {:?}", report.reason);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.records_extracted, 3);
    assert_eq!(report.records_committed, 3);
    assert!(report.persistence_failures.is_empty());

    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count_products().unwrap(), 3);

    let first = storage.get_product(1).unwrap().expect("first product");
    assert_eq!(first.name, "Café moulu");
    assert_eq!(first.brand.as_deref(), Some("Carte Noire"));
    assert_eq!(first.size.as_deref(), Some("250 g"));
    assert_eq!(first.price, Some(Price::from_cents(320)));
    assert_eq!(first.unit_price, Some(Price::from_cents(1280)));
    assert_eq!(first.unit_label.as_deref(), Some("kg"));
    assert_eq!(first.promo.as_deref(), Some("2 for 1"));

    let jobs = storage.recent_jobs(10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, "exhausted");
    assert_eq!(jobs[0].records_committed, 3);
    assert_eq!(jobs[0].config_hash, "test-hash");
}

#[tokio::test]
async fn test_broken_entries_are_skipped() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    let nameless = r#"<div class="card"><div class="price"><span>1,00 €</span></div></div>"#;
    Mock::given(method("GET"))
        .and(path("/promos"))
        .respond_with(html(listing(
            &[
                card("Beurre doux", "Président", "250 g", &["2,49 €"], "9,96 €/kg"),
                nameless.to_string(),
            ],
            None,
        )))
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let reports = harvest(test_config(&db_path, &html_source("shop", &start))).await;

    let report = &reports[0];
    assert_eq!(report.state, JobState::Exhausted);
    assert_eq!(report.extraction_rejects, 1);
    assert_eq!(report.records_committed, 1);
}

#[tokio::test]
async fn test_json_token_pagination() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    Mock::given(method("GET"))
        .and(path("/api/promotions"))
        .and(query_param("pageToken", "tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "products": [
                { "title": "Yaourt nature", "brand": "Danone", "price": 1.5 }
            ],
            "next": null
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/promotions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "products": {
                "p-17": { "title": "Jus d'orange", "brand": "Tropicana", "price": "2,95" },
                "p-18": { "title": "  ", "brand": "Nobody" },
                "p-19": { "title": "Chocolat noir", "price": 1.89, "unit": { "price": 18.9, "label": "kg" } }
            },
            "next": "tok-2"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sources = format!(
        r#"
[[source]]
name = "catalog"
start-url = "{}/api/promotions?store=12"

[source.json]
records = "/products"
name = "/title"
brand = "/brand"
price = "/price"
unit-price = "/unit/price"
unit-label = "/unit/label"
next-token = "/next"
"#,
        mock_server.uri()
    );
    let reports = harvest(test_config(&db_path, &sources)).await;

    let report = &reports[0];
    assert_eq!(report.state, JobState::Exhausted, "reason: {:?}", report.reason);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.records_extracted, 3);
    assert_eq!(report.extraction_rejects, 1);
    assert_eq!(report.records_committed, 3);

    let storage = open_storage(&db_path).unwrap();
    let page = storage.list_products(&ProductQuery::default()).unwrap();
    let names: Vec<&str> = page.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Chocolat noir", "Jus d'orange", "Yaourt nature"]);

    let chocolate = &page.records[0];
    assert_eq!(chocolate.price, Some(Price::from_cents(189)));
    assert_eq!(chocolate.unit_price, Some(Price::from_cents(1890)));
    assert_eq!(chocolate.unit_label.as_deref(), Some("kg"));
    assert_eq!(chocolate.brand, None);
}

#[tokio::test]
async fn test_challenge_page_fails_without_retry() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("<html><title>Just a moment...</title></html>"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let reports = harvest(test_config(&db_path, &html_source("shop", &start))).await;

    let report = &reports[0];
    assert_eq!(report.state, JobState::Failed);
    assert_eq!(report.pages_fetched, 0);
    let reason = report.reason.as_deref().unwrap();
    assert!(reason.contains("challenge"), "reason: {}", reason);
    assert!(reason.contains("just a moment"), "reason: {}", reason);
}

#[tokio::test]
async fn test_listing_with_recaptcha_widget_is_not_a_challenge() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    let page = listing(
        &[
            card("Huile d'olive", "Puget", "1 L", &["7,49 €"], "7,49 €/L"),
            card("Sel fin", "La Baleine", "1 kg", &["0,95 €"], "0,95 €/kg"),
        ],
        None,
    )
    .replace(
        "</body>",
        r#"<form class="newsletter"><div class="g-recaptcha"></div></form>
<script src="https://www.google.com/recaptcha/api.js"></script></body>"#,
    );
    Mock::given(method("GET"))
        .respond_with(html(page))
        .expect(1)
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let reports = harvest(test_config(&db_path, &html_source("shop", &start))).await;

    let report = &reports[0];
    assert_eq!(report.state, JobState::Exhausted, "reason: {:?}", report.reason);
    assert_eq!(report.records_committed, 2);
}

#[tokio::test]
async fn test_server_error_is_terminal() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let reports = harvest(test_config(&db_path, &html_source("shop", &start))).await;

    assert_eq!(reports[0].state, JobState::Failed);
    assert_eq!(reports[0].reason.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    // First answer arrives after the 1s request timeout
    Mock::given(method("GET"))
        .respond_with(
            html(listing(&[], None)).set_delay(std::time::Duration::from_millis(1500)),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(html(listing(
            &[card("Riz basmati", "Taureau Ailé", "1 kg", &["2,10 €"], "2,10 €/kg")],
            None,
        )))
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let reports = harvest(test_config(&db_path, &html_source("shop", &start))).await;

    let report = &reports[0];
    assert_eq!(report.state, JobState::Exhausted, "reason: {:?}", report.reason);
    assert_eq!(report.records_committed, 1);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_unreachable_source_gives_up_after_retries() {
    // Bind a server to get a free port, then shut it down
    let address = {
        let mock_server = MockServer::start().await;
        mock_server.uri()
    };
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    let start = format!("{}/promos", address);
    let reports = harvest(test_config(&db_path, &html_source("shop", &start))).await;

    let report = &reports[0];
    assert_eq!(report.state, JobState::Failed);
    let reason = report.reason.as_deref().unwrap();
    assert!(reason.contains("after 3 attempt(s)"), "reason: {}", reason);
}

#[tokio::test]
async fn test_failing_source_does_not_affect_others() {
    let good = MockServer::start().await;
    let bad = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    Mock::given(method("GET"))
        .respond_with(html(listing(
            &[card("Farine T55", "Francine", "1 kg", &["0,89 €"], "0,89 €/kg")],
            None,
        )))
        .mount(&good)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&bad)
        .await;

    let sources = format!(
        "{}\n{}",
        html_source("alpha", &format!("{}/promos", bad.uri())),
        html_source("beta", &format!("{}/promos", good.uri()))
    );
    let reports = harvest(test_config(&db_path, &sources)).await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].source, "alpha");
    assert_eq!(reports[0].state, JobState::Failed);
    assert_eq!(reports[1].source, "beta");
    assert_eq!(reports[1].state, JobState::Exhausted);
    assert_eq!(reports[1].records_committed, 1);
}

#[tokio::test]
async fn test_page_ceiling_stops_endless_listing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");

    // Every page links to the next one
    for page in 1..=5u32 {
        let next = format!("?page={}", page + 1);
        let mut mock = Mock::given(method("GET")).and(path("/promos"));
        if page > 1 {
            mock = mock.and(query_param("page", page.to_string().as_str()));
        }
        mock.respond_with(html(listing(
            &[card(&format!("Produit {}", page), "Marque", "1 u", &["1,00 €"], "")],
            Some(&next),
        )))
        .with_priority(if page == 1 { 10 } else { 1 })
        .mount(&mock_server)
        .await;
    }

    let start = format!("{}/promos", mock_server.uri());
    let mut config = test_config(&db_path, &html_source("shop", &start));
    config.crawler.max_pages = 3;
    let reports = harvest(config).await;

    let report = &reports[0];
    assert_eq!(report.state, JobState::Exhausted);
    assert_eq!(report.reason.as_deref(), Some("page ceiling"));
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.records_committed, 3);
}
