//! Integration tests for the read side, fed by a real crawl

use crate::{card, html_source, listing, test_config};
use promo_harvest::crawler::run_pipeline;
use promo_harvest::output::load_statistics;
use promo_harvest::storage::{open_storage, ProductQuery, Storage, StorageError, StoragePool};
use promo_harvest::{JobState, Price};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Crawls one page of five products into `db_path`
async fn seed(db_path: &Path) {
    let mock_server = MockServer::start().await;
    let cards = vec![
        card("Café moulu", "Carte Noire", "250 g", &["3,20 €"], "12,80 €/kg"),
        card("Café en grains", "Carte Noire", "1 kg", &["11,90 €"], "11,90 €/kg"),
        card("Thé vert", "Lipton", "25 sachets", &["2,15 €"], ""),
        card("Chocolat 100%", "Lindt", "100 g", &["2,49 €"], "24,90 €/kg"),
        card("Sucre", "Daddy", "1 kg", &["1,05 €"], "1,05 €/kg"),
    ];
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing(&cards, None))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let start = format!("{}/promos", mock_server.uri());
    let config = test_config(db_path, &html_source("shop", &start));
    let pool = Arc::new(
        StoragePool::new(&config.storage.database_path, config.storage.pool_size).unwrap(),
    );
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let reports = run_pipeline(Arc::new(config), pool, cancel_rx, "seed")
        .await
        .unwrap();
    assert_eq!(reports[0].state, JobState::Exhausted);
    assert_eq!(reports[0].records_committed, 5);
}

#[tokio::test]
async fn test_list_with_brand_filter_and_paging() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");
    seed(&db_path).await;
    let storage = open_storage(&db_path).unwrap();

    let query = ProductQuery {
        brand: Some("carte".to_string()),
        limit: 1,
        offset: 1,
    };
    let page = storage.list_products(&query).unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.records.len(), 1);
    // Ordered by name: "Café en grains" < "Café moulu"
    assert_eq!(page.records[0].name, "Café moulu");
}

#[tokio::test]
async fn test_search_is_case_insensitive_and_literal() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");
    seed(&db_path).await;
    let storage = open_storage(&db_path).unwrap();

    let cafe = storage.search_products("cAfé", 10).unwrap();
    let names: Vec<&str> = cafe.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Café en grains", "Café moulu"]);

    let percent = storage.search_products("0%", 10).unwrap();
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].name, "Chocolat 100%");

    assert!(matches!(
        storage.search_products("x", 10),
        Err(StorageError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_statistics_after_crawl() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");
    seed(&db_path).await;
    let storage = open_storage(&db_path).unwrap();

    let stats = load_statistics(&storage).unwrap();

    assert_eq!(stats.coverage.total, 5);
    assert_eq!(stats.coverage.with_price, 5);
    assert_eq!(stats.coverage.with_unit_price, 4);
    assert_eq!(stats.coverage.min_price, Some(Price::from_cents(105)));
    assert_eq!(stats.coverage.max_price, Some(Price::from_cents(1190)));
    assert_eq!(stats.distinct_brands, 4);
    assert_eq!(stats.top_brands[0].brand, "Carte Noire");
    assert_eq!(stats.top_brands[0].count, 2);
    assert_eq!(stats.recent_jobs.len(), 1);
}

#[tokio::test]
async fn test_repeated_crawls_append_snapshots() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("promos.db");
    seed(&db_path).await;
    seed(&db_path).await;

    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count_products().unwrap(), 10);
    assert_eq!(storage.recent_jobs(10).unwrap().len(), 2);
}
