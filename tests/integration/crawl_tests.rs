//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the listings API and run
//! the full crawl cycle end-to-end over the real HTTP transport.

use listing_sweep::api::{ApiClient, DetailSource, HttpTransport, SearchSource};
use listing_sweep::config::{load_config, load_config_with_hash};
use listing_sweep::crawler::{run_crawl, Coordinator, CrawlPlan, RetryPolicy};
use listing_sweep::dedup::DeduplicationFilter;
use listing_sweep::query::{PriceWindow, Query};
use listing_sweep::storage::{SqliteStorage, Storage};
use listing_sweep::ListingId;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One search page carrying the given listing ids, all quoted at 30 a night
fn search_body(total_count: u32, ids: &[u64]) -> String {
    let items: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "listing": { "id": id, "name": format!("Listing {}", id), "city": "Auckland" },
                "pricingQuote": {
                    "rateType": "nightly",
                    "rateWithServiceFee": { "amount": 30 }
                }
            })
        })
        .collect();

    json!({ "data": { "dora": { "exploreV3": {
        "metadata": { "paginationMetadata": {
            "totalCount": total_count,
            "hasNextPage": false,
            "itemsOffset": ids.len()
        }},
        "sections": [
            { "sectionComponentType": "listings_ListingsGrid_Explore", "items": items }
        ]
    }}}})
    .to_string()
}

fn detail_body() -> String {
    json!({ "pdp_listing_detail": {
        "name": "Harbour View",
        "location_title": "Auckland, New Zealand",
        "room_and_property_type": "Entire apartment",
        "localized_city": "Auckland",
        "guest_label": "4 guests",
        "photos": [ { "large": "https://img.test/1.jpg?aki_policy=large" } ]
    }})
    .to_string()
}

async fn mount_search(server: &MockServer, min: u32, max: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("priceMin", min.to_string()))
        .and(query_param("priceMax", max.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/detail/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_body()))
        .mount(server)
        .await;
}

fn api_config_toml(server: &MockServer) -> String {
    format!(
        r#"
[api]
search-url = "{uri}/search"
detail-url = "{uri}/detail"
listing-url-base = "https://listings.test/rooms"
api-key = "test-key"
"#,
        uri = server.uri()
    )
}

/// Builds an HTTP-backed coordinator over a single root window
fn http_coordinator(
    server: &MockServer,
    dir: &TempDir,
    root: PriceWindow,
    policy: RetryPolicy,
) -> Coordinator {
    let config = load_config(&write_config(server, dir, None)).unwrap();

    let transport = HttpTransport::from_config(&config.api).unwrap();
    let client = Arc::new(ApiClient::new(transport, policy));
    let backoff = client.backoff_stats();
    let search: Arc<dyn SearchSource> = client.clone();
    let details: Arc<dyn DetailSource> = client;

    let plan = CrawlPlan {
        search_term: "Auckland".to_string(),
        listing_url_base: config.api.listing_url_base.clone(),
        roots: vec![Query::new("Auckland", root)],
        result_ceiling: 300,
    };

    Coordinator::with_sources(
        plan,
        search,
        details,
        SqliteStorage::new(Path::new(&config.output.database_path)).unwrap(),
        DeduplicationFilter::empty(),
        "test-hash",
    )
    .unwrap()
    .with_backoff_stats(backoff)
}

#[tokio::test]
async fn test_crawl_splits_over_http_and_stores_listings() {
    let server = MockServer::start().await;
    mount_search(&server, 0, 1000, search_body(500, &[])).await;
    mount_search(&server, 0, 500, search_body(200, &[1, 2])).await;
    mount_search(&server, 500, 1000, search_body(250, &[2, 3])).await;
    mount_details(&server).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sweep.db");
    let mut coordinator = http_coordinator(
        &server,
        &dir,
        PriceWindow::new(0, 1000).unwrap(),
        RetryPolicy::default(),
    );

    let stats = coordinator.run().await.unwrap();
    assert_eq!(stats.splits, 1);
    assert_eq!(stats.leaves_walked, 2);
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.rate_limit_pauses, 0);

    let run_id = coordinator.run_id();
    let storage = SqliteStorage::new(&db_path).unwrap();
    let ids = storage.listing_ids_for_run(run_id).unwrap();
    let expected: HashSet<ListingId> = [1, 2, 3].into_iter().map(ListingId).collect();
    assert_eq!(ids, expected);

    let listing = storage.get_listing(run_id, ListingId(3)).unwrap().unwrap();
    assert_eq!(listing.url, "https://listings.test/rooms/3");
    assert_eq!(listing.detail.name, "Harbour View");
    assert_eq!(listing.detail.guests.as_deref(), Some("4"));
    assert_eq!(listing.detail.photos, vec!["https://img.test/1.jpg".to_string()]);
    assert_eq!(listing.price_rate(), Some(30.0));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried_after_pause() {
    let server = MockServer::start().await;

    // Mounted first, so the first search hits the 429
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_search(&server, 0, 100, search_body(1, &[9])).await;
    mount_details(&server).await;

    let dir = TempDir::new().unwrap();
    let policy = RetryPolicy {
        pause_duration: Duration::from_millis(50),
        ..RetryPolicy::default()
    };
    let mut coordinator = http_coordinator(
        &server,
        &dir,
        PriceWindow::new(0, 100).unwrap(),
        policy,
    );

    let stats = coordinator.run().await.unwrap();
    assert_eq!(stats.rate_limit_pauses, 1);
    assert_eq!(stats.aborted_partitions, 0);
    assert_eq!(stats.accepted, 1);
}

#[tokio::test]
async fn test_server_errors_abort_only_the_partition() {
    let server = MockServer::start().await;
    mount_search(&server, 0, 1000, search_body(500, &[])).await;
    mount_search(&server, 0, 500, search_body(10, &[1])).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("priceMin", "500"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let dir = TempDir::new().unwrap();
    let policy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
        ..RetryPolicy::default()
    };
    let mut coordinator = http_coordinator(
        &server,
        &dir,
        PriceWindow::new(0, 1000).unwrap(),
        policy,
    );

    let stats = coordinator.run().await.unwrap();
    assert_eq!(stats.aborted_partitions, 1);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.leaves_walked, 1);
    assert_eq!(stats.accepted, 1);
}

/// Writes a config whose budget yields three identical 10-30 root windows
fn write_config(server: &MockServer, dir: &TempDir, dedup: Option<(&Path, &Path)>) -> PathBuf {
    let db_path = dir.path().join("sweep.db");
    let mut content = format!(
        r#"
[search]
query = "Auckland"
price-min = 10
price-max = 30
{api}
[output]
database-path = "{db}"
"#,
        api = api_config_toml(server),
        db = db_path.display()
    );
    if let Some((primary, backup)) = dedup {
        content.push_str(&format!(
            "\n[dedup]\nprimary-sentinel = \"{}\"\nbackup-sentinel = \"{}\"\n",
            primary.display(),
            backup.display()
        ));
    }

    let config_path = dir.path().join("sweep.toml");
    std::fs::write(&config_path, content).unwrap();
    config_path
}

#[tokio::test]
async fn test_second_run_skips_listings_from_first_run() {
    let server = MockServer::start().await;
    mount_search(&server, 10, 30, search_body(2, &[7, 8])).await;
    mount_details(&server).await;

    let dir = TempDir::new().unwrap();
    let (config, hash) = load_config_with_hash(&write_config(&server, &dir, None)).unwrap();

    let first = run_crawl(&config, &hash, false).await.unwrap();
    assert_eq!(first.root_partitions, 3);
    assert_eq!(first.accepted, 2);
    assert_eq!(first.duplicates, 4);

    let second = run_crawl(&config, &hash, false).await.unwrap();
    assert_eq!(second.accepted, 0);
    assert_eq!(second.duplicates, 6);

    // A fresh run ignores the prior identifiers
    let fresh = run_crawl(&config, &hash, true).await.unwrap();
    assert_eq!(fresh.accepted, 2);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    let latest = storage.latest_completed_run().unwrap().unwrap();
    assert_eq!(latest.config_hash, hash);
    assert_eq!(storage.count_listings(latest.id).unwrap(), 2);
}

#[tokio::test]
async fn test_stale_sentinels_disable_prior_dedup() {
    let server = MockServer::start().await;
    mount_search(&server, 10, 30, search_body(2, &[7, 8])).await;
    mount_details(&server).await;

    let dir = TempDir::new().unwrap();
    let primary = dir.path().join("locations.txt");
    let backup = dir.path().join("locations-copy.txt");
    std::fs::write(&primary, "a\nb\nc\n").unwrap();
    std::fs::write(&backup, "a\nb\nc\nd\ne\n").unwrap();

    let (config, hash) =
        load_config_with_hash(&write_config(&server, &dir, Some((&primary, &backup)))).unwrap();

    run_crawl(&config, &hash, false).await.unwrap();
    let second = run_crawl(&config, &hash, false).await.unwrap();
    assert_eq!(second.accepted, 2);
}

#[tokio::test]
async fn test_invalid_dates_fail_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&server, &dir, None);
    let (mut config, hash) = load_config_with_hash(&config_path).unwrap();
    config.search.checkin = Some("2001-01-01".to_string());
    config.search.checkout = Some("2001-01-05".to_string());

    let err = run_crawl(&config, &hash, false).await.unwrap_err();
    assert!(matches!(err, listing_sweep::SweepError::Config(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
