//! Integration tests for the crawler
//!
//! These tests use wiremock to serve an IKEA-like storefront and run the full
//! crawl cycle end-to-end through the plain HTTP engine, the SQLite sink and
//! an on-disk crawl cache.

use furnish_crawl::cache::CrawlCache;
use furnish_crawl::config::{parse_config, Config};
use furnish_crawl::storage::SqliteSink;
use furnish_crawl::{ConfigError, CrawlError, Orchestrator, Price};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATEGORY_PATH: &str = "/us/en/cat/chairs-fu002/";
const LACK: &str = "/us/en/p/lack-side-table-white-20011408/";
const POANG: &str = "/us/en/p/poaeng-armchair-birch-veneer-s49388542/";
const MARKUS: &str = "/us/en/p/markus-office-chair-vissle-dark-grey-70261150/";

/// Creates a test configuration writing everything below `dir`
fn create_test_config(dir: &TempDir) -> Config {
    let toml = format!(
        r#"
[crawler]
retailer = "ikea"
delay-between-requests-ms = 0
jitter-ms = 0
max-concurrent-requests = 2
max-retries = 2
retry-backoff-ms = 1
checkpoint-interval = 1

[browser]
engine = "http"
navigation-timeout-secs = 5

[output]
cache-location = "{cache}"
database-path = "{db}"
artifacts-dir = "{runs}"
"#,
        cache = dir.path().join("cache.json").display(),
        db = dir.path().join("products.db").display(),
        runs = dir.path().join("runs").display(),
    );
    parse_config(&toml).expect("test config is valid")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

fn listing_page(products: &[&str], show_more: Option<&str>) -> String {
    let tiles: String = products
        .iter()
        .map(|href| {
            format!(
                r#"<div class="plp-fragment-wrapper"><a class="plp-product__image-link" href="{}">x</a></div>"#,
                href
            )
        })
        .collect();
    let more = show_more
        .map(|href| format!(r#"<a class="plp-btn--show-more" href="{}">Show more</a>"#, href))
        .unwrap_or_default();

    format!(
        r#"<html><body><div class="plp-product-list">{}</div>{}</body></html>"#,
        tiles, more
    )
}

/// Mounts a two-page category, a linked-data product, a markup-only product
/// and a product page that always errors
async fn mount_storefront(server: &MockServer, lack_hits: u64) {
    // Mounted first so `?page=2` wins over the bare category path
    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .and(query_param("page", "2"))
        .respond_with(html(listing_page(&[LACK, POANG, MARKUS], None)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .respond_with(html(listing_page(&[LACK, POANG], Some("?page=2"))))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(LACK))
        .respond_with(html(
            r#"<html><head><script type="application/ld+json">
            {"@context":"https://schema.org","@type":"Product","name":"LACK Side table",
             "sku":"20011408","description":"Side table, white",
             "image":["https://www.ikea.com/images/lack.jpg"],
             "offers":{"@type":"Offer","price":"12.99","priceCurrency":"USD"}}
            </script></head><body><h1>LACK</h1></body></html>"#
                .to_string(),
        ))
        .expect(lack_hits)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(POANG))
        .respond_with(html(
            r#"<html><body>
            <h1 class="pip-header-section__title--big">POÄNG Armchair</h1>
            <span class="pip-price">$129.00</span>
            <p class="pip-product-summary__description">Armchair, birch veneer</p>
            </body></html>"#
                .to_string(),
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(MARKUS))
        .respond_with(ResponseTemplate::new(503))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_stores_products_and_updates_cache() {
    let mock_server = MockServer::start().await;
    mount_storefront(&mock_server, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let category = format!("{}{}", mock_server.uri(), CATEGORY_PATH);

    let orchestrator = Orchestrator::from_config(config, "test-hash").unwrap();
    let summary = orchestrator.run("ikea", Some(&category)).await.unwrap();

    assert_eq!(summary.retailer, "ikea");
    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.links_found, 3);
    assert_eq!(summary.duplicates_removed, 2);
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].url.ends_with(MARKUS));
    assert_eq!(summary.config_hash, "test-hash");

    let sink = SqliteSink::open(&dir.path().join("products.db")).unwrap();
    assert_eq!(sink.count_products(Some("ikea")).unwrap(), 2);
    assert_eq!(sink.count_runs().unwrap(), 1);

    let lack = sink.get_product("ikea", "20011408").unwrap().unwrap();
    assert_eq!(lack.name, "LACK Side table");
    assert_eq!(lack.slug, "lack-side-table");
    assert_eq!(lack.price_display, "12.99 USD");

    let poang = sink.get_product("ikea", "s49388542").unwrap().unwrap();
    assert_eq!(poang.name, "POÄNG Armchair");
    assert_eq!(poang.price_display, "$129.00");

    let cache = CrawlCache::load(dir.path().join("cache.json"));
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&format!("{}{}", mock_server.uri(), LACK)));
    assert!(!cache.contains(&format!("{}{}", mock_server.uri(), MARKUS)));
}

#[tokio::test]
async fn test_second_run_skips_cached_products() {
    let mock_server = MockServer::start().await;
    // The linked-data product page must only be fetched by the first run
    mount_storefront(&mock_server, 1).await;

    let dir = TempDir::new().unwrap();
    let category = format!("{}{}", mock_server.uri(), CATEGORY_PATH);

    let first = Orchestrator::from_config(create_test_config(&dir), "h")
        .unwrap()
        .run("ikea", Some(&category))
        .await
        .unwrap();
    assert_eq!(first.succeeded, 2);

    let second = Orchestrator::from_config(create_test_config(&dir), "h")
        .unwrap()
        .run("IKEA", Some(&category))
        .await
        .unwrap();

    assert_eq!(second.links_found, 3);
    assert_eq!(second.already_cached, 2);
    assert_eq!(second.attempted, 1);
    assert_eq!(second.failed, 1);

    let sink = SqliteSink::open(&dir.path().join("products.db")).unwrap();
    assert_eq!(sink.count_products(None).unwrap(), 2);
    assert_eq!(sink.count_runs().unwrap(), 2);
}

#[tokio::test]
async fn test_unreachable_category_finishes_with_empty_run() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let category = format!("{}{}", mock_server.uri(), CATEGORY_PATH);

    let summary = Orchestrator::from_config(create_test_config(&dir), "h")
        .unwrap()
        .run("ikea", Some(&category))
        .await
        .unwrap();

    assert_eq!(summary.links_found, 0);
    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.succeeded, 0);
}

#[tokio::test]
async fn test_unknown_retailer_is_rejected() {
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::from_config(create_test_config(&dir), "h").unwrap();

    let result = orchestrator.run("Acme Furniture", None).await;

    match result {
        Err(CrawlError::Config(ConfigError::UnsupportedRetailer { name, supported })) => {
            assert_eq!(name, "Acme Furniture");
            assert!(supported.contains("ikea"));
        }
        other => panic!("unexpected result {:?}", other.map(|s| s.run_id)),
    }
}

#[test]
fn test_price_serializes_untagged() {
    let structured = Price::Structured {
        amount: 12.99,
        currency: "USD".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&structured).unwrap(),
        serde_json::json!({"amount": 12.99, "currency": "USD"})
    );
    assert_eq!(serde_json::to_value(Price::Unavailable).unwrap(), serde_json::Value::Null);
}
