use stock_watcher::models::{Availability, Verdict, ANY_SIZE};
use stock_watcher::plugins::ResolverRegistry;
use stock_watcher::scraper::PageSources;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const TRAILHEAD_PAGE: &str = r#"<html><body>
<form id="product_addtocart_form">
  <select id="prodattr2" name="prodattr2">
    <option value="">Select a size</option>
    <option value="101" data-color="Black" data-size="S" disabled>Black - S (sold out)</option>
    <option value="102" data-color="Black" data-size="M">Black - M</option>
    <option value="103" data-color="Cloud Heather / Void" data-size="L">Cloud Heather / Void - L</option>
  </select>
</form>
</body></html>"#;

async fn resolve(config: &AppConfig, index: usize) -> Availability {
    let registry = ResolverRegistry::from_config(config).unwrap();
    let sources = PageSources::from_config(config).await.unwrap();
    let item = &config.items[index];
    registry
        .get(&item.site)
        .unwrap()
        .resolve(&sources, item)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_select_template_sizes() {
    let server = MockServer::start().await;
    mount_page(&server, "/gamma.html", TRAILHEAD_PAGE).await;

    let mut config = get_test_config(&server.uri());
    config
        .items
        .push(item("trailhead", &server.uri(), "/gamma.html", "Black", &["S", "M"]));

    let availability = resolve(&config, 0).await;
    let stock = availability.stock().unwrap();
    assert_eq!(stock.get("S"), Some(false));
    assert_eq!(stock.get("M"), Some(true));
    assert_eq!(stock.len(), 2);
}

#[tokio::test]
async fn test_select_template_missing_color() {
    let server = MockServer::start().await;
    mount_page(&server, "/heliad.html", TRAILHEAD_PAGE).await;

    let mut config = get_test_config(&server.uri());
    config
        .items
        .push(item("trailhead", &server.uri(), "/heliad.html", "Stone Green", &[]));

    let availability = resolve(&config, 0).await;
    let stock = availability.stock().unwrap();
    assert_eq!(stock.get(ANY_SIZE), Some(false));
    assert!(stock.is_single());
}

#[tokio::test]
async fn test_heuristic_blocked_everywhere_is_unknown() {
    let server = MockServer::start().await;
    mount_page(&server, "/en-CA/p-heliad/435066", BLOCK_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .and(query_param("api_key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BLOCK_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = get_test_config(&server.uri());
    config.proxy.api_key = Some("test-key".to_string());
    config.proxy.endpoint = format!("{}/proxy", server.uri());
    config
        .items
        .push(item("sportsexperts", &server.uri(), "/en-CA/p-heliad/435066", "Black", &[]));

    let mut monitor = build_monitor(&config, Some(format!("{}/webhook", server.uri())))
        .await
        .unwrap();
    let report = monitor.run_cycle().await;

    assert_eq!(report.unknown, 1);
    assert_eq!(report.changes, 0);
    assert!(report.notification.is_none());
    assert!(monitor.product_manager().tracker().is_empty());
}

#[tokio::test]
async fn test_heuristic_proxy_recovers_page() {
    let server = MockServer::start().await;
    mount_page(&server, "/en-CA/p-heliad/435066", BLOCK_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/proxy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><script type="application/ld+json">
            {"@context":"https://schema.org","@type":"Product","offers":{"@type":"Offer","availability":"https://schema.org/InStock"}}
            </script></body></html>"#,
        ))
        .mount(&server)
        .await;

    let mut config = get_test_config(&server.uri());
    config.proxy.api_key = Some("test-key".to_string());
    config.proxy.endpoint = format!("{}/proxy", server.uri());
    config
        .items
        .push(item("sportsexperts", &server.uri(), "/en-CA/p-heliad/435066", "Black", &[]));

    assert_eq!(resolve(&config, 0).await.verdict(), Verdict::Available);
}

#[tokio::test]
async fn test_heuristic_sold_out_text() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/en-CA/p-heliad-shoulder-bag/435067",
        r#"<html><head><title>Heliad Shoulder Bag</title></head><body>
        <h1>Arc'teryx Heliad Shoulder Bag</h1>
        <div class="product-availability">Sold Out</div>
        <a href="/en-CA/stores">Find a store</a>
        </body></html>"#,
    )
    .await;

    let mut config = get_test_config(&server.uri());
    config.items.push(item(
        "sportsexperts",
        &server.uri(),
        "/en-CA/p-heliad-shoulder-bag/435067",
        "Black",
        &[],
    ));

    assert_eq!(resolve(&config, 0).await.verdict(), Verdict::Unavailable);
}
