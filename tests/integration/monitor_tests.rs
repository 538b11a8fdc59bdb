use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const SOLD_OUT: &str = r#"<select id="prodattr2">
  <option data-color="Black" data-size="M" disabled>Black - M</option>
</select>"#;

const RESTOCKED: &str = r#"<select id="prodattr2">
  <option data-color="Black" data-size="M">Black - M</option>
</select>"#;

async fn webhook_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/webhook")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_restock_notifies_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hoody.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SOLD_OUT))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/hoody.html", RESTOCKED).await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut config = get_test_config(&server.uri());
    config
        .items
        .push(item("trailhead", &server.uri(), "/hoody.html", "Black", &["M"]));
    let mut monitor = build_monitor(&config, Some(format!("{}/webhook", server.uri())))
        .await
        .unwrap();

    // Stored unavailable, silently.
    let first = monitor.run_cycle().await;
    assert_eq!(first.changes, 0);

    let second = monitor.run_cycle().await;
    assert_eq!(second.changes, 1);
    assert!(second.notification.unwrap().success());

    let third = monitor.run_cycle().await;
    assert_eq!(third.changes, 0);

    let bodies = webhook_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let content = bodies[0]["content"].as_str().unwrap();
    assert!(content.contains("trailhead Arc'teryx Heliad 15 Backpack - Black"));
    assert!(content.contains("✅ Available: M"));
}

#[tokio::test]
async fn test_cycle_messages_share_one_notification() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/heliad.html",
        r#"<select id="prodattr2">
            <option data-color="Black" data-size="">Black</option>
            <option data-color="Stone Green" data-size="">Stone Green</option>
        </select>"#,
    )
    .await;
    mount_page(
        &server,
        "/en-CA/p-heliad/435066",
        r#"<html><body><form class="pdp"><button type="submit">Add to cart</button></form></body></html>"#,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = get_test_config(&server.uri());
    config.items = vec![
        item("trailhead", &server.uri(), "/heliad.html", "Black", &[]),
        item("trailhead", &server.uri(), "/heliad.html", "Stone Green", &[]),
        item("sportsexperts", &server.uri(), "/en-CA/p-heliad/435066", "Black", &[]),
    ];
    let mut monitor = build_monitor(&config, Some(format!("{}/webhook", server.uri())))
        .await
        .unwrap();

    let report = monitor.run_cycle().await;
    assert_eq!(report.checked, 3);
    assert_eq!(report.changes, 3);

    let bodies = webhook_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let content = bodies[0]["content"].as_str().unwrap();
    assert_eq!(content.split("\n\n").count(), 3);
    assert!(content.contains("sportsexperts Arc'teryx Heliad 15 Backpack - Black\n✅ Available"));
}

#[tokio::test]
async fn test_fetch_failure_is_logged_and_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "/hoody.html", RESTOCKED).await;

    let mut config = get_test_config(&server.uri());
    config.items = vec![
        item("trailhead", &server.uri(), "/missing.html", "Black", &["M"]),
        item("trailhead", &server.uri(), "/hoody.html", "Black", &["M"]),
    ];

    // No webhook: the message is built but delivery is skipped.
    let mut monitor = build_monitor(&config, None).await.unwrap();
    let report = monitor.run_cycle().await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.changes, 1);
    assert!(report.notification.unwrap().skipped);
}
