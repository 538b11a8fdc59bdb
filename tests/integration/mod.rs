// Integration tests for Stock Watcher
// These tests drive real fetchers, resolvers and the Discord notifier
// against local mock servers.

pub mod monitor_tests;
pub mod scenario_tests;

use std::time::Duration;
use stock_watcher::{
    AppConfig,
    config::{FetchConfig, RenderConfig, SiteConfig, Template},
    models::MonitoredItem,
    plugins::{notifiers::DiscordNotifier, ResolverRegistry},
    product_manager::ProductManager,
    scheduler::StockMonitor,
    scraper::PageSources,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BLOCK_PAGE: &str = r#"<html><head><meta name="robots" content="noindex,nofollow">
<script src="/_Incapsula_Resource?SWJIYLWA=719d34d31c8e3a6e6fffd425f7e032f3"></script></head>
<body><iframe src="/_Incapsula_Resource?CWUDNSAI=23"></iframe>Request unsuccessful.</body></html>"#;

/// Test configuration for integration tests
pub fn get_test_config(server_uri: &str) -> AppConfig {
    let mut config = AppConfig {
        fetch: FetchConfig {
            request_timeout_secs: 5,
            retry_attempts: 1,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 10,
            ..Default::default()
        },
        render: RenderConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };

    config.sites.insert(
        "trailhead".to_string(),
        SiteConfig {
            template: Template::SelectOption,
            select_id: Some("prodattr2".to_string()),
            warmup_url: None,
            cookie: None,
            cookie_domains: vec![],
        },
    );
    config.sites.insert(
        "sportsexperts".to_string(),
        SiteConfig {
            template: Template::Heuristic,
            select_id: None,
            warmup_url: Some(format!("{}/en-CA/", server_uri)),
            cookie: Some("visid_incap_1=abc".to_string()),
            cookie_domains: vec!["sportsexperts.ca".to_string()],
        },
    );
    config
}

pub fn item(site: &str, server_uri: &str, page: &str, color: &str, sizes: &[&str]) -> MonitoredItem {
    MonitoredItem {
        site: site.to_string(),
        name: "Arc'teryx Heliad 15 Backpack".to_string(),
        url: format!("{}{}", server_uri, page),
        color: color.to_string(),
        sizes: sizes.iter().map(|s| s.to_string()).collect(),
    }
}

pub async fn mount_page(server: &MockServer, page: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

/// Build a monitor wired like the binary, posting to `webhook_url`.
pub async fn build_monitor(config: &AppConfig, webhook_url: Option<String>) -> anyhow::Result<StockMonitor> {
    let registry = ResolverRegistry::from_config(config)?;
    let sources = PageSources::from_config(config).await?;

    let mut discord = config.notifications.discord.clone();
    discord.webhook_url = webhook_url;
    let notifier = DiscordNotifier::new(discord, config.notifications.chunk_size)?;

    Ok(StockMonitor::new(
        config.items.clone(),
        sources,
        ProductManager::new(registry),
        Box::new(notifier),
        Duration::from_millis(20),
    ))
}
