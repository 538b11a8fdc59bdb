use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::models::MonitoredItem;

/// Built-in defaults, including the stock site table and product list.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub fetch: FetchConfig,
    pub render: RenderConfig,
    pub proxy: ProxyConfig,
    pub heuristics: HeuristicsConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub sites: BTreeMap<String, SiteConfig>,
    pub items: Vec<MonitoredItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub debug: bool,
    /// Write every fetched page to the temp directory.
    pub dump_html: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub request_timeout_secs: u64,
    /// Total attempts per page, the first one included.
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub user_agent: String,
    pub accept_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub headless: bool,
    /// Navigation timeout; falls back to the request timeout.
    pub timeout_ms: Option<u64>,
    pub extra_wait_ms: u64,
    pub chrome_path: Option<String>,
    pub locale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub country_code: String,
    pub render: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Accept raw add-to-cart identifiers anywhere in the source. Trades
    /// precision for recall.
    pub aggressive_atc_fallback: bool,
    /// Count "in-store only" pages as in stock.
    pub treat_store_only_as_in_stock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub chunk_size: usize,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; stdout only when unset.
    pub directory: Option<String>,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    /// Every color/size combination is an option of one select control.
    SelectOption,
    /// No authoritative control; availability is inferred from several signals.
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub template: Template,
    #[serde(default)]
    pub select_id: Option<String>,
    /// Requested once at start so the cookie jar holds the site's session.
    #[serde(default)]
    pub warmup_url: Option<String>,
    /// Browser cookie string, `name=value; name2=value2`.
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub cookie_domains: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            debug: false,
            dump_html: false,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            retry_attempts: 5,
            retry_base_delay_ms: 400,
            retry_max_delay_ms: 5000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en,zh-CN;q=0.9,zh;q=0.8,fr;q=0.7".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            timeout_ms: None,
            extra_wait_ms: 1200,
            chrome_path: None,
            locale: "en-CA".to_string(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "http://api.scraperapi.com".to_string(),
            country_code: "ca".to_string(),
            render: true,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1900,
            discord: DiscordConfig::default(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: Some("Stock Watcher".to_string()),
            avatar_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "stock-watcher.log".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RenderConfig {
    pub fn navigation_timeout(&self, fetch: &FetchConfig) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| fetch.request_timeout())
    }
}

impl AppConfig {
    /// Build the configuration from the embedded defaults, an optional file,
    /// `STOCK_WATCHER__*` variables and the legacy flat variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Start with default configuration
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            // Add local config (ignored by git)
            None => builder.add_source(File::with_name("config/local").required(false)),
        };

        let s = builder
            .add_source(
                Environment::with_prefix("STOCK_WATCHER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded defaults alone, without files or environment.
    pub fn defaults() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Apply the flat variables older deployments set, e.g. `INTERVAL_SEC`
    /// or `SPORTSEXPERTS_COOKIE`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("DISCORD_WEBHOOK_URL") {
            self.notifications.discord.webhook_url = Some(url);
        }
        if let Some(value) = get("INTERVAL_SEC") {
            self.monitor.interval_secs = parse_number("INTERVAL_SEC", &value)?;
        }
        if let Some(value) = get("REQUEST_TIMEOUT") {
            self.fetch.request_timeout_secs = parse_number("REQUEST_TIMEOUT", &value)?;
        }
        if let Some(value) = get("DEBUG") {
            self.monitor.debug = is_flag_set(&value);
        }
        if let Some(value) = get("AGGRESSIVE_ATC_FALLBACK") {
            self.heuristics.aggressive_atc_fallback = is_flag_set(&value);
        }
        if let Some(value) = get("TREAT_STORE_ONLY_AS_IN_STOCK") {
            self.heuristics.treat_store_only_as_in_stock = is_flag_set(&value);
        }
        if let Some(key) = get("SCRAPERAPI_KEY") {
            self.proxy.api_key = Some(key);
        }
        if let Some(value) = get("PLAYWRIGHT_HEADLESS") {
            self.render.headless = is_flag_set(&value);
        }
        if let Some(value) = get("PLAYWRIGHT_TIMEOUT_MS") {
            self.render.timeout_ms = Some(parse_number("PLAYWRIGHT_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = get("PLAYWRIGHT_EXTRA_WAIT_MS") {
            self.render.extra_wait_ms = parse_number("PLAYWRIGHT_EXTRA_WAIT_MS", &value)?;
        }
        if self.render.chrome_path.is_none() {
            self.render.chrome_path = get("CHROME_PATH");
        }

        for (site_id, site) in self.sites.iter_mut() {
            let var = format!("{}_COOKIE", site_id.to_uppercase().replace('-', "_"));
            if let Some(cookie) = get(&var) {
                site.cookie = Some(cookie);
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate monitor configuration
        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::Message("Monitor interval_secs must be greater than 0".into()));
        }

        // Validate fetch configuration
        if self.fetch.request_timeout_secs == 0 {
            return Err(ConfigError::Message("Fetch request_timeout_secs must be greater than 0".into()));
        }

        if self.fetch.retry_attempts == 0 {
            return Err(ConfigError::Message("Fetch retry_attempts must be greater than 0".into()));
        }

        if self.fetch.retry_base_delay_ms > self.fetch.retry_max_delay_ms {
            return Err(ConfigError::Message(
                "Fetch retry_base_delay_ms cannot exceed retry_max_delay_ms".into(),
            ));
        }

        // Validate notification configuration
        if self.notifications.chunk_size == 0 || self.notifications.chunk_size > 2000 {
            return Err(ConfigError::Message(
                "Notification chunk_size must be between 1 and 2000".into(),
            ));
        }

        if let Some(webhook) = &self.notifications.discord.webhook_url {
            if !webhook.starts_with("https://") {
                return Err(ConfigError::Message("Discord webhook_url must use https".into()));
            }
        }

        // Validate sites and items
        for (site_id, site) in &self.sites {
            if site.template == Template::SelectOption && site.select_id.is_none() {
                return Err(ConfigError::Message(format!(
                    "Site {} uses the select-option template but has no select_id",
                    site_id
                )));
            }
        }

        if self.items.is_empty() {
            return Err(ConfigError::Message("At least one item must be configured".into()));
        }

        for item in &self.items {
            if !self.sites.contains_key(&item.site) {
                return Err(ConfigError::Message(format!(
                    "Item {} refers to unknown site {}",
                    item.name, item.site
                )));
            }

            if Url::parse(&item.url).is_err() {
                return Err(ConfigError::Message(format!("Invalid URL for item {}: {}", item.name, item.url)));
            }
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Message(format!("{} must be a number, got {:?}", key, value)))
}

fn is_flag_set(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
