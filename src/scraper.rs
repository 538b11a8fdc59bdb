use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{AppConfig, FetchConfig, ProxyConfig, RenderConfig};
use crate::models::{PageOrigin, RawPage};
use crate::utils::{AppError, Result};

const CONSENT_BUTTONS: &[&str] = &["Accept", "I agree", "Got it", "OK"];
const CONSENT_CLICK_TIMEOUT: Duration = Duration::from_millis(1500);

/// Plain HTTP retrieval of a product page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawPage>;
}

/// A way to obtain a page's HTML after scripts have run. Failures are
/// reported as `None`; rendering is always a best-effort fallback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;
    fn origin(&self) -> PageOrigin;
    async fn render(&self, url: &str) -> Option<String>;
}

/// Split a browser cookie string (`a=1; b=2`) into name/value pairs.
/// Parts without `=` or with an empty name are dropped.
pub fn parse_cookie_string(cookie: &str) -> Vec<(String, String)> {
    cookie
        .split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
struct CookieEntry {
    domain: String,
    pairs: Vec<(String, String)>,
}

/// Configured per-site cookies, keyed by cookie domain.
#[derive(Debug, Clone, Default)]
pub struct CookieBook {
    entries: Vec<CookieEntry>,
}

impl CookieBook {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut book = Self::default();
        for site in config.sites.values() {
            if let Some(cookie) = &site.cookie {
                book.add(cookie, &site.cookie_domains);
            }
        }
        book
    }

    pub fn add(&mut self, cookie: &str, domains: &[String]) {
        let pairs = parse_cookie_string(cookie);
        if pairs.is_empty() {
            return;
        }
        for domain in domains {
            self.entries.push(CookieEntry {
                domain: domain.clone(),
                pairs: pairs.clone(),
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load every entry into a reqwest cookie jar.
    pub fn fill_jar(&self, jar: &Jar) -> Result<usize> {
        let mut added = 0;
        for entry in &self.entries {
            let origin = Url::parse(&format!("https://{}/", entry.domain.trim_start_matches('.')))?;
            for (name, value) in &entry.pairs {
                jar.add_cookie_str(
                    &format!("{}={}; Domain={}; Path=/", name, value, entry.domain),
                    &origin,
                );
                added += 1;
            }
        }
        Ok(added)
    }

    /// `Cookie` header value for a request to `url`, if any entry's domain
    /// matches its host.
    pub fn header_for(&self, url: &str) -> Option<String> {
        let host = Url::parse(url).ok()?.host_str()?.to_lowercase();
        let entry = self.entries.iter().find(|entry| {
            let domain = entry.domain.to_lowercase();
            let bare = domain.trim_start_matches('.');
            host == bare || host.ends_with(&format!(".{}", bare))
        })?;
        Some(
            entry
                .pairs
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// reqwest-backed fetcher with a persistent cookie jar, browser-like
/// headers and exponential backoff.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    dump_html: bool,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig, cookies: &CookieBook, dump_html: bool) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let injected = cookies.fill_jar(&jar)?;
        if injected > 0 {
            debug!("Injected {} configured cookies", injected);
        }

        let client = reqwest::Client::builder()
            .default_headers(browser_headers(config)?)
            .cookie_provider(jar)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            dump_html,
        })
    }

    /// Request a landing page once so the jar picks up session cookies.
    /// Failures are only logged.
    pub async fn warm_up(&self, url: &str) {
        match self.fetch_once(url).await {
            Ok(body) => info!("Warmed up session via {} ({} bytes)", url, body.len()),
            Err(e) => warn!("Warm-up request to {} failed: {}", url, e),
        }
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        let factor = (self.config.retry_base_delay_ms / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(Duration::from_millis(self.config.retry_max_delay_ms))
            .take(self.config.retry_attempts.saturating_sub(1) as usize)
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn dump_page(&self, url: &str, html: &str) {
        let tag: String = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "page".to_string())
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = std::env::temp_dir().join(format!("{}_{}.html", tag, stamp));

        match tokio::fs::write(&path, format!("<!-- {} -->\n{}", url, html)).await {
            Ok(()) => debug!("Saved page HTML to {}", path.display()),
            Err(e) => warn!("Failed to save page HTML to {}: {}", path.display(), e),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawPage> {
        let text = Retry::spawn(self.retry_strategy(), || async move {
            self.fetch_once(url).await.map_err(|e| {
                debug!("Fetch attempt for {} failed: {}", url, e);
                e
            })
        })
        .await?;

        debug!("Fetched {} ({} bytes)", url, text.len());
        if self.dump_html {
            self.dump_page(url, &text).await;
        }

        let page = RawPage::new(url, text, PageOrigin::Direct);
        if page.blocked {
            warn!("Direct fetch of {} returned a challenge page", url);
        }
        Ok(page)
    }
}

fn browser_headers(config: &FetchConfig) -> Result<HeaderMap> {
    let pairs = [
        ("user-agent", config.user_agent.as_str()),
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("accept-language", config.accept_language.as_str()),
        ("cache-control", "no-cache"),
        ("pragma", "no-cache"),
        ("upgrade-insecure-requests", "1"),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-user", "?1"),
    ];

    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::Validation(format!("Invalid {} header: {}", name, e)))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

#[derive(Debug, Clone)]
struct BrowserSettings {
    headless: bool,
    chrome_path: Option<String>,
    navigation_timeout: Duration,
    extra_wait: Duration,
    user_agent: String,
    accept_language: String,
}

/// Renders pages in headless Chrome. A browser is launched per render on a
/// blocking thread and dropped afterwards.
pub struct BrowserRenderer {
    settings: BrowserSettings,
    cookies: CookieBook,
}

impl BrowserRenderer {
    pub fn new(render: &RenderConfig, fetch: &FetchConfig, cookies: CookieBook) -> Self {
        Self {
            settings: BrowserSettings {
                headless: render.headless,
                chrome_path: render.chrome_path.clone(),
                navigation_timeout: render.navigation_timeout(fetch),
                extra_wait: Duration::from_millis(render.extra_wait_ms),
                user_agent: fetch.user_agent.clone(),
                accept_language: format!("{},{}", render.locale, fetch.accept_language),
            },
            cookies,
        }
    }
}

#[async_trait]
impl Renderer for BrowserRenderer {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn origin(&self) -> PageOrigin {
        PageOrigin::Browser
    }

    async fn render(&self, url: &str) -> Option<String> {
        let settings = self.settings.clone();
        let cookie = self.cookies.header_for(url);
        let target = url.to_string();

        let outcome =
            tokio::task::spawn_blocking(move || render_in_browser(&settings, &target, cookie.as_deref())).await;

        match outcome {
            Ok(Ok(html)) => {
                debug!("Rendered {} in browser ({} bytes)", url, html.len());
                Some(html)
            }
            Ok(Err(e)) => {
                warn!("Browser render of {} failed: {}", url, e);
                None
            }
            Err(e) => {
                warn!("Browser render task for {} did not complete: {}", url, e);
                None
            }
        }
    }
}

fn render_in_browser(settings: &BrowserSettings, url: &str, cookie: Option<&str>) -> anyhow::Result<String> {
    let mut launch_options = LaunchOptions::default_builder()
        .headless(settings.headless)
        .sandbox(false) // Often needed in containerized environments
        .args(vec![
            std::ffi::OsStr::new("--no-sandbox"),
            std::ffi::OsStr::new("--disable-dev-shm-usage"),
            std::ffi::OsStr::new("--disable-gpu"),
            std::ffi::OsStr::new("--disable-extensions"),
        ])
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create launch options: {}", e))?;

    if let Some(chrome_path) = &settings.chrome_path {
        launch_options.path = Some(std::path::PathBuf::from(chrome_path));
    }

    let browser = Browser::new(launch_options)?;
    let tab = browser.new_tab()?;

    tab.set_user_agent(&settings.user_agent, Some(&settings.accept_language), None)?;
    if let Some(cookie) = cookie {
        let mut headers = HashMap::new();
        headers.insert("Cookie", cookie);
        tab.set_extra_http_headers(headers)?;
    }

    tab.set_default_timeout(settings.navigation_timeout);
    tab.navigate_to(url)?.wait_until_navigated()?;

    tab.set_default_timeout(CONSENT_CLICK_TIMEOUT);
    for label in CONSENT_BUTTONS {
        let xpath = format!("//button[normalize-space(.)='{}']", label);
        if let Ok(button) = tab.find_element_by_xpath(&xpath) {
            if button.click().is_ok() {
                debug!("Dismissed consent dialog via '{}'", label);
                break;
            }
        }
    }

    std::thread::sleep(settings.extra_wait);
    let html = tab.get_content()?;
    let _ = tab.close(true);
    Ok(html)
}

/// Fetches pages through a rendering proxy service.
pub struct ProxyRenderer {
    client: reqwest::Client,
    api_key: String,
    config: ProxyConfig,
}

impl ProxyRenderer {
    /// `None` when no API key is configured.
    pub fn from_config(config: &ProxyConfig, fetch: &FetchConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(fetch.request_timeout())
            .build()?;

        Ok(Some(Self {
            client,
            api_key,
            config: config.clone(),
        }))
    }

    async fn request(&self, url: &str) -> Result<String> {
        let render = if self.config.render { "true" } else { "false" };
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("render", render),
                ("country_code", self.config.country_code.as_str()),
                ("url", url),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Renderer for ProxyRenderer {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn origin(&self) -> PageOrigin {
        PageOrigin::Proxy
    }

    async fn render(&self, url: &str) -> Option<String> {
        match self.request(url).await {
            Ok(html) => {
                debug!("Rendered {} via proxy ({} bytes)", url, html.len());
                Some(html)
            }
            Err(e) => {
                warn!("Proxy render of {} failed: {}", url, e);
                None
            }
        }
    }
}

/// Everything a resolver may use to obtain a page: the direct fetcher and
/// the fallback renderers in escalation order.
pub struct PageSources {
    pub fetcher: Box<dyn PageFetcher>,
    pub renderers: Vec<Box<dyn Renderer>>,
}

impl PageSources {
    pub fn new(fetcher: Box<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            renderers: Vec::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    /// Build the production sources and prime the cookie jar for every
    /// site with a warm-up URL.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let cookies = CookieBook::from_config(config);
        let fetcher = HttpFetcher::new(&config.fetch, &cookies, config.monitor.dump_html)?;

        for (site_id, site) in &config.sites {
            if let Some(warmup_url) = &site.warmup_url {
                debug!("Warming up session for {}", site_id);
                fetcher.warm_up(warmup_url).await;
            }
        }

        let mut sources = PageSources::new(Box::new(fetcher));
        if config.render.enabled {
            sources = sources.with_renderer(Box::new(BrowserRenderer::new(
                &config.render,
                &config.fetch,
                cookies.clone(),
            )));
        }
        if let Some(proxy) = ProxyRenderer::from_config(&config.proxy, &config.fetch)? {
            sources = sources.with_renderer(Box::new(proxy));
        }

        info!(
            "Page sources ready: direct fetch plus {} renderer(s)",
            sources.renderers.len()
        );
        Ok(sources)
    }

    pub async fn fetch(&self, url: &str) -> Result<RawPage> {
        self.fetcher.fetch(url).await
    }

    /// Try each renderer in order and return the first page that is not a
    /// challenge page.
    pub async fn render_unblocked(&self, url: &str) -> Option<RawPage> {
        for renderer in &self.renderers {
            let Some(html) = renderer.render(url).await else {
                continue;
            };
            let page = RawPage::new(url, html, renderer.origin());
            if !page.blocked {
                info!("Recovered {} via {} renderer", url, renderer.name());
                return Some(page);
            }
            debug!("{} renderer still returned a challenge page for {}", renderer.name(), url);
        }
        None
    }
}
