use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, info, warn};

use crate::config::{HeuristicsConfig, Template};
use crate::element_finder::{self, text_has_any, ADD_TO_CART_IDENTIFIERS};
use crate::models::{Availability, MonitoredItem};
use crate::plugins::traits::AvailabilityResolver;
use crate::scraper::PageSources;
use crate::structured_data;
use crate::utils::Result;

const STORE_ONLY_PHRASES: &[&str] = &["in-store only", "in store only", "see store availability"];

const SOLD_OUT_PHRASES: &[&str] = &[
    "sold out",
    "out of stock",
    "currently unavailable",
    "rupture de stock",
    "épuisé",
    "indisponible",
];

/// Which step of the cascade produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    StructuredData,
    AddToCart,
    SizeControl,
    RawSourceFallback,
    StoreOnly,
    SoldOutText,
    NoPositiveSignal,
}

/// Sites without an authoritative stock control. Availability is inferred
/// from the strongest signal the page offers.
pub struct HeuristicResolver {
    name: String,
    config: HeuristicsConfig,
}

impl HeuristicResolver {
    pub fn new(name: impl Into<String>, config: HeuristicsConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Decide availability of a page known not to be a challenge page.
    pub fn evaluate(&self, html: &str) -> (bool, Signal) {
        let document = Html::parse_document(html);

        if let Some(available) = structured_data::extract_availability(&document, html) {
            return (available, Signal::StructuredData);
        }

        let scope = element_finder::product_scope(&document);
        if element_finder::has_add_to_cart(scope) {
            return (true, Signal::AddToCart);
        }
        if element_finder::any_size_enabled(scope) {
            return (true, Signal::SizeControl);
        }

        let text = element_finder::visible_text(&document);
        let sold_out = text_has_any(&text, SOLD_OUT_PHRASES);
        let store_only = text_has_any(&text, STORE_ONLY_PHRASES);

        if self.config.aggressive_atc_fallback && !sold_out && !store_only {
            let raw = html.to_lowercase();
            if ADD_TO_CART_IDENTIFIERS.iter().any(|id| raw.contains(id)) || raw.contains("add to cart") {
                return (true, Signal::RawSourceFallback);
            }
        }

        if store_only {
            return (self.config.treat_store_only_as_in_stock, Signal::StoreOnly);
        }
        if sold_out {
            return (false, Signal::SoldOutText);
        }
        (false, Signal::NoPositiveSignal)
    }
}

#[async_trait]
impl AvailabilityResolver for HeuristicResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn template(&self) -> Template {
        Template::Heuristic
    }

    async fn resolve(&self, sources: &PageSources, item: &MonitoredItem) -> Result<Availability> {
        let mut page = sources.fetch(&item.url).await?;

        if page.blocked {
            info!("[{}] {} looks like a challenge page, escalating", self.name, item.url);
            match sources.render_unblocked(&item.url).await {
                Some(rendered) => page = rendered,
                None => {
                    warn!("[{}] still blocked on {}, availability unknown", self.name, item.url);
                    return Ok(Availability::Unknown);
                }
            }
        }

        let (available, signal) = self.evaluate(&page.text);
        debug!(
            "[{}] {} => {} via {:?} ({:?} page)",
            self.name, item.url, available, signal, page.origin
        );
        Ok(Availability::single(available))
    }
}
