use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use crate::config::Template;
use crate::models::{Availability, MonitoredItem, StockMap};
use crate::plugins::traits::AvailabilityResolver;
use crate::scraper::PageSources;
use crate::utils::{AppError, Result};

static OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").expect("valid option selector"));

/// Sites that list every color/size combination as an `<option>` of one
/// select control. A `disabled` option is a sold-out combination.
pub struct SelectOptionResolver {
    name: String,
    select_id: String,
    select: Selector,
}

impl SelectOptionResolver {
    pub fn new(name: impl Into<String>, select_id: &str) -> Result<Self> {
        let select = Selector::parse(&format!("select#{}", select_id)).map_err(|e| AppError::Parse {
            message: format!("invalid select id {:?}: {:?}", select_id, e),
        })?;

        Ok(Self {
            name: name.into(),
            select_id: select_id.to_string(),
            select,
        })
    }

    pub fn evaluate(&self, html: &str, item: &MonitoredItem) -> Availability {
        let document = Html::parse_document(html);

        let Some(select) = document.select(&self.select).next() else {
            debug!("[{}] select#{} not found, treating as unavailable", self.name, self.select_id);
            return Availability::Known(all_unavailable(item));
        };

        let mut matching = select
            .select(&OPTION_SELECTOR)
            .filter(|option| trimmed_attr(*option, "data-color") == item.color);

        if !item.has_sizes() {
            let available = matching.any(|option| !is_disabled(option));
            return Availability::Known(StockMap::single(available));
        }

        let mut stock = all_unavailable(item);
        for option in matching {
            let size = trimmed_attr(option, "data-size");
            if item.sizes.iter().any(|s| s == size) {
                stock.set(size, !is_disabled(option));
            }
        }
        Availability::Known(stock)
    }
}

fn all_unavailable(item: &MonitoredItem) -> StockMap {
    if item.has_sizes() {
        StockMap::from_sizes(item.sizes.iter().map(|s| (s.as_str(), false)))
    } else {
        StockMap::single(false)
    }
}

fn trimmed_attr<'a>(option: ElementRef<'a>, name: &str) -> &'a str {
    option.value().attr(name).unwrap_or_default().trim()
}

fn is_disabled(option: ElementRef<'_>) -> bool {
    option.value().attr("disabled").is_some()
}

#[async_trait]
impl AvailabilityResolver for SelectOptionResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn template(&self) -> Template {
        Template::SelectOption
    }

    async fn resolve(&self, sources: &PageSources, item: &MonitoredItem) -> Result<Availability> {
        let page = sources.fetch(&item.url).await?;
        Ok(self.evaluate(&page.text, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PageOrigin, RawPage, ANY_SIZE};
    use crate::scraper::MockPageFetcher;

    const PAGE: &str = r#"
        <html><body>
        <select id="prodattr2" name="attr">
            <option value="">Choose</option>
            <option data-color=" Black " data-size="S" disabled>Black / S</option>
            <option data-color="Black" data-size=" M ">Black / M</option>
            <option data-color="Black" data-size="L">Black / L</option>
            <option data-color="Black" data-size="L" disabled>Black / L (sold out)</option>
            <option data-color="Stone Green" data-size="M" disabled>Stone Green / M</option>
        </select>
        </body></html>
    "#;

    fn item(color: &str, sizes: &[&str]) -> MonitoredItem {
        MonitoredItem {
            site: "trailhead".to_string(),
            name: "Gamma MX Hoody".to_string(),
            url: "https://www.trailheadpaddleshack.ca/gamma.html".to_string(),
            color: color.to_string(),
            sizes: sizes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn resolver() -> SelectOptionResolver {
        SelectOptionResolver::new("trailhead", "prodattr2").unwrap()
    }

    #[test]
    fn test_sizes_follow_disabled_attribute() {
        let result = resolver().evaluate(PAGE, &item("Black", &["S", "M", "XL"]));
        let stock = result.stock().unwrap();

        assert_eq!(stock.get("S"), Some(false));
        assert_eq!(stock.get("M"), Some(true));
        assert_eq!(stock.get("XL"), Some(false));
        assert_eq!(stock.len(), 3);
    }

    #[test]
    fn test_last_matching_option_decides() {
        let result = resolver().evaluate(PAGE, &item("Black", &["L"]));
        assert_eq!(result.stock().unwrap().get("L"), Some(false));
    }

    #[test]
    fn test_sizeless_item_checks_any_option_of_color() {
        let result = resolver().evaluate(PAGE, &item("Black", &[]));
        assert_eq!(result.stock().unwrap().get(ANY_SIZE), Some(true));

        let result = resolver().evaluate(PAGE, &item("Stone Green", &[]));
        assert_eq!(result.stock().unwrap().get(ANY_SIZE), Some(false));

        let result = resolver().evaluate(PAGE, &item("Orange", &[]));
        assert_eq!(result.stock().unwrap().get(ANY_SIZE), Some(false));
    }

    #[test]
    fn test_missing_select_is_unavailable() {
        let html = "<html><body><p>Product discontinued</p></body></html>";

        let result = resolver().evaluate(html, &item("Black", &["M", "L"]));
        let stock = result.stock().unwrap();
        assert_eq!(stock.get("M"), Some(false));
        assert_eq!(stock.get("L"), Some(false));

        let result = resolver().evaluate(html, &item("Black", &[]));
        assert_eq!(result.stock().unwrap().get(ANY_SIZE), Some(false));
    }

    #[test]
    fn test_custom_select_id() {
        let html = r#"<select id="variant"><option data-color="Black" data-size="M">M</option></select>"#;
        let resolver = SelectOptionResolver::new("other", "variant").unwrap();
        let result = resolver.evaluate(html, &item("Black", &["M"]));
        assert_eq!(result.stock().unwrap().get("M"), Some(true));
        assert_eq!(resolver.template(), Template::SelectOption);
    }

    #[test]
    fn test_invalid_select_id_is_rejected() {
        assert!(SelectOptionResolver::new("bad", "not valid!").is_err());
    }

    #[tokio::test]
    async fn test_resolve_fetches_item_url() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url| url == "https://www.trailheadpaddleshack.ca/gamma.html")
            .times(1)
            .returning(|url| Ok(RawPage::new(url, PAGE.to_string(), PageOrigin::Direct)));

        let sources = PageSources::new(Box::new(fetcher));
        let result = resolver().resolve(&sources, &item("Black", &["M"])).await.unwrap();
        assert_eq!(result.stock().unwrap().get("M"), Some(true));
    }

    #[tokio::test]
    async fn test_resolve_ignores_block_probe() {
        // A challenge page without the select still reads as sold out.
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_fetch().returning(|url| {
            Ok(RawPage::new(
                url,
                "<html>Request unsuccessful. Incapsula incident</html>".to_string(),
                PageOrigin::Direct,
            ))
        });

        let sources = PageSources::new(Box::new(fetcher));
        let result = resolver().resolve(&sources, &item("Black", &[])).await.unwrap();
        assert_eq!(result.stock().unwrap().get(ANY_SIZE), Some(false));
    }
}
