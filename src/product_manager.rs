use tokio::time::Instant;
use tracing::{debug, info};

use crate::models::{Availability, ItemKey, MonitoredItem, StockMap};
use crate::plugins::manager::ResolverRegistry;
use crate::scraper::PageSources;
use crate::state_tracker::{ChangeEvent, StateTracker};
use crate::utils::Result;

#[derive(Debug, Clone)]
pub struct ItemCheck {
    pub key: ItemKey,
    pub availability: Availability,
    pub event: Option<ChangeEvent>,
    /// Notification text, present when `event` is.
    pub message: Option<String>,
    pub elapsed_ms: u64,
}

/// Resolves items through their site's resolver and turns state changes
/// into notification text.
pub struct ProductManager {
    registry: ResolverRegistry,
    tracker: StateTracker,
}

impl ProductManager {
    pub fn new(registry: ResolverRegistry) -> Self {
        Self {
            registry,
            tracker: StateTracker::new(),
        }
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub async fn check_item(&mut self, sources: &PageSources, item: &MonitoredItem) -> Result<ItemCheck> {
        let start_time = Instant::now();
        let resolver = self.registry.get(&item.site)?;

        let availability = resolver.resolve(sources, item).await?;
        let key = item.key();
        info!("[{}] {} - {} status: {}", item.site, item.name, item.color, availability);

        let event = self.tracker.evaluate(&key, &availability);
        let message = event.as_ref().map(|event| {
            debug!(
                "{}: newly available {:?}, newly unavailable {:?}",
                key, event.newly_available, event.newly_unavailable
            );
            format_message(item, &event.current)
        });

        Ok(ItemCheck {
            key,
            availability,
            event,
            message,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

/// Render the notification for an item's current stock.
pub fn format_message(item: &MonitoredItem, stock: &StockMap) -> String {
    let mut lines = vec![format!("{} {} - {}", item.site, item.name, item.color)];

    // Resolvers without per-size detail report one item-wide label even
    // when sizes are configured.
    if stock.is_single() {
        if stock.any_available() {
            lines.push("✅ Available".to_string());
        } else {
            lines.push("❌ Unavailable".to_string());
        }
    } else {
        let available = stock.available_labels();
        let unavailable = stock.unavailable_labels();
        if !available.is_empty() {
            lines.push(format!("✅ Available: {}", available.join(", ")));
        }
        if !unavailable.is_empty() {
            lines.push(format!("❌ Unavailable: {}", unavailable.join(", ")));
        }
    }

    lines.join("\n")
}
