use async_trait::async_trait;

use crate::config::Template;
use crate::models::{Availability, MonitoredItem};
use crate::scraper::PageSources;
use crate::utils::Result;

/// Trait for implementing per-template stock resolution.
#[async_trait]
pub trait AvailabilityResolver: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn template(&self) -> Template;

    /// Fetch the item's page through `sources` and decide its availability.
    /// Transport failures are errors; an undecidable page is
    /// `Availability::Unknown`.
    async fn resolve(&self, sources: &PageSources, item: &MonitoredItem) -> Result<Availability>;
}
