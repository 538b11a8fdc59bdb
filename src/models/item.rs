use serde::{Deserialize, Serialize};
use std::fmt;

/// A product page to watch, as listed in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitoredItem {
    pub site: String,
    pub name: String,
    pub url: String,
    pub color: String,
    #[serde(default)]
    pub sizes: Vec<String>,
}

impl MonitoredItem {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            site: self.site.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }

    pub fn has_sizes(&self) -> bool {
        !self.sizes.is_empty()
    }
}

/// State slot of an item. Two entries for the same page with different
/// colors are tracked independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub site: String,
    pub name: String,
    pub color: String,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} - {}", self.site, self.name, self.color)
    }
}
