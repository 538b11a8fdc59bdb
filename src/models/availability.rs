use serde::{Deserialize, Serialize};
use std::fmt;

/// Label used for items that are tracked without sizes.
pub const ANY_SIZE: &str = "__any__";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Available,
    Unavailable,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Available => "available",
            Verdict::Unavailable => "unavailable",
            Verdict::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Ordered size label -> in stock mapping. Order follows the item's
/// configured sizes so messages list them the way they were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockMap {
    entries: Vec<(String, bool)>,
}

impl StockMap {
    /// Map for an item without sizes.
    pub fn single(available: bool) -> Self {
        Self {
            entries: vec![(ANY_SIZE.to_string(), available)],
        }
    }

    pub fn from_sizes<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        let mut map = Self::default();
        for (label, available) in entries {
            map.set(label, available);
        }
        map
    }

    /// Insert or overwrite a label, keeping its original position.
    pub fn set(&mut self, label: impl Into<String>, available: bool) {
        let label = label.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = available,
            None => self.entries.push((label, available)),
        }
    }

    pub fn get(&self, label: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, available)| *available)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(l, a)| (l.as_str(), *a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.entries.len() == 1 && self.entries[0].0 == ANY_SIZE
    }

    pub fn any_available(&self) -> bool {
        self.entries.iter().any(|(_, available)| *available)
    }

    pub fn available_labels(&self) -> Vec<&str> {
        self.iter().filter(|(_, a)| *a).map(|(l, _)| l).collect()
    }

    pub fn unavailable_labels(&self) -> Vec<&str> {
        self.iter().filter(|(_, a)| !*a).map(|(l, _)| l).collect()
    }
}

impl fmt::Display for StockMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            let verdict = if self.any_available() {
                Verdict::Available
            } else {
                Verdict::Unavailable
            };
            return write!(f, "{}", verdict);
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(label, available)| format!("{}: {}", label, if available { "in" } else { "out" }))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Outcome of resolving one item. `Unknown` means the page could not be
/// judged (for example a challenge page survived every retrieval strategy)
/// and is never treated as a stock change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Known(StockMap),
}

impl Availability {
    pub fn single(available: bool) -> Self {
        Availability::Known(StockMap::single(available))
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            Availability::Unknown => Verdict::Unknown,
            Availability::Known(map) if map.any_available() => Verdict::Available,
            Availability::Known(_) => Verdict::Unavailable,
        }
    }

    pub fn stock(&self) -> Option<&StockMap> {
        match self {
            Availability::Unknown => None,
            Availability::Known(map) => Some(map),
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Unknown => write!(f, "{}", Verdict::Unknown),
            Availability::Known(map) => write!(f, "{}", map),
        }
    }
}
