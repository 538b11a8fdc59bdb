use serde::{Deserialize, Serialize};

use crate::block_probe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageOrigin {
    Direct,
    Browser,
    Proxy,
}

/// A fetched document. Lives for a single resolve call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub text: String,
    pub blocked: bool,
    pub origin: PageOrigin,
}

impl RawPage {
    /// Wrap fetched text, running the block probe over it.
    pub fn new(url: impl Into<String>, text: String, origin: PageOrigin) -> Self {
        let blocked = block_probe::is_block_page(&text);
        Self {
            url: url.into(),
            text,
            blocked,
            origin,
        }
    }
}
