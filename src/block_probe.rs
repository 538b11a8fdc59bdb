//! Recognition of bot-defense challenge pages.
//!
//! A challenge page replaces the real product page when the anti-automation
//! layer in front of a shop decides the request looks scripted. Nothing on such
//! a page says anything about stock, so a positive here stops inference.

use regex::Regex;
use std::sync::LazyLock;

/// Vendor fingerprints, matched against the lowercased page.
const CHALLENGE_FINGERPRINTS: &[&str] = &[
    "_incapsula_resource",
    "/_/incapsula_resource?",
    "visid_incap",
    "incap_ses",
    "incapsula",
    "request unsuccessful",
];

/// Markup a genuine product page is expected to carry somewhere.
const PRODUCT_MARKERS: &[&str] = &[
    "application/ld+json",
    "itemprop=",
    "<form",
    "add to cart",
    "ajouter au panier",
];

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid meta tag pattern"));

/// Return the fingerprint that marks `html` as a challenge page, if any.
pub fn detect_block(html: &str) -> Option<&'static str> {
    let lower = html.to_lowercase();

    if let Some(token) = CHALLENGE_FINGERPRINTS.iter().find(|t| lower.contains(*t)) {
        return Some(token);
    }

    // A noindex page only counts when it also lacks every product marker.
    if has_noindex_meta(&lower) && !PRODUCT_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some("noindex");
    }

    None
}

pub fn is_block_page(html: &str) -> bool {
    detect_block(html).is_some()
}

fn has_noindex_meta(lower: &str) -> bool {
    META_TAG
        .find_iter(lower)
        .map(|m| m.as_str())
        .any(|tag| tag.contains("robots") && tag.contains("noindex"))
}
