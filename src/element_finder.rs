use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

/// Ancestor levels inspected when deciding whether an element is hidden.
const ANCESTOR_DEPTH: usize = 4;

// Exact class tokens only. Breakpoint utilities such as `hidden-sm` or
// `d-md-none` hide at some widths and must not count.
const SELF_DISABLE_CLASSES: &[&str] = &[
    "disabled",
    "is-disabled",
    "disabled-button",
    "soldout",
    "is-hidden",
    "sr-only",
];
const ANCESTOR_HIDE_CLASSES: &[&str] = &["d-none", "hidden", "visually-hidden", "sr-only", "is-hidden"];

const SELF_HIDE_STYLES: &[&str] = &[
    "display:none",
    "visibility:hidden",
    "pointer-events:none",
    "opacity:0",
];
const ANCESTOR_HIDE_STYLES: &[&str] = &["display:none", "visibility:hidden"];

pub const ADD_TO_CART_PHRASES: &[&str] = &["add to cart", "ajouter au panier", "add to bag", "add to basket"];
pub const ADD_TO_CART_IDENTIFIERS: &[&str] = &["product-add-to-cart", "addlineitem"];

const SIZE_WORDS: &[&str] = &["xs", "s", "m", "l", "xl", "xxl"];

/// Containers that hold the purchase controls of the product on display.
static SCOPE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("form, [data-qa='product-page'], .pdp, .product-page, .product-detail")
        .expect("valid product scope selector")
});

static ADD_TO_CART_CANDIDATES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("button, a, input, [data-qa], [data-oc-click]").expect("valid add to cart selector")
});

static SIZE_CANDIDATES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("button, a, [data-size], [data-variant], [data-qa]").expect("valid size selector")
});

/// Whether a real user could click `el` right now: not disabled, not hidden
/// by its own attributes, and not inside a hidden container.
pub fn is_element_enabled(el: ElementRef<'_>) -> bool {
    let attrs = el.value();

    if attrs.attr("disabled").is_some() || attrs.attr("hidden").is_some() {
        return false;
    }
    if is_truthy(attrs.attr("aria-disabled")) || is_truthy(attrs.attr("aria-hidden")) {
        return false;
    }
    if attrs
        .attr("data-available")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "false" | "0"))
        .unwrap_or(false)
    {
        return false;
    }
    if has_class_token(el, SELF_DISABLE_CLASSES) || style_contains(el, SELF_HIDE_STYLES) {
        return false;
    }

    !el.ancestors()
        .take(ANCESTOR_DEPTH)
        .filter_map(ElementRef::wrap)
        .any(|parent| {
            is_truthy(parent.value().attr("aria-hidden"))
                || parent.value().attr("hidden").is_some()
                || style_contains(parent, ANCESTOR_HIDE_STYLES)
                || has_class_token(parent, ANCESTOR_HIDE_CLASSES)
        })
}

fn is_truthy(value: Option<&str>) -> bool {
    value
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1"))
        .unwrap_or(false)
}

fn has_class_token(el: ElementRef<'_>, tokens: &[&str]) -> bool {
    el.value()
        .classes()
        .any(|class| tokens.contains(&class.to_lowercase().as_str()))
}

fn style_contains(el: ElementRef<'_>, needles: &[&str]) -> bool {
    let Some(style) = el.value().attr("style") else {
        return false;
    };
    let normalized: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    needles.iter().any(|needle| normalized.contains(needle))
}

/// Narrow the search for purchase controls to the product form or detail
/// container, falling back to the whole document.
pub fn product_scope(document: &Html) -> ElementRef<'_> {
    document
        .select(&SCOPE_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element())
}

/// Whether `scope` holds an enabled control that adds the product to the cart.
pub fn has_add_to_cart(scope: ElementRef<'_>) -> bool {
    scope
        .select(&ADD_TO_CART_CANDIDATES)
        .filter(|el| is_add_to_cart_candidate(*el))
        .filter(|el| {
            let label = control_label(*el);
            ADD_TO_CART_PHRASES.iter().any(|p| label.contains(p))
                || ADD_TO_CART_IDENTIFIERS.iter().any(|id| label.contains(id))
        })
        .any(is_element_enabled)
}

fn is_add_to_cart_candidate(el: ElementRef<'_>) -> bool {
    let attrs = el.value();
    match attrs.name() {
        "button" => return true,
        "a" if is_role_button(el) => return true,
        "input" if attrs.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("submit")) => return true,
        _ => {}
    }
    lower_attr(el, "data-qa").contains("add-to-cart") || lower_attr(el, "data-oc-click").contains("addlineitem")
}

/// Everything a control says about itself, lowercased and space-joined.
fn control_label(el: ElementRef<'_>) -> String {
    let text = el
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let mut parts = vec![text.to_lowercase()];
    for name in ["value", "aria-label", "title", "data-qa", "data-oc-click"] {
        parts.push(lower_attr(el, name));
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

/// Whether `scope` offers at least one enabled size button labeled with a
/// bare size token.
pub fn any_size_enabled(scope: ElementRef<'_>) -> bool {
    scope
        .select(&SIZE_CANDIDATES)
        .filter(|el| is_size_candidate(*el))
        .filter(|el| SIZE_WORDS.contains(&size_label(*el).as_str()))
        .any(is_element_enabled)
}

fn is_size_candidate(el: ElementRef<'_>) -> bool {
    let attrs = el.value();
    attrs.name() == "button"
        || (attrs.name() == "a" && is_role_button(el))
        || attrs.attr("data-size").is_some()
        || attrs.attr("data-variant").is_some()
        || lower_attr(el, "data-qa").contains("size")
}

fn size_label(el: ElementRef<'_>) -> String {
    let text: String = el.text().map(str::trim).collect();
    let label = if text.is_empty() {
        el.value()
            .attr("data-size")
            .filter(|v| !v.is_empty())
            .or_else(|| el.value().attr("aria-label"))
            .unwrap_or_default()
            .to_string()
    } else {
        text
    };
    label.to_lowercase()
}

fn is_role_button(el: ElementRef<'_>) -> bool {
    el.value()
        .attr("role")
        .is_some_and(|r| r.eq_ignore_ascii_case("button"))
}

fn lower_attr(el: ElementRef<'_>, name: &str) -> String {
    el.value().attr(name).unwrap_or_default().to_lowercase()
}

/// Lowercased text a visitor would see: script, style and template bodies
/// are left out.
pub fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        let hidden = node.ancestors().filter_map(ElementRef::wrap).any(|parent| {
            matches!(parent.value().name(), "script" | "style" | "noscript" | "template")
        });
        if !hidden {
            parts.push(trimmed.to_lowercase());
        }
    }
    parts.join(" ")
}

/// Case-insensitive containment of any needle; needles must be lowercase.
pub fn text_has_any(haystack_lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack_lower.contains(needle))
}
