use crate::adapters::Rules;
use crate::config::{HtmlRules, JsonRules};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub(crate) const DEFAULT_ACCEPT_LANGUAGE: &str = "fr-FR,fr;q=0.9,en;q=0.8";

/// Body fragments that only an anti-bot interstitial carries
///
/// Widgets embedded in ordinary pages (reCAPTCHA on a newsletter form, for
/// one) must not match.
pub const DEFAULT_CHALLENGE_MARKERS: &[&str] = &[
    "cf-challenge",
    "cf-chl-",
    "challenge-platform",
    "<title>just a moment",
    "<title>attention required",
];

const PRESETS: &[&str] = &["franprix", "monoprix", "carrefour"];

/// Built-in rule set for a known site
#[derive(Debug, Clone)]
pub(crate) struct Preset {
    pub start_url: &'static str,
    pub rules: Rules,
    pub referer: Option<&'static str>,
    pub accept: Option<&'static str>,
}

/// Names accepted by `preset = "..."`
pub fn preset_names() -> &'static [&'static str] {
    PRESETS
}

pub(crate) fn lookup(name: &str) -> Option<Preset> {
    match name {
        "franprix" => Some(franprix()),
        "monoprix" => Some(monoprix()),
        "carrefour" => Some(carrefour()),
        _ => None,
    }
}

/// Server-rendered promotion grid, `?page=N` links, details as a span list
fn franprix() -> Preset {
    Preset {
        start_url: "https://www.franprix.fr/courses/promotions",
        rules: Rules::Html(HtmlRules {
            entry: "div.product-item-content-resume".to_string(),
            name: "span.product-item-name".to_string(),
            details: Some("div.product-item-more > span".to_string()),
            brand_index: Some(0),
            size_index: Some(1),
            price: Some("div.product-item-price > span".to_string()),
            unit_price: Some("span.product-item-priceperkilo".to_string()),
            promo: Some("div.product-item__promo__regular > span".to_string()),
            page_param: Some("page".to_string()),
        }),
        referer: Some("https://www.franprix.fr/"),
        accept: Some("text/html,application/xhtml+xml"),
    }
}

/// Catalogue API keyed by product id, continuation token in the envelope
fn monoprix() -> Preset {
    Preset {
        start_url: "https://courses.monoprix.fr/api/v6/products",
        rules: Rules::Json(JsonRules {
            records: "/entities/product".to_string(),
            name: "/name".to_string(),
            brand: Some("/brand".to_string()),
            price: Some("/price/current/amount".to_string()),
            unit_price: Some("/price/unit/current/amount".to_string()),
            unit_label: Some("/price/unit/label".to_string()),
            size: Some("/size/value".to_string()),
            promo: Some("/offer/description".to_string()),
            next_token: Some("/result/nextPageToken".to_string()),
            token_param: "pageToken".to_string(),
        }),
        referer: Some("https://courses.monoprix.fr/"),
        accept: Some("application/json"),
    }
}

/// Single listing page, usually served behind a challenge
fn carrefour() -> Preset {
    Preset {
        start_url: "https://www.carrefour.fr/promotions",
        rules: Rules::Html(HtmlRules {
            entry: "div.product-list-card-plp-grid__infos".to_string(),
            name: "a h3".to_string(),
            details: None,
            brand_index: None,
            size_index: None,
            price: None,
            unit_price: None,
            promo: None,
            page_param: None,
        }),
        referer: Some("https://www.carrefour.fr/"),
        accept: Some("text/html,application/xhtml+xml"),
    }
}
