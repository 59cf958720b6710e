//! End-to-end tests against mock listing sites

mod crawl_tests;
mod fetch_tests;
mod query_tests;

use promo_harvest::config::{parse_config, Config};
use std::path::Path;

/// Builds a config with fast politeness and retry settings
///
/// `sources` is appended verbatim and should hold one or more `[[source]]`
/// tables.
pub fn test_config(db_path: &Path, sources: &str) -> Config {
    let content = format!(
        r#"
[crawler]
max-pages = 20
job-deadline-secs = 30

[fetch]
request-timeout-secs = 1
connect-timeout-secs = 1
max-retries = 2
backoff-base-ms = 10
request-delay-ms = 0
delay-jitter-ms = 0

[storage]
database-path = "{}"
pool-size = 2
insert-retries = 2

{}
"#,
        db_path.display(),
        sources
    );
    parse_config(&content).expect("test config should be valid")
}

/// An HTML source with the card layout used by the listing fixtures
pub fn html_source(name: &str, start_url: &str) -> String {
    format!(
        r#"
[[source]]
name = "{}"
start-url = "{}"

[source.html]
entry = "div.card"
name = "span.name"
details = "div.more > span"
brand-index = 0
size-index = 1
price = "div.price > span"
unit-price = "span.per-kilo"
promo = "div.promo"
page-param = "page"
"#,
        name, start_url
    )
}

/// One listing card
pub fn card(name: &str, brand: &str, size: &str, price: &[&str], per_kilo: &str) -> String {
    let fragments: String = price
        .iter()
        .map(|p| format!("<span>{}</span>", p))
        .collect();
    format!(
        r#"<div class="card">
  <span class="name">{}</span>
  <div class="more"><span>{}</span><span>{}</span></div>
  <div class="price">{}</div>
  <span class="per-kilo">{}</span>
  <div class="promo">2 for 1</div>
</div>"#,
        name, brand, size, fragments, per_kilo
    )
}

/// A listing page; `next` is the href of the following page, if any
pub fn listing(cards: &[String], next: Option<&str>) -> String {
    let link = next
        .map(|href| format!(r#"<a class="next" href="{}">next</a>"#, href))
        .unwrap_or_default();
    format!(
        "<html><body><main>{}</main><nav>{}</nav></body></html>",
        cards.join("\n"),
        link
    )
}
