use crate::adapters::{split_unit_price, RawRecord, Request, SiteAdapter};
use crate::config::HtmlRules;
use crate::crawler::FetchedPage;
use crate::state::CrawlJob;
use crate::url::query_param;
use crate::{ConfigError, ExtractionError};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Adapter for server-rendered listing pages
///
/// Entries are located with CSS selectors. Pagination follows an explicit
/// link whose page parameter is exactly one more than the current page.
#[derive(Debug)]
pub struct HtmlListingAdapter {
    source: String,
    start_url: Url,
    entry: Selector,
    name: Selector,
    details: Option<Selector>,
    brand_index: Option<usize>,
    size_index: Option<usize>,
    price: Option<Selector>,
    unit_price: Option<Selector>,
    promo: Option<Selector>,
    page_param: Option<String>,
    links: Selector,
}

impl HtmlListingAdapter {
    /// Compiles the selectors of `rules`
    pub fn new(source: &str, start_url: Url, rules: HtmlRules) -> Result<Self, ConfigError> {
        Ok(Self {
            source: source.to_string(),
            start_url,
            entry: compile(&rules.entry)?,
            name: compile(&rules.name)?,
            details: compile_opt(rules.details.as_deref())?,
            brand_index: rules.brand_index,
            size_index: rules.size_index,
            price: compile_opt(rules.price.as_deref())?,
            unit_price: compile_opt(rules.unit_price.as_deref())?,
            promo: compile_opt(rules.promo.as_deref())?,
            page_param: rules.page_param,
            links: compile("a[href]")?,
        })
    }

    fn extract_entry(
        &self,
        index: usize,
        entry: ElementRef<'_>,
        page: &FetchedPage,
    ) -> Result<RawRecord, ExtractionError> {
        let name = entry
            .select(&self.name)
            .next()
            .map(element_text)
            .ok_or(ExtractionError::MissingField {
                entry: index,
                field: "name",
            })?;

        // Brand and size share one span list and are read by position;
        // empty spans keep their slot, a short list leaves the rest absent.
        let details: Vec<String> = match &self.details {
            Some(selector) => entry.select(selector).map(element_text).collect(),
            None => Vec::new(),
        };
        let positional = |index: Option<usize>| {
            index
                .and_then(|i| details.get(i))
                .filter(|text| !text.is_empty())
                .cloned()
        };

        let price_text = self.price.as_ref().and_then(|selector| {
            let fragments: String = entry
                .select(selector)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .collect();
            (!fragments.is_empty()).then_some(fragments)
        });

        let (unit_price_text, unit_label) = self
            .first_text(entry, self.unit_price.as_ref())
            .map(|text| split_unit_price(&text))
            .unwrap_or((None, None));

        Ok(RawRecord {
            entry: index,
            page: page.request.page,
            source_url: page.final_url.to_string(),
            name: Some(name),
            brand: positional(self.brand_index),
            price_text,
            unit_price_text,
            unit_label,
            size: positional(self.size_index),
            promo: self.first_text(entry, self.promo.as_ref()),
        })
    }

    fn first_text(&self, entry: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
        entry.select(selector?).next().map(element_text)
    }

    fn current_page(&self, url: &Url, param: &str) -> u32 {
        query_param(url, param)
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }
}

impl SiteAdapter for HtmlListingAdapter {
    fn source(&self) -> &str {
        &self.source
    }

    fn initial_request(&self) -> Request {
        Request::first(self.start_url.clone())
    }

    fn extract(&self, page: &FetchedPage) -> Vec<Result<RawRecord, ExtractionError>> {
        let document = Html::parse_document(&page.body);
        document
            .select(&self.entry)
            .enumerate()
            .map(|(index, entry)| self.extract_entry(index, entry, page))
            .collect()
    }

    fn next_request(&self, page: &FetchedPage, job: &CrawlJob) -> Option<Request> {
        let param = self.page_param.as_deref()?;
        let wanted = self.current_page(&page.request.url, param).checked_add(1)?;

        let document = Html::parse_document(&page.body);
        let url = document
            .select(&self.links)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| page.final_url.join(href.trim()).ok())
            .filter(|url| url.scheme() == "http" || url.scheme() == "https")
            .find(|url| {
                query_param(url, param).and_then(|v| v.parse::<u32>().ok()) == Some(wanted)
            })?;

        Some(Request {
            url,
            page: job.pages_fetched + 1,
            cursor: None,
        })
    }
}

/// Text content with whitespace runs collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

fn compile_opt(selector: Option<&str>) -> Result<Option<Selector>, ConfigError> {
    selector.map(compile).transpose()
}
