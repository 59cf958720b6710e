use crate::adapters::RawRecord;
use crate::record::{Price, ProductRecord};
use crate::ValidationError;
use std::fmt;

/// A raw record the normalizer refused, with enough context to log it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub entry: usize,
    pub page: u32,
    pub reason: ValidationError,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} entry {}: {}", self.page, self.entry, self.reason)
    }
}

/// Converts one raw record into the canonical shape
///
/// Pure: the same raw record always yields the same result.
pub fn normalize(raw: RawRecord, source: &str) -> Result<ProductRecord, Rejection> {
    let reject = |reason| Rejection {
        entry: raw.entry,
        page: raw.page,
        reason,
    };

    let name = clean_text(raw.name.as_deref()).ok_or_else(|| reject(ValidationError::MissingName))?;
    let price = parse_amount("price", raw.price_text.as_deref()).map_err(&reject)?;
    let unit_price = parse_amount("unit_price", raw.unit_price_text.as_deref()).map_err(&reject)?;

    Ok(ProductRecord {
        name,
        brand: clean_text(raw.brand.as_deref()),
        price,
        unit_price,
        unit_label: clean_text(raw.unit_label.as_deref()),
        size: clean_text(raw.size.as_deref()),
        promo: clean_text(raw.promo.as_deref()),
        source: source.to_string(),
        page: raw.page,
        source_url: raw.source_url,
    })
}

/// Lazily normalizes a stream of raw records, one at a time
pub fn normalize_all<'a, I>(
    raws: I,
    source: &'a str,
) -> impl Iterator<Item = Result<ProductRecord, Rejection>> + 'a
where
    I: IntoIterator<Item = RawRecord>,
    I::IntoIter: 'a,
{
    raws.into_iter().map(move |raw| normalize(raw, source))
}

/// Trims and collapses whitespace; blank text becomes absent
fn clean_text(text: Option<&str>) -> Option<String> {
    let collapsed = text?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn parse_amount(field: &'static str, text: Option<&str>) -> Result<Option<Price>, ValidationError> {
    let Some(text) = text else {
        return Ok(None);
    };
    Price::parse(text).map_err(|_| ValidationError::OutOfRange {
        field,
        value: text.trim().to_string(),
    })
}
