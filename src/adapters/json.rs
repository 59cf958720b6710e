use crate::adapters::{RawRecord, Request, SiteAdapter};
use crate::config::JsonRules;
use crate::crawler::FetchedPage;
use crate::state::CrawlJob;
use crate::url::with_query_param;
use crate::{ConfigError, ExtractionError};
use serde_json::Value;
use url::Url;

/// Adapter for JSON catalogue APIs paginated by a continuation token
///
/// Fields are addressed with JSON pointers (RFC 6901). The record pointer may
/// address an array or an object keyed by product id; object collections are
/// read in document order.
#[derive(Debug)]
pub struct JsonCatalogAdapter {
    source: String,
    start_url: Url,
    rules: JsonRules,
}

impl JsonCatalogAdapter {
    pub fn new(source: &str, start_url: Url, rules: JsonRules) -> Result<Self, ConfigError> {
        check_pointer(&rules.records)?;
        check_pointer(&rules.name)?;
        for pointer in [
            &rules.brand,
            &rules.price,
            &rules.unit_price,
            &rules.unit_label,
            &rules.size,
            &rules.promo,
            &rules.next_token,
        ]
        .into_iter()
        .flatten()
        {
            check_pointer(pointer)?;
        }

        if rules.next_token.is_some() && rules.token_param.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}': token-param cannot be empty",
                source
            )));
        }

        Ok(Self {
            source: source.to_string(),
            start_url,
            rules,
        })
    }

    fn extract_entry(
        &self,
        index: usize,
        entry: &Value,
        page: &FetchedPage,
    ) -> Result<RawRecord, ExtractionError> {
        if !entry.is_object() {
            return Err(ExtractionError::Malformed {
                entry: index,
                message: format!("expected an object, found {}", kind(entry)),
            });
        }

        let name = entry
            .pointer(&self.rules.name)
            .and_then(text)
            .ok_or(ExtractionError::MissingField {
                entry: index,
                field: "name",
            })?;

        let field = |pointer: &Option<String>| pointer.as_deref().and_then(|p| entry.pointer(p));

        Ok(RawRecord {
            entry: index,
            page: page.request.page,
            source_url: page.final_url.to_string(),
            name: Some(name),
            brand: field(&self.rules.brand).and_then(text),
            price_text: field(&self.rules.price).and_then(amount),
            unit_price_text: field(&self.rules.unit_price).and_then(amount),
            unit_label: field(&self.rules.unit_label).and_then(text),
            size: field(&self.rules.size).and_then(text),
            promo: field(&self.rules.promo).and_then(text),
        })
    }
}

impl SiteAdapter for JsonCatalogAdapter {
    fn source(&self) -> &str {
        &self.source
    }

    fn initial_request(&self) -> Request {
        Request::first(self.start_url.clone())
    }

    fn extract(&self, page: &FetchedPage) -> Vec<Result<RawRecord, ExtractionError>> {
        let document: Value = match serde_json::from_str(&page.body) {
            Ok(value) => value,
            Err(e) => return vec![Err(ExtractionError::Decode(e.to_string()))],
        };

        let entries: Vec<&Value> = match document.pointer(&self.rules.records) {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Object(map)) => map.values().collect(),
            Some(other) => {
                return vec![Err(ExtractionError::Decode(format!(
                    "'{}' addresses {}, not a collection",
                    self.rules.records,
                    kind(other)
                )))]
            }
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| self.extract_entry(index, entry, page))
            .collect()
    }

    fn next_request(&self, page: &FetchedPage, job: &CrawlJob) -> Option<Request> {
        let pointer = self.rules.next_token.as_deref()?;
        let document: Value = serde_json::from_str(&page.body).ok()?;
        let token = document.pointer(pointer).and_then(text)?;

        Some(Request {
            url: with_query_param(&page.request.url, &self.rules.token_param, &token),
            page: job.pages_fetched + 1,
            cursor: Some(token),
        })
    }
}

fn check_pointer(pointer: &str) -> Result<(), ConfigError> {
    if pointer.is_empty() || pointer.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::InvalidPointer(format!(
            "'{}' must be empty or start with '/'",
            pointer
        )))
    }
}

/// Scalar as text; blank strings, nulls and containers are absent
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric amounts rendered with two decimals; strings passed through
fn amount(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| format!("{:.2}", f)),
        _ => text(value),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
