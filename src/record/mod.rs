//! Canonical product records and the normalizer that produces them
//!
//! Every source, whatever its markup, ends up as a [`ProductRecord`]. The
//! normalizer is a pure function: it never touches the network or storage.

mod normalizer;
mod price;

pub use normalizer::{normalize, normalize_all, Rejection};
pub use price::{Price, PriceOverflow};

use serde::Serialize;

/// Canonical record, created by normalization and never mutated afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    /// Product name; never blank
    pub name: String,
    pub brand: Option<String>,
    pub price: Option<Price>,
    pub unit_price: Option<Price>,
    pub unit_label: Option<String>,
    pub size: Option<String>,
    pub promo: Option<String>,

    /// Source the record was harvested from
    pub source: String,

    /// Page ordinal within the job
    pub page: u32,

    /// URL of the listing page
    pub source_url: String,
}
