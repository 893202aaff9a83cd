//! Price catalog contract
//!
//! A catalog answers batches of filter queries. For each query it returns
//! every price record that satisfies both the product filter and the price
//! filter; the number of records decides the outcome:
//!
//! | records | outcome     |
//! |---------|-------------|
//! | 0       | `NotFound`  |
//! | 1       | `Priced`    |
//! | > 1     | `Ambiguous` |
//!
//! Ambiguous matches are never resolved by picking one of the records.

use async_trait::async_trait;
use costplan_core::error::{CostplanError, Result};
use costplan_core::types::{AttributeMatch, PriceFilter, PriceState, ProductFilter};
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A normalized filter pair; the unit of deduplication and caching
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PriceQuery {
    /// Product selection
    pub product_filter: ProductFilter,
    /// Price selection
    pub price_filter: PriceFilter,
}

impl PriceQuery {
    /// Build a query from filters, normalizing them
    pub fn new(product_filter: &ProductFilter, price_filter: &PriceFilter) -> Self {
        Self {
            product_filter: product_filter.normalized(),
            price_filter: price_filter.normalized(),
        }
    }
}

/// One price returned by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Catalog identity of the price
    pub price_hash: String,
    /// Price per unit in the requested currency
    pub unit_price: Decimal,
}

/// An external source of prices
#[async_trait]
pub trait PriceCatalog: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Look up a batch of queries
    ///
    /// On success the outer vector is aligned with `queries`. An error means
    /// the whole batch failed in transport and may be retried.
    async fn lookup(&self, queries: &[PriceQuery]) -> Result<Vec<Vec<PriceRecord>>>;
}

/// Map the records matched by one query to a price state
///
/// Records repeating the same price hash count once. Records without a hash
/// are never merged.
pub fn classify(records: &[PriceRecord]) -> PriceState {
    let mut distinct: Vec<&PriceRecord> = Vec::with_capacity(records.len());
    for record in records {
        let repeated = !record.price_hash.is_empty()
            && distinct.iter().any(|r| r.price_hash == record.price_hash);
        if !repeated {
            distinct.push(record);
        }
    }

    match distinct.as_slice() {
        [] => PriceState::NotFound,
        [only] => PriceState::Priced {
            unit_price: only.unit_price,
        },
        many => PriceState::Ambiguous {
            matches: many.len(),
        },
    }
}

/// Compile an attribute pattern
///
/// Patterns may be written bare (`PaidPrivateCA`) or delimited
/// (`/PaidPrivateCA/`, `/paidprivateca/i`).
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    let (body, case_insensitive) = match pattern.strip_prefix('/') {
        Some(rest) => match rest.rfind('/') {
            Some(end) => (&rest[..end], rest[end + 1..].contains('i')),
            None => (pattern, false),
        },
        None => (pattern, false),
    };

    RegexBuilder::new(body)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| CostplanError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Check every pattern of a product filter compiles
pub fn validate_patterns(filter: &ProductFilter) -> Result<()> {
    for attribute in &filter.attribute_filters {
        if let AttributeMatch::Pattern(pattern) = &attribute.matcher {
            compile_pattern(pattern)?;
        }
    }
    Ok(())
}
