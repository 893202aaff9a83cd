//! Offline price book catalog
//!
//! Matches filters against an in-memory list of products loaded from a JSON
//! price book, for runs without network access and for tests.
//!
//! ```json
//! {
//!   "products": [{
//!     "vendor_name": "aws",
//!     "region": "us-east-1",
//!     "service": "AmazonVPC",
//!     "product_family": "NAT Gateway",
//!     "attributes": {"usagetype": "USE1-NatGateway-Hours"},
//!     "prices": [{"price_hash": "nat-hours", "unit_price": "0.045"}]
//!   }]
//! }
//! ```

use crate::catalog::{PriceCatalog, PriceQuery, PriceRecord, compile_pattern};
use async_trait::async_trait;
use costplan_core::error::Result;
use costplan_core::types::{AttributeMatch, PriceFilter, ProductFilter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Contents of a price book file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceBook {
    /// Products with their prices
    #[serde(default)]
    pub products: Vec<CatalogProduct>,
}

/// A product as listed in a price book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub vendor_name: String,
    #[serde(default)]
    pub region: Option<String>,
    pub service: String,
    pub product_family: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub prices: Vec<CatalogPrice>,
}

/// A price of a price book product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPrice {
    pub price_hash: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub purchase_option: Option<String>,
    #[serde(default)]
    pub start_usage_amount: Option<Decimal>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl CatalogProduct {
    fn matches(&self, filter: &ProductFilter) -> bool {
        if self.vendor_name != filter.vendor_name
            || self.service != filter.service
            || self.product_family != filter.product_family
        {
            return false;
        }
        if filter.region.is_some() && self.region != filter.region {
            return false;
        }

        filter.attribute_filters.iter().all(|attribute| {
            let Some(value) = self.attributes.get(&attribute.key) else {
                return false;
            };
            match &attribute.matcher {
                AttributeMatch::Exact(expected) => value == expected,
                AttributeMatch::Pattern(pattern) => {
                    compile_pattern(pattern).is_ok_and(|re| re.is_match(value))
                }
            }
        })
    }
}

impl CatalogPrice {
    fn matches(&self, filter: &PriceFilter) -> bool {
        fn field_matches<T: PartialEq>(wanted: &Option<T>, actual: &Option<T>) -> bool {
            wanted.is_none() || wanted == actual
        }

        field_matches(&filter.purchase_option, &self.purchase_option)
            && field_matches(&filter.start_usage_amount, &self.start_usage_amount)
            && field_matches(&filter.unit, &self.unit)
    }
}

/// Catalog backed by a price book held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    book: PriceBook,
}

impl StaticCatalog {
    /// Wrap a price book
    pub fn new(book: PriceBook) -> Self {
        Self { book }
    }

    /// Load a price book file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let book: PriceBook = serde_json::from_str(&raw)?;
        info!(
            "Loaded price book {} with {} products",
            path.display(),
            book.products.len()
        );
        Ok(Self::new(book))
    }

    /// Every price matching one query
    pub fn find(&self, query: &PriceQuery) -> Vec<PriceRecord> {
        self.book
            .products
            .iter()
            .filter(|product| product.matches(&query.product_filter))
            .flat_map(|product| product.prices.iter())
            .filter(|price| price.matches(&query.price_filter))
            .map(|price| PriceRecord {
                price_hash: price.price_hash.clone(),
                unit_price: price.unit_price,
            })
            .collect()
    }
}

#[async_trait]
impl PriceCatalog for StaticCatalog {
    fn name(&self) -> &str {
        "price-book"
    }

    async fn lookup(&self, queries: &[PriceQuery]) -> Result<Vec<Vec<PriceRecord>>> {
        debug!(queries = queries.len(), "Looking up prices in price book");
        Ok(queries.iter().map(|q| self.find(q)).collect())
    }
}
