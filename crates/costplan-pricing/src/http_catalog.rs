//! HTTP pricing catalog client
//!
//! Sends a batch of filter queries as one POST carrying a JSON array of
//! GraphQL requests, one per query. The response is an array aligned with
//! the request:
//!
//! ```json
//! [{"data": {"products": [{"prices": [{"priceHash": "abc", "USD": "0.75"}]}]}}]
//! ```
//!
//! Anything other than a well-formed, aligned response fails the whole
//! batch; the resolver decides whether and how to retry.

use crate::catalog::{PriceCatalog, PriceQuery, PriceRecord};
use async_trait::async_trait;
use costplan_core::config::EngineConfig;
use costplan_core::error::{CostplanError, Result};
use costplan_core::types::{AttributeMatch, decimal_from_json};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-Api-Key";

/// Prices catalog over HTTP
pub struct HttpCatalog {
    endpoint: String,
    api_key: Option<String>,
    currency: String,
    query: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Variables,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Variables {
    product_filter: ProductFilterVars,
    price_filter: PriceFilterVars,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductFilterVars {
    vendor_name: String,
    service: String,
    product_family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    attribute_filters: Vec<AttributeFilterVars>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttributeFilterVars {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_regex: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceFilterVars {
    #[serde(skip_serializing_if = "Option::is_none")]
    purchase_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_usage_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
}

impl From<&PriceQuery> for Variables {
    fn from(query: &PriceQuery) -> Self {
        let product = &query.product_filter;
        let price = &query.price_filter;
        Self {
            product_filter: ProductFilterVars {
                vendor_name: product.vendor_name.clone(),
                service: product.service.clone(),
                product_family: product.product_family.clone(),
                region: product.region.clone(),
                attribute_filters: product
                    .attribute_filters
                    .iter()
                    .map(|a| match &a.matcher {
                        AttributeMatch::Exact(v) => AttributeFilterVars {
                            key: a.key.clone(),
                            value: Some(v.clone()),
                            value_regex: None,
                        },
                        AttributeMatch::Pattern(p) => AttributeFilterVars {
                            key: a.key.clone(),
                            value: None,
                            value_regex: Some(p.clone()),
                        },
                    })
                    .collect(),
            },
            price_filter: PriceFilterVars {
                purchase_option: price.purchase_option.clone(),
                start_usage_amount: price.start_usage_amount.map(|d| d.normalize().to_string()),
                unit: price.unit.clone(),
            },
        }
    }
}

impl HttpCatalog {
    /// Create a client from engine settings
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            endpoint: config.pricing_api_endpoint.clone(),
            api_key: config.api_key.clone(),
            currency: config.currency.clone(),
            query: price_query(&config.currency),
            client,
        })
    }

    fn request_body<'a>(&'a self, queries: &[PriceQuery]) -> Vec<GraphQlRequest<'a>> {
        queries
            .iter()
            .map(|q| GraphQlRequest {
                query: &self.query,
                variables: Variables::from(q),
            })
            .collect()
    }

    /// Extract the price records of every element of a batch response
    fn parse_response(&self, body: Value, expected: usize) -> Result<Vec<Vec<PriceRecord>>> {
        let Value::Array(items) = body else {
            return Err(CostplanError::Catalog(
                "expected an array response".to_string(),
            ));
        };
        if items.len() != expected {
            return Err(CostplanError::Catalog(format!(
                "expected {expected} results, got {}",
                items.len()
            )));
        }

        items
            .iter()
            .map(|item| self.parse_item(item))
            .collect()
    }

    fn parse_item(&self, item: &Value) -> Result<Vec<PriceRecord>> {
        if let Some(errors) = item.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(CostplanError::Catalog(format!(
                    "catalog returned errors: {}",
                    Value::Array(errors.clone())
                )));
            }
        }

        let products = item
            .pointer("/data/products")
            .and_then(Value::as_array)
            .ok_or_else(|| CostplanError::Catalog("missing data.products".to_string()))?;

        let mut records = Vec::new();
        for product in products {
            let Some(prices) = product.get("prices").and_then(Value::as_array) else {
                continue;
            };
            for price in prices {
                let price_hash = price
                    .get("priceHash")
                    .and_then(Value::as_str)
                    .filter(|hash| !hash.is_empty())
                    .ok_or_else(|| CostplanError::Catalog("price without priceHash".to_string()))?
                    .to_string();
                let unit_price = price
                    .get(&self.currency)
                    .and_then(decimal_from_json)
                    .ok_or_else(|| {
                        CostplanError::Catalog(format!(
                            "price {price_hash} has no {} amount",
                            self.currency
                        ))
                    })?;
                records.push(PriceRecord {
                    price_hash,
                    unit_price,
                });
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl PriceCatalog for HttpCatalog {
    fn name(&self) -> &str {
        "http"
    }

    async fn lookup(&self, queries: &[PriceQuery]) -> Result<Vec<Vec<PriceRecord>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            endpoint = %self.endpoint,
            queries = queries.len(),
            "Sending price catalog batch"
        );

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(queries));
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CostplanError::Catalog(format!(
                "catalog returned HTTP {status}"
            )));
        }

        let body: Value = response.json().await?;
        self.parse_response(body, queries.len())
    }
}

fn price_query(currency: &str) -> String {
    format!(
        "query($productFilter: ProductFilter!, $priceFilter: PriceFilter) {{ \
         products(filter: $productFilter) {{ prices(filter: $priceFilter) {{ priceHash {currency} }} }} }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use costplan_core::types::{AttributeFilter, PriceFilter, ProductFilter};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn catalog() -> HttpCatalog {
        HttpCatalog::new(&EngineConfig::default()).unwrap()
    }

    fn query() -> PriceQuery {
        PriceQuery::new(
            &ProductFilter::new("aws", "AWSCertificateManager", "AWS Certificate Manager")
                .with_region("us-east-1")
                .with_attribute(AttributeFilter::pattern("usagetype", "/PaidPrivateCA/")),
            &PriceFilter::starting_at(dec!(1000)),
        )
    }

    #[test]
    fn test_request_body_shape() {
        let catalog = catalog();
        let body = serde_json::to_value(catalog.request_body(&[query()])).unwrap();
        let vars = &body[0]["variables"];

        assert_eq!(vars["productFilter"]["vendorName"], "aws");
        assert_eq!(vars["productFilter"]["region"], "us-east-1");
        assert_eq!(
            vars["productFilter"]["attributeFilters"][0]["valueRegex"],
            "/PaidPrivateCA/"
        );
        assert_eq!(vars["priceFilter"]["startUsageAmount"], "1000");
        assert!(body[0]["query"].as_str().unwrap().contains("USD"));
    }

    #[test]
    fn test_rejects_currency_outside_code_charset() {
        let config = EngineConfig {
            currency: "USD } x {".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(HttpCatalog::new(&config), Err(CostplanError::Config(_))));
    }

    #[test]
    fn test_parse_response_counts() {
        let catalog = catalog();
        let body = json!([
            {"data": {"products": []}},
            {"data": {"products": [{"prices": [{"priceHash": "a", "USD": "0.75"}]}]}},
            {"data": {"products": [
                {"prices": [{"priceHash": "a", "USD": "0.75"}]},
                {"prices": [{"priceHash": "b", "USD": "0.35"}]}
            ]}}
        ]);

        let records = catalog.parse_response(body, 3).unwrap();
        assert!(records[0].is_empty());
        assert_eq!(records[1][0].unit_price, dec!(0.75));
        assert_eq!(records[2].len(), 2);
    }

    #[test]
    fn test_parse_response_misaligned() {
        let catalog = catalog();
        let body = json!([{"data": {"products": []}}]);
        assert!(matches!(
            catalog.parse_response(body, 2),
            Err(CostplanError::Catalog(_))
        ));
    }

    #[test]
    fn test_parse_response_graphql_errors() {
        let catalog = catalog();
        let body = json!([{"errors": [{"message": "rate limited"}]}]);
        assert!(catalog.parse_response(body, 1).is_err());
    }

    #[test]
    fn test_parse_response_missing_amount() {
        let catalog = catalog();
        let body = json!([{"data": {"products": [{"prices": [{"priceHash": "a", "EUR": "1"}]}]}}]);
        assert!(catalog.parse_response(body, 1).is_err());
    }

    #[test]
    fn test_parse_response_missing_price_hash() {
        let catalog = catalog();
        let body = json!([{"data": {"products": [
            {"prices": [{"USD": "0.045"}]},
            {"prices": [{"USD": "0.090"}]}
        ]}}]);
        assert!(matches!(
            catalog.parse_response(body, 1),
            Err(CostplanError::Catalog(_))
        ));

        let body = json!([{"data": {"products": [{"prices": [{"priceHash": "", "USD": "0.045"}]}]}}]);
        assert!(catalog.parse_response(body, 1).is_err());
    }
}
