//! Common test utilities and helpers for costplan tests
//!
//! This module provides a price book covering the AWS builders, a counting
//! catalog wrapper for observing remote calls, and helpers for building
//! evaluators.

#![allow(dead_code)]

use async_trait::async_trait;
use costplan::evaluation::Evaluator;
use costplan_core::config::EngineConfig;
use costplan_core::error::{CostplanError, Result};
use costplan_core::provider::ResourceProvider;
use costplan_core::registry::Registry;
use costplan_core::types::{ResourceDescriptor, UsageMap, UsageRecord};
use costplan_pricing::static_catalog::{CatalogPrice, CatalogProduct, PriceBook};
use costplan_pricing::{PriceCatalog, PriceQuery, PriceRecord, StaticCatalog};
use costplan_provider_aws::AwsProvider;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const REGION: &str = "us-east-1";

fn price(hash: &str, unit_price: &str, start: Option<&str>) -> CatalogPrice {
    CatalogPrice {
        price_hash: hash.to_string(),
        unit_price: Decimal::from_str(unit_price).unwrap(),
        purchase_option: None,
        start_usage_amount: start.map(|s| Decimal::from_str(s).unwrap()),
        unit: None,
    }
}

fn product(
    service: &str,
    family: &str,
    attributes: &[(&str, &str)],
    prices: Vec<CatalogPrice>,
) -> CatalogProduct {
    CatalogProduct {
        vendor_name: "aws".to_string(),
        region: Some(REGION.to_string()),
        service: service.to_string(),
        product_family: family.to_string(),
        attributes: attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        prices,
    }
}

/// Prices for every component the AWS builders emit in us-east-1
pub fn price_book() -> PriceBook {
    PriceBook {
        products: vec![
            product(
                "AmazonEC2",
                "NAT Gateway",
                &[("usagetype", "USE1-NatGateway-Hours")],
                vec![price("nat-hours", "0.045", None)],
            ),
            product(
                "AmazonEC2",
                "NAT Gateway",
                &[("usagetype", "USE1-NatGateway-Bytes")],
                vec![price("nat-bytes", "0.045", None)],
            ),
            product(
                "AWSCertificateManager",
                "AWS Certificate Manager",
                &[("usagetype", "USE1-PaidPrivateCA")],
                vec![price("acm-ca", "400", None)],
            ),
            product(
                "AWSCertificateManager",
                "AWS Certificate Manager",
                &[("usagetype", "USE1-PrivateCertificatesIssued")],
                vec![
                    price("acm-t1", "0.75", Some("0")),
                    price("acm-t2", "0.35", Some("1000")),
                    price("acm-t3", "0.001", Some("10000")),
                ],
            ),
            product(
                "AWSLambda",
                "Serverless",
                &[("usagetype", "USE1-Request")],
                vec![price("lambda-req", "0.0000002", Some("0"))],
            ),
            product(
                "AWSLambda",
                "Serverless",
                &[("usagetype", "USE1-Lambda-GB-Second")],
                vec![price("lambda-gbs", "0.0000166667", Some("0"))],
            ),
            product(
                "AmazonS3",
                "Storage",
                &[
                    ("usagetype", "TimedStorage-ByteHrs"),
                    ("volumeType", "Standard"),
                ],
                vec![
                    price("s3-t1", "0.023", Some("0")),
                    price("s3-t2", "0.022", Some("51200")),
                    price("s3-t3", "0.021", Some("512000")),
                ],
            ),
            product(
                "AmazonS3",
                "API Request",
                &[("usagetype", "USE1-Requests-Tier1")],
                vec![price("s3-put", "0.000005", Some("0"))],
            ),
            product(
                "AmazonS3",
                "API Request",
                &[("usagetype", "USE1-Requests-Tier2")],
                vec![price("s3-get", "0.0000004", Some("0"))],
            ),
        ],
    }
}

/// Catalog wrapper counting calls and queries, optionally failing or slow
pub struct CountingCatalog {
    inner: StaticCatalog,
    calls: AtomicUsize,
    queries: Mutex<Vec<PriceQuery>>,
    failing_services: HashSet<String>,
    delay: Duration,
}

impl CountingCatalog {
    pub fn new(book: PriceBook) -> Self {
        Self {
            inner: StaticCatalog::new(book),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            failing_services: HashSet::new(),
            delay: Duration::ZERO,
        }
    }

    /// Every batch touching `service` fails
    pub fn failing_for(mut self, service: &str) -> Self {
        self.failing_services.insert(service.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every query sent, in call order
    pub fn queries(&self) -> Vec<PriceQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceCatalog for CountingCatalog {
    fn name(&self) -> &str {
        "counting"
    }

    async fn lookup(&self, queries: &[PriceQuery]) -> Result<Vec<Vec<PriceRecord>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().extend_from_slice(queries);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if queries
            .iter()
            .any(|q| self.failing_services.contains(&q.product_filter.service))
        {
            return Err(CostplanError::Catalog("503 Service Unavailable".to_string()));
        }

        self.inner.lookup(queries).await
    }
}

/// Engine settings with short backoff delays
pub fn test_config() -> EngineConfig {
    EngineConfig {
        backoff_base_ms: 1,
        backoff_max_ms: 5,
        ..EngineConfig::default()
    }
}

pub fn registry() -> Arc<Registry> {
    let providers: [&dyn ResourceProvider; 1] = [&AwsProvider];
    Arc::new(Registry::from_providers(&providers))
}

pub fn evaluator(catalog: Arc<CountingCatalog>) -> Evaluator {
    Evaluator::new(registry(), catalog, test_config())
}

pub fn descriptor(resource_type: &str, address: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(resource_type, address, REGION)
}

/// Usage map from `(address, key, value)` triples
pub fn usage(entries: &[(&str, &str, i64)]) -> UsageMap {
    let mut map = UsageMap::new();
    for (address, key, value) in entries {
        let record = map.remove(*address).unwrap_or_else(UsageRecord::new);
        map.insert(address.to_string(), record.with(*key, Decimal::from(*value)));
    }
    map
}
