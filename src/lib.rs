//! costplan - Estimate the monthly cost of planned infrastructure resources
//!
//! This library provides functionality to:
//! - Dispatch resource descriptors to per-type cost-component builders
//! - Resolve component prices against a pricing catalog with batching,
//!   deduplication, and bounded concurrency
//! - Aggregate priced trees into totals and before/after deltas
//! - Render reports in table and JSON formats
//!
//! # Examples
//!
//! ```no_run
//! use costplan::evaluation::Evaluator;
//! use costplan_core::provider::ResourceProvider;
//! use costplan_core::{EngineConfig, Registry, ResourceDescriptor};
//! use costplan_core::types::UsageMap;
//! use costplan_pricing::HttpCatalog;
//! use costplan_provider_aws::AwsProvider;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> costplan_core::Result<()> {
//!     let config = EngineConfig::default();
//!     let providers: [&dyn ResourceProvider; 1] = [&AwsProvider];
//!     let registry = Arc::new(Registry::from_providers(&providers));
//!     let catalog = Arc::new(HttpCatalog::new(&config)?);
//!     let evaluator = Evaluator::new(registry, catalog, config);
//!
//!     let descriptors = vec![ResourceDescriptor::new(
//!         "aws_nat_gateway",
//!         "aws_nat_gateway.main",
//!         "us-east-1",
//!     )];
//!     let report = evaluator
//!         .evaluate(descriptors, &UsageMap::new(), CancellationToken::new())
//!         .await?;
//!     println!("{}", report.total);
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod evaluation;
pub mod input;
pub mod output;

// Re-export commonly used types
pub use aggregation::{CostDiff, CostReport, RunStatus};
pub use costplan_core::{CostplanError, Result};
pub use evaluation::{DiffReport, Evaluator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
