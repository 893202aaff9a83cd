//! Price catalog clients and cost calculation for costplan
//!
//! This crate resolves cost-component filters to unit prices against an
//! external pricing catalog (or an offline price book) and computes the
//! monthly cost of priced components.

pub mod catalog;
pub mod cost_calculator;
pub mod http_catalog;
pub mod price_resolver;
pub mod static_catalog;

pub use catalog::{PriceCatalog, PriceQuery, PriceRecord};
pub use cost_calculator::{ComponentCost, CostCalculator, UnresolvedReason};
pub use http_catalog::HttpCatalog;
pub use price_resolver::{PriceResolver, ResolverStats};
pub use static_catalog::StaticCatalog;
