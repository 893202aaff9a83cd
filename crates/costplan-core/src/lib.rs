//! Core types, traits, and utilities for costplan
//!
//! This crate provides the resource and cost-component data model, the
//! tiered usage resolver, the resource registry, error handling, and engine
//! configuration shared by all other costplan crates.

pub mod config;
pub mod error;
pub mod provider;
pub mod registry;
pub mod types;
pub mod usage;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{CostplanError, Result};
pub use registry::{Registry, RegistryItem, UsagePolicy};
pub use types::{
    AttributeFilter, AttributeMatch, CostComponent, PriceFilter, PriceState, ProductFilter,
    Quantity, Resource, ResourceDescriptor, UsageRecord,
};
