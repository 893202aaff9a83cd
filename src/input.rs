//! Plan and usage file loading
//!
//! A resources file is a JSON array of descriptors:
//!
//! ```json
//! [
//!   {"type": "aws_nat_gateway", "address": "aws_nat_gateway.main", "region": "us-east-1"},
//!   {"type": "aws_lambda_function", "address": "aws_lambda_function.api",
//!    "region": "us-east-1", "attributes": {"memory_size": 512}}
//! ]
//! ```
//!
//! A usage file maps resource addresses to usage estimates:
//!
//! ```json
//! {"aws_lambda_function.api": {"monthly_requests": 2000000, "request_duration_ms": 250}}
//! ```

use costplan_core::error::{CostplanError, Result};
use costplan_core::types::{ResourceDescriptor, UsageMap};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Load resource descriptors from a JSON file
pub fn load_descriptors(path: &Path) -> Result<Vec<ResourceDescriptor>> {
    let raw = read(path)?;
    let descriptors: Vec<ResourceDescriptor> = serde_json::from_str(&raw)?;
    validate_descriptors(&descriptors)?;
    info!(
        "Loaded {} resource descriptors from {}",
        descriptors.len(),
        path.display()
    );
    Ok(descriptors)
}

/// Load usage estimates from a JSON file
pub fn load_usage(path: &Path) -> Result<UsageMap> {
    let raw = read(path)?;
    let usage: UsageMap = serde_json::from_str(&raw)?;
    info!(
        "Loaded usage for {} resources from {}",
        usage.len(),
        path.display()
    );
    Ok(usage)
}

/// Load usage estimates if a path was given
pub fn load_usage_opt(path: Option<&Path>) -> Result<UsageMap> {
    path.map_or_else(|| Ok(UsageMap::new()), load_usage)
}

/// Reject descriptors the engine cannot key results by
///
/// Duplicate addresses are allowed but logged, since diffing keeps only the
/// first occurrence.
pub fn validate_descriptors(descriptors: &[ResourceDescriptor]) -> Result<()> {
    let mut seen = HashSet::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if descriptor.address.trim().is_empty() {
            return Err(CostplanError::InvalidArgument(format!(
                "resource of type '{}' has an empty address",
                descriptor.resource_type
            )));
        }
        if descriptor.resource_type.trim().is_empty() {
            return Err(CostplanError::InvalidArgument(format!(
                "resource '{}' has an empty type",
                descriptor.address
            )));
        }
        if !seen.insert(descriptor.address.as_str()) {
            warn!(address = %descriptor.address, "Duplicate resource address");
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CostplanError::InvalidArgument(format!(
            "file not found: {}",
            path.display()
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}
