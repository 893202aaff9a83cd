//! `aws_lambda_function`

use crate::util::usagetype_filter;
use costplan_core::registry::{RegistryItem, UsagePolicy};
use costplan_core::types::{
    CostComponent, PriceFilter, Quantity, Resource, ResourceDescriptor, UsageRecord,
};
use rust_decimal::Decimal;
use tracing::{debug, warn};

pub const RESOURCE_TYPE: &str = "aws_lambda_function";

const SERVICE: &str = "AWSLambda";
const PRODUCT_FAMILY: &str = "Serverless";

/// Memory size AWS assumes when `memory_size` is not set
const DEFAULT_MEMORY_MB: i64 = 128;
const REQUESTS_PER_UNIT: i64 = 1_000_000;

pub fn registry_item() -> RegistryItem {
    RegistryItem::new(RESOURCE_TYPE, build, UsagePolicy::Placeholder)
}

/// Requests are billed per request and shown per 1M requests. Duration is
/// billed in GB-seconds: `requests × duration_ms / 1000 × memory_mb / 1024`.
pub fn build(descriptor: &ResourceDescriptor, usage: Option<&UsageRecord>) -> Resource {
    let get = |key: &str| usage.map_or(Quantity::Unknown, |u| u.get(key));

    let memory_mb = match descriptor.get_decimal("memory_size") {
        Some(memory) if memory > Decimal::ZERO => memory,
        _ => {
            debug!(address = %descriptor.address, "Using default Lambda memory size");
            Decimal::from(DEFAULT_MEMORY_MB)
        }
    };

    let requests = get("monthly_requests");
    let gb_seconds = match (requests, get("request_duration_ms")) {
        (Quantity::Known(requests), Quantity::Known(duration_ms)) => {
            match gb_seconds(requests, duration_ms, memory_mb) {
                Some(amount) => Quantity::Known(amount),
                None => {
                    warn!(
                        address = %descriptor.address,
                        "Lambda duration usage overflows, treating it as unknown"
                    );
                    Quantity::Unknown
                }
            }
        }
        _ => Quantity::Unknown,
    };

    let per_unit = Decimal::from(REQUESTS_PER_UNIT);
    let requests_component = CostComponent::new(
        "Requests",
        "1M requests",
        usagetype_filter(descriptor, SERVICE, PRODUCT_FAMILY, "/Request/"),
    )
    .with_price_filter(PriceFilter::starting_at(Decimal::ZERO))
    .with_unit_multiplier(per_unit)
    .with_quantity(requests.map(|r| r / per_unit));

    let duration_component = CostComponent::new(
        "Duration",
        "GB-seconds",
        usagetype_filter(descriptor, SERVICE, PRODUCT_FAMILY, "/Lambda-GB-Second/"),
    )
    .with_price_filter(PriceFilter::starting_at(Decimal::ZERO))
    .with_quantity(gb_seconds);

    Resource::new(&descriptor.address, RESOURCE_TYPE)
        .with_component(requests_component)
        .with_component(duration_component)
}

fn gb_seconds(requests: Decimal, duration_ms: Decimal, memory_mb: Decimal) -> Option<Decimal> {
    let seconds = duration_ms.checked_div(Decimal::ONE_THOUSAND)?;
    let gigabytes = memory_mb.checked_div(Decimal::from(1024))?;
    requests.checked_mul(seconds)?.checked_mul(gigabytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_requests_and_duration() {
        let descriptor = ResourceDescriptor::new(RESOURCE_TYPE, "aws_lambda_function.api", "us-east-1")
            .with_attribute("memory_size", 512);
        let usage = UsageRecord::new()
            .with("monthly_requests", dec!(2000000))
            .with("request_duration_ms", dec!(250));
        let resource = build(&descriptor, Some(&usage));

        assert_eq!(resource.components[0].monthly_quantity, Quantity::known(2));
        assert_eq!(resource.components[0].unit_multiplier, dec!(1000000));
        // 2M × 0.25s × 0.5GB
        assert_eq!(resource.components[1].monthly_quantity, Quantity::known(250000));
    }

    #[test]
    fn test_default_memory_size() {
        let descriptor = ResourceDescriptor::new(RESOURCE_TYPE, "aws_lambda_function.api", "us-east-1");
        let usage = UsageRecord::new()
            .with("monthly_requests", dec!(1024))
            .with("request_duration_ms", dec!(1000));
        let resource = build(&descriptor, Some(&usage));

        assert_eq!(resource.components[1].monthly_quantity, Quantity::known(128));
    }

    #[test]
    fn test_missing_duration_leaves_duration_unknown() {
        let descriptor = ResourceDescriptor::new(RESOURCE_TYPE, "aws_lambda_function.api", "us-east-1");
        let usage = UsageRecord::new().with("monthly_requests", dec!(1000000));
        let resource = build(&descriptor, Some(&usage));

        assert_eq!(resource.components[0].monthly_quantity, Quantity::known(1));
        assert_eq!(resource.components[1].monthly_quantity, Quantity::Unknown);
    }

    #[test]
    fn test_huge_usage_leaves_duration_unknown() {
        let descriptor = ResourceDescriptor::new(RESOURCE_TYPE, "aws_lambda_function.big", "us-east-1")
            .with_attribute("memory_size", 10240);
        let usage = UsageRecord::new()
            .with("monthly_requests", dec!(100000000000000000000))
            .with("request_duration_ms", dec!(1000000000000));
        let resource = build(&descriptor, Some(&usage));

        assert_eq!(
            resource.components[0].monthly_quantity,
            Quantity::known(dec!(100000000000000))
        );
        assert_eq!(resource.components[1].monthly_quantity, Quantity::Unknown);
    }

    #[test]
    fn test_missing_usage_placeholders() {
        let descriptor = ResourceDescriptor::new(RESOURCE_TYPE, "aws_lambda_function.api", "us-east-1");
        let resource = build(&descriptor, None);

        assert_eq!(resource.components.len(), 2);
        assert!(
            resource
                .components
                .iter()
                .all(|c| c.monthly_quantity == Quantity::Unknown)
        );
    }
}
