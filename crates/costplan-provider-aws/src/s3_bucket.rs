//! `aws_s3_bucket`
//!
//! Costs live on a "Standard" storage class sub-resource: tiered storage plus
//! two request classes. Missing usage gives placeholder components with
//! unknown quantities.

use crate::util::{tiered_components, usagetype_filter};
use costplan_core::registry::{RegistryItem, UsagePolicy};
use costplan_core::types::{
    AttributeFilter, CostComponent, PriceFilter, Quantity, Resource, ResourceDescriptor,
    UsageRecord,
};
use costplan_core::usage::TierSchedule;
use rust_decimal::Decimal;

pub const RESOURCE_TYPE: &str = "aws_s3_bucket";

const SERVICE: &str = "AmazonS3";

const STORAGE_TIER_LIMITS: [i64; 3] = [51200, 460800, 512000];
const STORAGE_TIER_NAMES: [&str; 3] = [
    "Storage (first 50TB)",
    "Storage (next 450TB)",
    "Storage (over 500TB)",
];

const REQUESTS_PER_UNIT: i64 = 1000;

pub fn registry_item() -> RegistryItem {
    RegistryItem::new(RESOURCE_TYPE, build, UsagePolicy::Placeholder)
}

pub fn build(descriptor: &ResourceDescriptor, usage: Option<&UsageRecord>) -> Resource {
    let get = |key: &str| usage.map_or(Quantity::Unknown, |u| u.get(key));

    let storage = tiered_components(
        &TierSchedule::from_limits(&STORAGE_TIER_LIMITS),
        &STORAGE_TIER_NAMES,
        get("standard_storage_gb"),
        |name, price_filter, quantity| {
            CostComponent::new(
                name,
                "GB",
                usagetype_filter(descriptor, SERVICE, "Storage", "/TimedStorage-ByteHrs/")
                    .with_attribute(AttributeFilter::exact("volumeType", "Standard")),
            )
            .with_price_filter(price_filter)
            .with_quantity(quantity)
        },
    );

    let standard = Resource::sub_resource("Standard")
        .with_components(storage)
        .with_component(request_component(
            descriptor,
            "PUT, COPY, POST, LIST requests",
            "/Requests-Tier1/",
            get("monthly_tier_1_requests"),
        ))
        .with_component(request_component(
            descriptor,
            "GET, SELECT, and all other requests",
            "/Requests-Tier2/",
            get("monthly_tier_2_requests"),
        ));

    Resource::new(&descriptor.address, RESOURCE_TYPE).with_child(standard)
}

/// Request component displayed per 1k requests and priced per request
fn request_component(
    descriptor: &ResourceDescriptor,
    name: &str,
    usagetype: &str,
    requests: Quantity,
) -> CostComponent {
    let per_unit = Decimal::from(REQUESTS_PER_UNIT);
    CostComponent::new(
        name,
        "1k requests",
        usagetype_filter(descriptor, SERVICE, "API Request", usagetype),
    )
    .with_price_filter(PriceFilter::starting_at(Decimal::ZERO))
    .with_unit_multiplier(per_unit)
    .with_quantity(requests.map(|r| r / per_unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new(RESOURCE_TYPE, "aws_s3_bucket.assets", "eu-west-1")
    }

    #[test]
    fn test_components_on_standard_child() {
        let usage = UsageRecord::new()
            .with("standard_storage_gb", dec!(60000))
            .with("monthly_tier_1_requests", dec!(20000))
            .with("monthly_tier_2_requests", dec!(1500));
        let resource = build(&descriptor(), Some(&usage));

        assert!(resource.components.is_empty());
        assert_eq!(resource.children.len(), 1);

        let standard = &resource.children[0];
        assert_eq!(standard.name, "Standard");
        let names: Vec<_> = standard.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Storage (first 50TB)",
                "Storage (next 450TB)",
                "PUT, COPY, POST, LIST requests",
                "GET, SELECT, and all other requests",
            ]
        );
        assert_eq!(standard.components[1].monthly_quantity, Quantity::known(8800));
        assert_eq!(standard.components[2].monthly_quantity, Quantity::known(20));
        assert_eq!(standard.components[3].monthly_quantity, Quantity::Known(dec!(1.5)));
        assert_eq!(standard.components[3].unit_multiplier, dec!(1000));
    }

    #[test]
    fn test_missing_usage_placeholders() {
        let resource = build(&descriptor(), None);
        let standard = &resource.children[0];

        assert_eq!(standard.components.len(), 3);
        assert!(
            standard
                .components
                .iter()
                .all(|c| c.monthly_quantity == Quantity::Unknown)
        );
    }

    #[test]
    fn test_storage_filter() {
        let usage = UsageRecord::new().with("standard_storage_gb", dec!(10));
        let resource = build(&descriptor(), Some(&usage));
        let filter = &resource.children[0].components[0].product_filter;

        assert_eq!(filter.product_family, "Storage");
        assert_eq!(filter.region.as_deref(), Some("eu-west-1"));
        assert_eq!(filter.attribute_filters.len(), 2);
    }
}
