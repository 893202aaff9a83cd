//! `aws_nat_gateway`
//!
//! Billed per hour the gateway runs and per GB it processes. The data
//! component is omitted when there is no `monthly_data_processed_gb`
//! estimate.

use crate::util::{HOURS_IN_MONTH, usagetype_filter};
use costplan_core::registry::{RegistryItem, UsagePolicy};
use costplan_core::types::{CostComponent, Quantity, Resource, ResourceDescriptor, UsageRecord};

pub const RESOURCE_TYPE: &str = "aws_nat_gateway";

const SERVICE: &str = "AmazonEC2";
const PRODUCT_FAMILY: &str = "NAT Gateway";

pub fn registry_item() -> RegistryItem {
    RegistryItem::new(RESOURCE_TYPE, build, UsagePolicy::Omit)
}

pub fn build(descriptor: &ResourceDescriptor, usage: Option<&UsageRecord>) -> Resource {
    let hours = CostComponent::new(
        "NAT gateway",
        "hours",
        usagetype_filter(descriptor, SERVICE, PRODUCT_FAMILY, "/NatGateway-Hours/"),
    )
    .with_quantity(Quantity::known(HOURS_IN_MONTH));

    let data = usage
        .map(|u| u.get("monthly_data_processed_gb"))
        .filter(Quantity::is_known)
        .map(|gb| {
            CostComponent::new(
                "Data processed",
                "GB",
                usagetype_filter(descriptor, SERVICE, PRODUCT_FAMILY, "/NatGateway-Bytes/"),
            )
            .with_quantity(gb)
        });

    Resource::new(&descriptor.address, RESOURCE_TYPE)
        .with_component(hours)
        .with_components(data)
}
