//! `aws_acmpca_certificate_authority`
//!
//! A private certificate authority is billed per month, and the certificates
//! it issues are billed per certificate over three tiers. Without a
//! `monthly_requests` estimate the first tier is emitted with an unknown
//! quantity.

use crate::util::{tiered_components, usagetype_filter};
use costplan_core::registry::{RegistryItem, UsagePolicy};
use costplan_core::types::{
    CostComponent, PriceFilter, Quantity, Resource, ResourceDescriptor, UsageRecord,
};
use costplan_core::usage::TierSchedule;

pub const RESOURCE_TYPE: &str = "aws_acmpca_certificate_authority";

const SERVICE: &str = "AWSCertificateManager";
const PRODUCT_FAMILY: &str = "AWS Certificate Manager";

const CERTIFICATE_TIER_LIMITS: [i64; 3] = [1000, 9000, 10000];
const CERTIFICATE_TIER_NAMES: [&str; 3] = [
    "Certificates (first 1K)",
    "Certificates (next 9K)",
    "Certificates (over 10K)",
];

pub fn registry_item() -> RegistryItem {
    RegistryItem::new(RESOURCE_TYPE, build, UsagePolicy::Placeholder)
}

pub fn build(descriptor: &ResourceDescriptor, usage: Option<&UsageRecord>) -> Resource {
    let authority = CostComponent::new(
        "Private certificate authority",
        "months",
        usagetype_filter(descriptor, SERVICE, PRODUCT_FAMILY, "/PaidPrivateCA/"),
    )
    .with_quantity(Quantity::known(1));

    let requests = usage.map_or(Quantity::Unknown, |u| u.get("monthly_requests"));
    let certificates = tiered_components(
        &TierSchedule::from_limits(&CERTIFICATE_TIER_LIMITS),
        &CERTIFICATE_TIER_NAMES,
        requests,
        |name, price_filter, quantity| certificate_component(descriptor, name, price_filter, quantity),
    );

    Resource::new(&descriptor.address, RESOURCE_TYPE)
        .with_component(authority)
        .with_components(certificates)
}

fn certificate_component(
    descriptor: &ResourceDescriptor,
    name: &str,
    price_filter: PriceFilter,
    quantity: Quantity,
) -> CostComponent {
    CostComponent::new(
        name,
        "requests",
        usagetype_filter(
            descriptor,
            SERVICE,
            PRODUCT_FAMILY,
            "/PrivateCertificatesIssued/",
        ),
    )
    .with_price_filter(price_filter)
    .with_quantity(quantity)
}
