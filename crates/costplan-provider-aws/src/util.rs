//! Helpers shared by the AWS builders

use costplan_core::types::{
    AttributeFilter, CostComponent, PriceFilter, ProductFilter, Quantity, ResourceDescriptor,
};
use costplan_core::usage::{TierSchedule, TierUsage};
use rust_decimal::Decimal;

pub(crate) const VENDOR: &str = "aws";

/// Hours billed for an always-on resource in one month
pub const HOURS_IN_MONTH: i64 = 730;

/// Region of a descriptor, falling back to its `region` attribute
pub(crate) fn region(descriptor: &ResourceDescriptor) -> Option<&str> {
    if descriptor.region.is_empty() {
        descriptor.get_str("region")
    } else {
        Some(descriptor.region.as_str())
    }
}

/// Product filter for `service`/`family` in the descriptor's region, matching
/// `usagetype` against a pattern
pub(crate) fn usagetype_filter(
    descriptor: &ResourceDescriptor,
    service: &str,
    product_family: &str,
    usagetype: &str,
) -> ProductFilter {
    let filter = ProductFilter::new(VENDOR, service, product_family)
        .with_attribute(AttributeFilter::pattern("usagetype", usagetype));
    match region(descriptor) {
        Some(region) => filter.with_region(region),
        None => filter,
    }
}

/// One cost component per non-empty tier of a usage total
///
/// `make` receives the tier name, the price filter selecting the tier's price
/// and the quantity. Tiers holding zero usage are left out. Unknown usage
/// yields a single placeholder for the first tier with an unknown quantity.
pub(crate) fn tiered_components(
    schedule: &TierSchedule,
    names: &[&str],
    usage: Quantity,
    make: impl Fn(&str, PriceFilter, Quantity) -> CostComponent,
) -> Vec<CostComponent> {
    let tier_filter = |index: usize| PriceFilter::starting_at(schedule.tier_start(index));

    match schedule.split(usage) {
        TierUsage::Known(breakdown) => breakdown
            .tiers()
            .iter()
            .filter(|tier| tier.quantity > Decimal::ZERO)
            .filter_map(|tier| {
                names
                    .get(tier.index)
                    .map(|name| make(*name, tier_filter(tier.index), Quantity::Known(tier.quantity)))
            })
            .collect(),
        TierUsage::Unknown => names
            .first()
            .map(|name| make(*name, tier_filter(0), Quantity::Unknown))
            .into_iter()
            .collect(),
    }
}
