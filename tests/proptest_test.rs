//! Property-based tests for costplan using proptest

use costplan::aggregation::{CostReport, ResourceCost, RunStatus, diff};
use costplan_core::types::{CostComponent, PriceState, ProductFilter, Quantity, Resource};
use costplan_core::usage::{TierSchedule, TierUsage};
use costplan_pricing::{ComponentCost, CostCalculator};
use proptest::prelude::*;
use rust_decimal::Decimal;

// Strategies for generating test data

prop_compose! {
    /// A decimal with up to four fractional digits
    fn arb_amount(max_units: i64)(units in 0..max_units * 10_000) -> Decimal {
        Decimal::new(units, 4)
    }
}

prop_compose! {
    fn arb_limits()(limits in prop::collection::vec(1i64..100_000, 1..6)) -> Vec<i64> {
        limits
    }
}

prop_compose! {
    fn arb_priced_component()(
        price in arb_amount(10),
        quantity in arb_amount(100_000),
    ) -> CostComponent {
        let mut component = CostComponent::new("c", "units", ProductFilter::new("aws", "S", "F"))
            .with_quantity(Quantity::Known(quantity));
        component.set_price_state(PriceState::Priced { unit_price: price });
        component
    }
}

fn split(limits: &[i64], total: Decimal) -> Vec<Decimal> {
    match TierSchedule::from_limits(limits).split(Quantity::Known(total)) {
        TierUsage::Known(breakdown) => breakdown.quantities().collect(),
        TierUsage::Unknown => unreachable!("known totals split into known tiers"),
    }
}

proptest! {
    #[test]
    fn test_tier_split_sums_to_total(limits in arb_limits(), total in arb_amount(1_000_000)) {
        let tiers = split(&limits, total);

        prop_assert_eq!(tiers.len(), limits.len());
        prop_assert!(tiers.iter().all(|q| *q >= Decimal::ZERO));
        prop_assert_eq!(tiers.iter().copied().sum::<Decimal>(), total);
    }

    #[test]
    fn test_tier_split_respects_bounds(limits in arb_limits(), total in arb_amount(1_000_000)) {
        let tiers = split(&limits, total);

        // Every bounded tier is capped by its own limit
        for (quantity, limit) in tiers.iter().zip(&limits).take(limits.len() - 1) {
            prop_assert!(*quantity <= Decimal::from(*limit));
        }
        // A later tier only fills once the earlier ones are full
        for i in 1..tiers.len() {
            if tiers[i] > Decimal::ZERO {
                prop_assert_eq!(tiers[i - 1], Decimal::from(limits[i - 1]));
            }
        }
    }

    #[test]
    fn test_tier_split_is_deterministic(limits in arb_limits(), total in arb_amount(1_000_000)) {
        prop_assert_eq!(split(&limits, total), split(&limits, total));
    }

    #[test]
    fn test_cost_increases_with_quantity(
        price in 1i64..1_000_000,
        quantity in arb_amount(100_000),
        extra in 1i64..1_000_000,
    ) {
        let price = Decimal::new(price, 6);
        let larger = quantity + Decimal::new(extra, 4);

        let base = CostCalculator::calculate_from_pricing(price, quantity, Decimal::ONE);
        let more = CostCalculator::calculate_from_pricing(price, larger, Decimal::ONE);
        prop_assert!(more.is_some());
        prop_assert!(more > base);
    }

    #[test]
    fn test_subtotal_is_sum_of_parts(
        own in prop::collection::vec(arb_priced_component(), 0..5),
        child in prop::collection::vec(arb_priced_component(), 0..5),
    ) {
        let expected: Decimal = own
            .iter()
            .chain(&child)
            .filter_map(|c| CostCalculator::monthly_cost(c).amount())
            .sum();

        let resource = Resource::new("r", "t")
            .with_components(own)
            .with_child(Resource::sub_resource("child").with_components(child));
        let cost = ResourceCost::from_resource(&resource);

        prop_assert_eq!(cost.subtotal, expected);
        prop_assert_eq!(cost.subtotal, cost.children[0].subtotal + cost.components.iter().map(|c| c.amount()).sum::<Decimal>());
    }

    #[test]
    fn test_diff_total_is_sum_of_resource_deltas(
        past in prop::collection::vec(arb_priced_component(), 0..4),
        current in prop::collection::vec(arb_priced_component(), 0..4),
    ) {
        let tree = |components: Vec<CostComponent>| {
            let resources = components
                .into_iter()
                .enumerate()
                .map(|(i, c)| Resource::new(format!("r{}", i % 3), "t").with_component(c))
                .collect();
            Resource::project("project", resources)
        };
        let past = CostReport::from_tree(&tree(past), "USD", RunStatus::Complete);
        let current = CostReport::from_tree(&tree(current), "USD", RunStatus::Complete);
        let diff = diff(&past, &current);

        let deltas: Decimal = diff.resources.iter().map(|r| r.delta).sum();
        prop_assert_eq!(diff.total_delta, deltas);
        prop_assert_eq!(diff.total_delta, diff.current_total - diff.past_total);
        prop_assert!(diff.past_total <= past.total);
        prop_assert!(diff.current_total <= current.total);
        prop_assert!(diff.resources.windows(2).all(|w| w[0].name < w[1].name));
    }

    #[test]
    fn test_unknown_quantity_never_costs_zero(price in arb_amount(10)) {
        let mut component = CostComponent::new("c", "units", ProductFilter::new("aws", "S", "F"));
        component.set_price_state(PriceState::Priced { unit_price: price });

        prop_assert!(matches!(CostCalculator::monthly_cost(&component), ComponentCost::Unresolved(_)));
    }
}
