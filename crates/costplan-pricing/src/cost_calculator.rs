//! Cost calculator module for computing monthly component costs

use costplan_core::types::{CostComponent, PriceState, Quantity, Resource};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Why a component has no cost
///
/// Variants are ordered by how much they say about the component; when
/// several apply, the earliest one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// More than one catalog price matched
    Ambiguous,
    /// No catalog price matched
    NotFound,
    /// The price lookup did not finish, e.g. the run was cancelled
    PriceUnresolved,
    /// No usage data to derive the quantity from
    UnknownQuantity,
    /// The cost exceeds the decimal range
    Overflow,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ambiguous => "ambiguous price",
            Self::NotFound => "price not found",
            Self::PriceUnresolved => "price unresolved",
            Self::UnknownQuantity => "unknown quantity",
            Self::Overflow => "cost overflow",
        };
        f.write_str(text)
    }
}

/// Monthly cost of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ComponentCost {
    /// Exact monthly cost
    Cost(Decimal),
    /// The cost cannot be computed; it never counts as zero
    Unresolved(UnresolvedReason),
}

impl ComponentCost {
    /// Amount if the cost is known
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Self::Cost(amount) => Some(*amount),
            Self::Unresolved(_) => None,
        }
    }

    /// Reason if the cost is unknown
    pub fn reason(&self) -> Option<UnresolvedReason> {
        match self {
            Self::Cost(_) => None,
            Self::Unresolved(reason) => Some(*reason),
        }
    }
}

/// Calculates monthly costs from resolved prices and quantities
pub struct CostCalculator;

impl CostCalculator {
    /// Calculate cost from pricing data
    ///
    /// `price × quantity × multiplier`, in exact decimal arithmetic.
    /// Returns `None` when the product does not fit in a `Decimal`.
    pub fn calculate_from_pricing(
        unit_price: Decimal,
        quantity: Decimal,
        unit_multiplier: Decimal,
    ) -> Option<Decimal> {
        unit_price.checked_mul(quantity)?.checked_mul(unit_multiplier)
    }

    /// Monthly cost of one component
    pub fn monthly_cost(component: &CostComponent) -> ComponentCost {
        let price = match component.price_state() {
            PriceState::Priced { unit_price } => Some(unit_price),
            _ => None,
        };

        match (price, component.monthly_quantity) {
            (Some(unit_price), Quantity::Known(quantity)) => {
                let Some(cost) =
                    Self::calculate_from_pricing(unit_price, quantity, component.unit_multiplier)
                else {
                    warn!(
                        component = %component.name,
                        quantity = %quantity,
                        "Cost overflows the decimal range"
                    );
                    return ComponentCost::Unresolved(UnresolvedReason::Overflow);
                };
                debug!(
                    "Calculated cost: ${} for {} {} of {}",
                    cost.normalize(),
                    quantity.normalize(),
                    component.unit,
                    component.name
                );
                ComponentCost::Cost(cost)
            }
            (_, quantity) => {
                let reason = match component.price_state() {
                    PriceState::Ambiguous { .. } => UnresolvedReason::Ambiguous,
                    PriceState::NotFound => UnresolvedReason::NotFound,
                    PriceState::Unresolved | PriceState::TransientFailure { .. } => {
                        UnresolvedReason::PriceUnresolved
                    }
                    PriceState::Priced { .. } => {
                        debug_assert!(!quantity.is_known());
                        UnresolvedReason::UnknownQuantity
                    }
                };
                ComponentCost::Unresolved(reason)
            }
        }
    }

    /// Sum of the known costs of every component in a subtree
    ///
    /// Unresolved components add nothing; callers that need to tell "zero"
    /// apart from "partly unknown" inspect the components themselves. A cost
    /// that would overflow the running total is skipped with a warning.
    pub fn known_total(resource: &Resource) -> Decimal {
        let mut total = Decimal::ZERO;
        resource.for_each_component(&mut |c| {
            if let ComponentCost::Cost(amount) = Self::monthly_cost(c) {
                match total.checked_add(amount) {
                    Some(sum) => total = sum,
                    None => warn!(component = %c.name, "Skipping cost that overflows the total"),
                }
            }
        });
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costplan_core::types::ProductFilter;
    use rust_decimal_macros::dec;

    fn component(quantity: Quantity, state: PriceState) -> CostComponent {
        let mut component = CostComponent::new(
            "Certificates (first 1K)",
            "certificates",
            ProductFilter::new("aws", "AWSCertificateManager", "AWS Certificate Manager"),
        )
        .with_quantity(quantity);
        component.set_price_state(state);
        component
    }

    #[test]
    fn test_cost_calculation() {
        assert_eq!(
            CostCalculator::calculate_from_pricing(dec!(0.75), dec!(1000), dec!(1)),
            Some(dec!(750))
        );
        // Per-1M-request pricing
        assert_eq!(
            CostCalculator::calculate_from_pricing(dec!(0.20), dec!(3), dec!(1)),
            Some(dec!(0.60))
        );
        assert_eq!(
            CostCalculator::calculate_from_pricing(dec!(0.005), dec!(2000), dec!(0.001)),
            Some(dec!(0.01))
        );
    }

    #[test]
    fn test_decimal_sum_is_exact() {
        let total: Option<Decimal> = (0..10)
            .map(|_| CostCalculator::calculate_from_pricing(dec!(0.1), dec!(1), dec!(1)))
            .sum();
        assert_eq!(total, Some(dec!(1.0)));
    }

    #[test]
    fn test_overflowing_cost_is_unresolved() {
        assert_eq!(
            CostCalculator::calculate_from_pricing(Decimal::MAX, dec!(2), dec!(1)),
            None
        );

        let c = component(
            Quantity::Known(Decimal::MAX),
            PriceState::Priced {
                unit_price: dec!(400),
            },
        );
        assert_eq!(
            CostCalculator::monthly_cost(&c),
            ComponentCost::Unresolved(UnresolvedReason::Overflow)
        );
        assert_eq!(UnresolvedReason::Overflow.to_string(), "cost overflow");
    }

    #[test]
    fn test_priced_component() {
        let c = component(
            Quantity::known(1000),
            PriceState::Priced {
                unit_price: dec!(0.75),
            },
        );
        assert_eq!(CostCalculator::monthly_cost(&c), ComponentCost::Cost(dec!(750)));
    }

    #[test]
    fn test_zero_quantity_costs_zero() {
        let c = component(
            Quantity::known(0),
            PriceState::Priced {
                unit_price: dec!(0.75),
            },
        );
        assert_eq!(CostCalculator::monthly_cost(&c).amount(), Some(dec!(0)));
    }

    #[test]
    fn test_unknown_quantity_is_not_zero() {
        let c = component(
            Quantity::Unknown,
            PriceState::Priced {
                unit_price: dec!(0.75),
            },
        );
        assert_eq!(
            CostCalculator::monthly_cost(&c),
            ComponentCost::Unresolved(UnresolvedReason::UnknownQuantity)
        );
    }

    #[test]
    fn test_price_reason_wins_over_quantity() {
        let ambiguous = component(Quantity::Unknown, PriceState::Ambiguous { matches: 3 });
        let missing = component(Quantity::known(5), PriceState::NotFound);
        let pending = component(Quantity::known(5), PriceState::TransientFailure { attempts: 1 });

        assert_eq!(
            CostCalculator::monthly_cost(&ambiguous).reason(),
            Some(UnresolvedReason::Ambiguous)
        );
        assert_eq!(
            CostCalculator::monthly_cost(&missing).reason(),
            Some(UnresolvedReason::NotFound)
        );
        assert_eq!(
            CostCalculator::monthly_cost(&pending).reason(),
            Some(UnresolvedReason::PriceUnresolved)
        );
    }

    #[test]
    fn test_known_total() {
        let resource = Resource::new("aws_nat_gateway.main", "aws_nat_gateway")
            .with_component(component(
                Quantity::known(730),
                PriceState::Priced {
                    unit_price: dec!(0.045),
                },
            ))
            .with_component(component(Quantity::Unknown, PriceState::NotFound));

        assert_eq!(CostCalculator::known_total(&resource), dec!(32.85));
    }
}
