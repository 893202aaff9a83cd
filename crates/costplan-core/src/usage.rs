//! Tiered usage resolution
//!
//! Splits a monthly usage total across pricing tiers. Tiers are declared by
//! their limits the way pricing pages list them ("first 1K", "next 9K",
//! "over 10K"): each limit caps the size of its tier except the last one,
//! which is unbounded. The limits `[1000, 9000, 10000]` therefore describe
//! the cumulative bounds `[0, 1000)`, `[1000, 10000)` and `[10000, ∞)`.
//!
//! For a total `U` and cumulative upper bounds `B₀ = 0 < B₁ < … < Bₖ = ∞`,
//! tier `i` receives `max(0, min(U, Bᵢ) − min(U, Bᵢ₋₁))`. All arithmetic is
//! exact decimal arithmetic, so identical inputs always give identical
//! results and the tier quantities always sum to `U`.
//!
//! # Examples
//!
//! ```
//! use costplan_core::types::Quantity;
//! use costplan_core::usage::{TierSchedule, TierUsage};
//! use rust_decimal::Decimal;
//!
//! let schedule = TierSchedule::from_limits(&[1000, 9000, 10000]);
//! let TierUsage::Known(breakdown) = schedule.split(Quantity::known(12_000)) else {
//!     unreachable!()
//! };
//!
//! let quantities: Vec<Decimal> = breakdown.quantities().collect();
//! assert_eq!(quantities, vec![Decimal::from(1000), Decimal::from(9000), Decimal::from(2000)]);
//! ```

use crate::types::Quantity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quantity of usage falling into one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierQuantity {
    /// Zero-based tier index
    pub index: usize,
    /// Usage inside this tier, never negative
    pub quantity: Decimal,
}

/// A usage total split across tiers, in tier order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBreakdown {
    tiers: Vec<TierQuantity>,
}

impl TierBreakdown {
    /// All tiers, including empty ones
    pub fn tiers(&self) -> &[TierQuantity] {
        &self.tiers
    }

    /// Tier quantities in order
    pub fn quantities(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.tiers.iter().map(|t| t.quantity)
    }

    /// Quantity of one tier, zero if the index is out of range
    pub fn get(&self, index: usize) -> Decimal {
        self.tiers
            .get(index)
            .map_or(Decimal::ZERO, |t| t.quantity)
    }

    /// Sum of all tiers
    pub fn total(&self) -> Decimal {
        self.quantities().sum()
    }
}

/// Result of splitting a usage total that may be unknown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierUsage {
    /// The total was known
    Known(TierBreakdown),
    /// No usage data; the caller decides how to represent the component
    Unknown,
}

/// Ordered tier limits for one pricing schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSchedule {
    /// Cumulative upper bound of every tier except the last
    upper_bounds: Vec<Decimal>,
    tier_count: usize,
}

impl TierSchedule {
    /// Build a schedule from per-tier limits
    ///
    /// The final limit only labels the unbounded tier and is not used as a
    /// cap. An empty slice yields a single unbounded tier.
    pub fn from_limits<T: Copy + Into<Decimal>>(limits: &[T]) -> Self {
        let tier_count = limits.len().max(1);
        let mut upper_bounds = Vec::with_capacity(tier_count.saturating_sub(1));
        let mut cumulative = Decimal::ZERO;
        for limit in limits.iter().take(tier_count - 1) {
            let limit: Decimal = (*limit).into();
            cumulative += limit.max(Decimal::ZERO);
            upper_bounds.push(cumulative);
        }

        Self {
            upper_bounds,
            tier_count,
        }
    }

    /// Number of tiers
    pub fn tier_count(&self) -> usize {
        self.tier_count
    }

    /// Usage amount at which tier `index` starts
    ///
    /// This is the value catalogs use as the start usage amount of a tier's
    /// price, e.g. `0`, `1000`, `10000`.
    pub fn tier_start(&self, index: usize) -> Decimal {
        if index == 0 {
            Decimal::ZERO
        } else {
            self.upper_bounds
                .get(index - 1)
                .or(self.upper_bounds.last())
                .copied()
                .unwrap_or(Decimal::ZERO)
        }
    }

    /// Split a usage total across the tiers
    ///
    /// A negative total is treated as zero.
    pub fn split(&self, total: Quantity) -> TierUsage {
        let Quantity::Known(total) = total else {
            return TierUsage::Unknown;
        };

        let total = if total.is_sign_negative() {
            debug!("Negative usage total {} treated as zero", total);
            Decimal::ZERO
        } else {
            total
        };

        let mut tiers = Vec::with_capacity(self.tier_count);
        let mut lower = Decimal::ZERO;
        for index in 0..self.tier_count {
            let capped_lower = total.min(lower);
            let quantity = match self.upper_bounds.get(index) {
                Some(upper) => {
                    let capped_upper = total.min(*upper);
                    lower = *upper;
                    (capped_upper - capped_lower).max(Decimal::ZERO)
                }
                None => (total - capped_lower).max(Decimal::ZERO),
            };
            tiers.push(TierQuantity { index, quantity });
        }

        TierUsage::Known(TierBreakdown { tiers })
    }
}
