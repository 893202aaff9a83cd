//! Cost aggregation module
//!
//! Turns a priced resource tree into a [`CostReport`]: component costs,
//! bottom-up resource subtotals, the grand total, and the list of components
//! whose cost could not be computed. Unresolved components add nothing to a
//! subtotal but are always listed, so a total is never understated without
//! saying so.
//!
//! [`diff`] compares two reports by resource address.
//!
//! Aggregation is single-threaded and pure: it reads a fully resolved tree
//! and never mutates it.
//!
//! # Examples
//!
//! ```
//! use costplan::aggregation::{CostReport, RunStatus};
//! use costplan_core::types::{CostComponent, PriceState, ProductFilter, Quantity, Resource};
//! use rust_decimal::Decimal;
//!
//! let mut hours = CostComponent::new("NAT gateway", "hours", ProductFilter::new("aws", "AmazonEC2", "NAT Gateway"))
//!     .with_quantity(Quantity::known(730));
//! hours.set_price_state(PriceState::Priced { unit_price: Decimal::new(45, 3) });
//!
//! let root = Resource::project("plan", vec![
//!     Resource::new("aws_nat_gateway.main", "aws_nat_gateway").with_component(hours),
//! ]);
//! let report = CostReport::from_tree(&root, "USD", RunStatus::Complete);
//!
//! assert_eq!(report.total, Decimal::new(3285, 2));
//! assert!(report.unresolved.is_empty());
//! ```

use chrono::{DateTime, Utc};
use costplan_core::types::{CostComponent, PriceState, Quantity, Resource, ResourceStatus};
use costplan_pricing::{ComponentCost, CostCalculator, UnresolvedReason};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{debug, warn};

/// Whether every price lookup of a run finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every lookup reached a final state
    Complete,
    /// The run was cancelled; unfinished lookups are reported as unresolved
    Incomplete,
}

/// Cost of one component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentLine {
    /// Component name
    pub name: String,
    /// Display unit
    pub unit: String,
    /// Monthly quantity
    pub monthly_quantity: Quantity,
    /// Resolved price state
    pub price: PriceState,
    /// Monthly cost, or why it is missing
    pub cost: ComponentCost,
}

impl ComponentLine {
    fn from_component(component: &CostComponent) -> Self {
        Self {
            name: component.name.clone(),
            unit: component.unit.clone(),
            monthly_quantity: component.monthly_quantity,
            price: component.price_state(),
            cost: CostCalculator::monthly_cost(component),
        }
    }

    /// Known cost, zero when unresolved
    pub fn amount(&self) -> Decimal {
        self.cost.amount().unwrap_or(Decimal::ZERO)
    }
}

/// Aggregated cost of one resource and its sub-resources
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceCost {
    /// Address for plan resources, label for sub-resources
    pub name: String,
    /// Resource type; empty for sub-resources
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    /// Support status
    pub status: ResourceStatus,
    /// Own components
    pub components: Vec<ComponentLine>,
    /// Sub-resources
    pub children: Vec<ResourceCost>,
    /// Own known costs plus every child's subtotal
    pub subtotal: Decimal,
    /// Components in the subtree without a cost
    pub unresolved_count: usize,
}

impl ResourceCost {
    /// Aggregate a resource tree bottom-up
    ///
    /// A cost that would push a subtotal past the decimal range is reported
    /// as [`UnresolvedReason::Overflow`] instead of being added.
    pub fn from_resource(resource: &Resource) -> Self {
        let mut components: Vec<ComponentLine> = resource
            .components
            .iter()
            .map(ComponentLine::from_component)
            .collect();
        let mut children: Vec<ResourceCost> =
            resource.children.iter().map(Self::from_resource).collect();

        let mut subtotal = Decimal::ZERO;
        for line in &mut components {
            if let ComponentCost::Cost(amount) = line.cost {
                match subtotal.checked_add(amount) {
                    Some(sum) => subtotal = sum,
                    None => {
                        warn!(
                            resource = %resource.name,
                            component = %line.name,
                            "Component cost overflows the subtotal"
                        );
                        line.cost = ComponentCost::Unresolved(UnresolvedReason::Overflow);
                    }
                }
            }
        }
        for child in &mut children {
            match subtotal.checked_add(child.subtotal) {
                Some(sum) => subtotal = sum,
                None => {
                    warn!(
                        resource = %resource.name,
                        child = %child.name,
                        "Sub-resource subtotal overflows the parent subtotal"
                    );
                    child.mark_overflowed();
                }
            }
        }

        let unresolved_count = components
            .iter()
            .filter(|c| c.cost.reason().is_some())
            .count()
            + children.iter().map(|c| c.unresolved_count).sum::<usize>();

        Self {
            name: resource.name.clone(),
            resource_type: resource.resource_type.clone(),
            status: resource.status,
            components,
            children,
            subtotal,
            unresolved_count,
        }
    }

    /// Drop every known cost of the subtree, reporting each as an overflow
    fn mark_overflowed(&mut self) {
        for line in &mut self.components {
            if line.cost.amount().is_some() {
                line.cost = ComponentCost::Unresolved(UnresolvedReason::Overflow);
            }
        }
        for child in &mut self.children {
            child.mark_overflowed();
        }
        self.subtotal = Decimal::ZERO;
        self.unresolved_count = self
            .components
            .iter()
            .filter(|c| c.cost.reason().is_some())
            .count()
            + self.children.iter().map(|c| c.unresolved_count).sum::<usize>();
    }

    /// Whether the resource has no registered builder
    pub fn is_unsupported(&self) -> bool {
        self.status == ResourceStatus::Unsupported
    }

    fn collect_unresolved(&self, address: &str, path: &str, out: &mut Vec<UnresolvedComponent>) {
        for line in &self.components {
            if let Some(reason) = line.cost.reason() {
                out.push(UnresolvedComponent {
                    address: address.to_string(),
                    component: join_path(path, &line.name),
                    reason,
                });
            }
        }
        for child in &self.children {
            child.collect_unresolved(address, &join_path(path, &child.name), out);
        }
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path} / {name}")
    }
}

/// A component whose cost could not be computed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedComponent {
    /// Address of the plan resource owning the component
    pub address: String,
    /// Component name, prefixed by its sub-resource path
    pub component: String,
    /// Why the cost is missing
    pub reason: UnresolvedReason,
}

/// Result of one evaluation run
#[derive(Debug, Clone, Serialize)]
pub struct CostReport {
    /// Currency of every amount
    pub currency: String,
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Whether every lookup finished
    pub status: RunStatus,
    /// Sum of all known monthly costs
    pub total: Decimal,
    /// Aggregated tree; its children are the plan resources
    pub root: ResourceCost,
    /// Every component without a cost
    pub unresolved: Vec<UnresolvedComponent>,
    /// Addresses of resources with unsupported types
    pub unsupported: Vec<String>,
}

impl CostReport {
    /// Aggregate a priced project tree
    pub fn from_tree(root: &Resource, currency: &str, status: RunStatus) -> Self {
        let root = ResourceCost::from_resource(root);

        let mut unresolved = Vec::with_capacity(root.unresolved_count);
        for line in &root.components {
            if let Some(reason) = line.cost.reason() {
                unresolved.push(UnresolvedComponent {
                    address: root.name.clone(),
                    component: line.name.clone(),
                    reason,
                });
            }
        }
        for resource in &root.children {
            resource.collect_unresolved(&resource.name, "", &mut unresolved);
        }

        let unsupported: Vec<String> = root
            .children
            .iter()
            .filter(|r| r.is_unsupported())
            .map(|r| r.name.clone())
            .collect();

        debug!(
            total = %root.subtotal,
            unresolved = unresolved.len(),
            unsupported = unsupported.len(),
            "Aggregated cost report"
        );

        Self {
            currency: currency.to_string(),
            generated_at: Utc::now(),
            status,
            total: root.subtotal,
            root,
            unresolved,
            unsupported,
        }
    }

    /// Plan resources in input order
    pub fn resources(&self) -> &[ResourceCost] {
        &self.root.children
    }

    /// Whether the run finished every lookup
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }
}

/// Change in cost of one component between two trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentDelta {
    pub name: String,
    /// Cost in the past tree, `None` if absent there
    pub past: Option<ComponentCost>,
    /// Cost in the current tree, `None` if absent there
    pub current: Option<ComponentCost>,
    /// Change in known cost; an unresolved side counts as zero
    pub delta: Decimal,
}

impl ComponentDelta {
    /// Whether either side has no cost, so `delta` is not the full change
    pub fn is_partial(&self) -> bool {
        let unresolved = |cost: &Option<ComponentCost>| cost.is_some_and(|c| c.reason().is_some());
        unresolved(&self.past) || unresolved(&self.current)
    }
}

/// Change in cost of one resource between two trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDelta {
    /// Address for plan resources, label for sub-resources
    pub name: String,
    /// Subtotal in the past tree, `None` if absent there
    pub past_subtotal: Option<Decimal>,
    /// Subtotal in the current tree, `None` if absent there
    pub current_subtotal: Option<Decimal>,
    /// `current − past`; a one-sided change equals the full subtotal
    pub delta: Decimal,
    /// Components without a cost in the past subtree
    pub past_unresolved: usize,
    /// Components without a cost in the current subtree
    pub current_unresolved: usize,
    pub components: Vec<ComponentDelta>,
    pub children: Vec<ResourceDelta>,
}

impl ResourceDelta {
    /// Whether the resource only exists in the current tree
    pub fn is_added(&self) -> bool {
        self.past_subtotal.is_none()
    }

    /// Whether the resource only exists in the past tree
    pub fn is_removed(&self) -> bool {
        self.current_subtotal.is_none()
    }

    /// Whether either subtree has components without a cost
    pub fn is_partial(&self) -> bool {
        self.past_unresolved > 0 || self.current_unresolved > 0
    }
}

/// Before/after comparison of two reports
///
/// The totals cover exactly the resources listed, so `total_delta` is the sum
/// of every resource delta. With duplicate addresses they can differ from the
/// report totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostDiff {
    /// One entry per address present in either tree, sorted by address
    pub resources: Vec<ResourceDelta>,
    pub past_total: Decimal,
    pub current_total: Decimal,
    pub total_delta: Decimal,
}

impl CostDiff {
    /// The entry for one address
    pub fn resource(&self, address: &str) -> Option<&ResourceDelta> {
        self.resources.iter().find(|r| r.name == address)
    }
}

/// Compare two reports, matching plan resources by address
///
/// Components are matched by name within a resource and sub-resources by
/// name within their parent. If an address appears more than once in a tree
/// the first occurrence is used.
pub fn diff(past: &CostReport, current: &CostReport) -> CostDiff {
    let resources = diff_resources(past.resources(), current.resources());

    let sum = |side: fn(&ResourceDelta) -> Option<Decimal>| {
        resources
            .iter()
            .filter_map(side)
            .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(amount))
    };
    let past_total = sum(|r| r.past_subtotal);
    let current_total = sum(|r| r.current_subtotal);

    CostDiff {
        resources,
        past_total,
        current_total,
        total_delta: current_total.saturating_sub(past_total),
    }
}

fn index_by_name(resources: &[ResourceCost]) -> BTreeMap<&str, &ResourceCost> {
    let mut index = BTreeMap::new();
    for resource in resources {
        match index.entry(resource.name.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(resource);
            }
            Entry::Occupied(_) => {
                warn!(address = %resource.name, "Duplicate address ignored in diff");
            }
        }
    }
    index
}

fn diff_resources(past: &[ResourceCost], current: &[ResourceCost]) -> Vec<ResourceDelta> {
    let past = index_by_name(past);
    let current = index_by_name(current);

    let mut names: Vec<&str> = past.keys().chain(current.keys()).copied().collect();
    names.sort_unstable();
    names.dedup();

    names
        .into_iter()
        .map(|name| diff_resource(name, past.get(name).copied(), current.get(name).copied()))
        .collect()
}

fn diff_resource(
    name: &str,
    past: Option<&ResourceCost>,
    current: Option<&ResourceCost>,
) -> ResourceDelta {
    let past_subtotal = past.map(|r| r.subtotal);
    let current_subtotal = current.map(|r| r.subtotal);
    let no_components: &[ComponentLine] = &[];
    let no_children: &[ResourceCost] = &[];

    ResourceDelta {
        name: name.to_string(),
        past_subtotal,
        current_subtotal,
        delta: current_subtotal
            .unwrap_or(Decimal::ZERO)
            .saturating_sub(past_subtotal.unwrap_or(Decimal::ZERO)),
        past_unresolved: past.map_or(0, |r| r.unresolved_count),
        current_unresolved: current.map_or(0, |r| r.unresolved_count),
        components: diff_components(
            past.map_or(no_components, |r| r.components.as_slice()),
            current.map_or(no_components, |r| r.components.as_slice()),
        ),
        children: diff_resources(
            past.map_or(no_children, |r| r.children.as_slice()),
            current.map_or(no_children, |r| r.children.as_slice()),
        ),
    }
}

fn diff_components(past: &[ComponentLine], current: &[ComponentLine]) -> Vec<ComponentDelta> {
    fn costs(lines: &[ComponentLine]) -> BTreeMap<&str, ComponentCost> {
        let mut map = BTreeMap::new();
        for line in lines {
            map.entry(line.name.as_str()).or_insert(line.cost);
        }
        map
    }

    let past = costs(past);
    let current = costs(current);

    let mut names: Vec<&str> = past.keys().chain(current.keys()).copied().collect();
    names.sort_unstable();
    names.dedup();

    let known = |cost: Option<ComponentCost>| cost.and_then(|c| c.amount()).unwrap_or(Decimal::ZERO);
    names
        .into_iter()
        .map(|name| {
            let before = past.get(name).copied();
            let after = current.get(name).copied();
            ComponentDelta {
                name: name.to_string(),
                past: before,
                current: after,
                delta: known(after).saturating_sub(known(before)),
            }
        })
        .collect()
}
