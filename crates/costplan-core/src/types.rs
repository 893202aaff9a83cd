//! Core domain types for costplan
//!
//! This module contains the data model shared by every stage of an
//! evaluation run: the resource descriptors and usage records coming in,
//! the cost-component trees built from them, and the filters used to look
//! up prices in the pricing catalog.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Usage records for a whole plan, keyed by resource address
pub type UsageMap = BTreeMap<String, UsageRecord>;

/// Parsed representation of one declared infrastructure resource
///
/// Descriptors are produced by the plan parser and are read-only for the
/// rest of the run.
///
/// # Examples
/// ```
/// use costplan_core::types::ResourceDescriptor;
///
/// let descriptor = ResourceDescriptor::new("aws_lambda_function", "aws_lambda_function.api", "us-east-1")
///     .with_attribute("memory_size", 512);
///
/// assert_eq!(descriptor.get_i64("memory_size"), Some(512));
/// assert_eq!(descriptor.get_str("runtime"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource type name, e.g. `aws_s3_bucket`
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Stable address of the resource within the plan
    pub address: String,
    /// Region the resource is deployed to
    #[serde(default)]
    pub region: String,
    /// Raw attribute values from the plan
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ResourceDescriptor {
    /// Create a descriptor with no attributes
    pub fn new(
        resource_type: impl Into<String>,
        address: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            address: address.into(),
            region: region.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute value
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Get a string attribute
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer attribute, accepting numeric strings
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.attributes.get(key)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get a decimal attribute without going through floating point
    pub fn get_decimal(&self, key: &str) -> Option<Decimal> {
        self.attributes.get(key).and_then(decimal_from_json)
    }
}

/// Parse a JSON number or numeric string into an exact decimal
pub fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => return None,
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// User-supplied usage estimates for one resource
///
/// A key that is absent means "no data", which is different from a key
/// explicitly set to zero. Lookups return a [`Quantity`] so callers have to
/// handle both cases.
///
/// # Examples
/// ```
/// use costplan_core::types::{Quantity, UsageRecord};
/// use rust_decimal::Decimal;
///
/// let usage = UsageRecord::new().with("monthly_requests", Decimal::from(12_000));
///
/// assert_eq!(usage.get("monthly_requests"), Quantity::Known(Decimal::from(12_000)));
/// assert_eq!(usage.get("storage_gb"), Quantity::Unknown);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageRecord {
    values: BTreeMap<String, Decimal>,
}

impl UsageRecord {
    /// Create an empty usage record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a usage estimate
    pub fn with(mut self, key: impl Into<String>, value: Decimal) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Look up an estimate
    pub fn get(&self, key: &str) -> Quantity {
        self.values
            .get(key)
            .copied()
            .map_or(Quantity::Unknown, Quantity::Known)
    }

    /// Whether the record holds no estimates at all
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A quantity that may be missing
///
/// `Unknown` means there was no data to derive the quantity from. It is
/// never represented as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Quantity {
    /// A known amount
    Known(Decimal),
    /// No data available
    Unknown,
}

impl Quantity {
    /// Create a known quantity from anything convertible to a decimal
    pub fn known(value: impl Into<Decimal>) -> Self {
        Self::Known(value.into())
    }

    /// Get the amount if known
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Self::Known(v) => Some(*v),
            Self::Unknown => None,
        }
    }

    /// Whether the amount is known
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Transform a known amount, leaving `Unknown` untouched
    pub fn map(self, f: impl FnOnce(Decimal) -> Decimal) -> Self {
        match self {
            Self::Known(v) => Self::Known(f(v)),
            Self::Unknown => Self::Unknown,
        }
    }

    /// Combine two quantities; unknown if either side is unknown
    pub fn zip_with(self, other: Self, f: impl FnOnce(Decimal, Decimal) -> Decimal) -> Self {
        match (self, other) {
            (Self::Known(a), Self::Known(b)) => Self::Known(f(a, b)),
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{}", v.normalize()),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// How an attribute value is matched in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeMatch {
    /// The attribute must equal this value
    Exact(String),
    /// The attribute must match this regular expression
    Pattern(String),
}

/// One attribute constraint of a product filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeFilter {
    /// Attribute name, e.g. `usagetype`
    pub key: String,
    /// Match semantics and operand
    pub matcher: AttributeMatch,
}

impl AttributeFilter {
    /// Exact-value constraint
    pub fn exact(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            matcher: AttributeMatch::Exact(value.into()),
        }
    }

    /// Pattern constraint
    pub fn pattern(key: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            matcher: AttributeMatch::Pattern(pattern.into()),
        }
    }
}

/// Criteria selecting a billable product in the pricing catalog
///
/// # Examples
/// ```
/// use costplan_core::types::{AttributeFilter, ProductFilter};
///
/// let a = ProductFilter::new("aws", "AmazonS3", "Storage")
///     .with_region("us-east-1")
///     .with_attribute(AttributeFilter::exact("volumeType", "Standard"))
///     .with_attribute(AttributeFilter::pattern("usagetype", "TimedStorage-ByteHrs"));
/// let b = ProductFilter::new("aws", "AmazonS3", "Storage")
///     .with_region("us-east-1")
///     .with_attribute(AttributeFilter::pattern("usagetype", "TimedStorage-ByteHrs"))
///     .with_attribute(AttributeFilter::exact("volumeType", "Standard"));
///
/// // Attribute order does not matter once normalized
/// assert_eq!(a.normalized(), b.normalized());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Cloud vendor, e.g. `aws`
    pub vendor_name: String,
    /// Region, if the product is regional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Catalog service name, e.g. `AmazonS3`
    pub service: String,
    /// Catalog product family, e.g. `Storage`
    pub product_family: String,
    /// Additional attribute constraints
    #[serde(default)]
    pub attribute_filters: Vec<AttributeFilter>,
}

impl ProductFilter {
    /// Create a filter with no region and no attribute constraints
    pub fn new(
        vendor_name: impl Into<String>,
        service: impl Into<String>,
        product_family: impl Into<String>,
    ) -> Self {
        Self {
            vendor_name: vendor_name.into(),
            region: None,
            service: service.into(),
            product_family: product_family.into(),
            attribute_filters: Vec::new(),
        }
    }

    /// Restrict to a region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Add an attribute constraint
    pub fn with_attribute(mut self, filter: AttributeFilter) -> Self {
        self.attribute_filters.push(filter);
        self
    }

    /// Canonical form used for deduplication: attribute filters sorted and
    /// duplicates removed
    pub fn normalized(&self) -> Self {
        let mut normalized = self.clone();
        normalized.attribute_filters.sort();
        normalized.attribute_filters.dedup();
        normalized
    }
}

/// Criteria selecting one price among the prices of a matched product
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PriceFilter {
    /// Purchase option, e.g. `on_demand`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_option: Option<String>,
    /// Lower bound of the usage tier this price applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_usage_amount: Option<Decimal>,
    /// Catalog billing unit, e.g. `Hrs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl PriceFilter {
    /// Select the tier starting at `start`
    pub fn starting_at(start: Decimal) -> Self {
        Self {
            start_usage_amount: Some(start),
            ..Self::default()
        }
    }

    /// Canonical form used for deduplication
    pub fn normalized(&self) -> Self {
        Self {
            purchase_option: self.purchase_option.clone(),
            start_usage_amount: self.start_usage_amount.map(|d| d.normalize()),
            unit: self.unit.clone(),
        }
    }
}

/// Outcome of looking up the price of one cost component
///
/// State only moves forward: `Unresolved` goes to a terminal state
/// (`Priced`, `NotFound`, `Ambiguous`), possibly through one or more
/// `TransientFailure` steps while a lookup is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceState {
    /// No lookup has completed yet
    #[default]
    Unresolved,
    /// Exactly one catalog price matched
    Priced {
        /// Price per unit in the run's currency
        unit_price: Decimal,
    },
    /// No catalog price matched
    NotFound,
    /// More than one catalog price matched
    Ambiguous {
        /// Number of matching prices
        matches: usize,
    },
    /// The lookup failed and is being retried
    TransientFailure {
        /// Attempts made so far
        attempts: u32,
    },
}

impl PriceState {
    /// Whether this state is final for the run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Priced { .. } | Self::NotFound | Self::Ambiguous { .. }
        )
    }

    /// Unit price if priced
    pub fn unit_price(&self) -> Option<Decimal> {
        match self {
            Self::Priced { unit_price } => Some(*unit_price),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` respects forward-only transitions
    pub fn can_transition_to(&self, next: &PriceState) -> bool {
        match (self, next) {
            (_, Self::Unresolved) => false,
            (Self::Unresolved, _) => true,
            (Self::TransientFailure { attempts: a }, Self::TransientFailure { attempts: b }) => b > a,
            (Self::TransientFailure { .. }, next) => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for PriceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => write!(f, "unresolved"),
            Self::Priced { unit_price } => write!(f, "{}", unit_price.normalize()),
            Self::NotFound => write!(f, "not found"),
            Self::Ambiguous { matches } => write!(f, "ambiguous ({matches} matches)"),
            Self::TransientFailure { attempts } => {
                write!(f, "lookup failing ({attempts} attempts)")
            }
        }
    }
}

/// One billable line item of a resource
///
/// # Examples
/// ```
/// use costplan_core::types::{CostComponent, PriceState, ProductFilter, Quantity};
/// use rust_decimal::Decimal;
///
/// let mut component = CostComponent::new(
///     "Requests",
///     "1M requests",
///     ProductFilter::new("aws", "AWSLambda", "Serverless"),
/// )
/// .with_quantity(Quantity::known(3));
///
/// assert!(component.set_price_state(PriceState::Priced { unit_price: Decimal::new(20, 2) }));
/// // Terminal states are never overwritten
/// assert!(!component.set_price_state(PriceState::NotFound));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostComponent {
    /// Display name, e.g. `Certificates (first 1K)`
    pub name: String,
    /// Display unit, e.g. `requests`
    pub unit: String,
    /// Factor applied to `price × quantity`
    pub unit_multiplier: Decimal,
    /// Monthly quantity
    pub monthly_quantity: Quantity,
    /// Product selection criteria
    pub product_filter: ProductFilter,
    /// Price selection criteria
    #[serde(default)]
    pub price_filter: PriceFilter,
    #[serde(default)]
    price: PriceState,
}

impl CostComponent {
    /// Create an unpriced component with unknown quantity and unit multiplier 1
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        product_filter: ProductFilter,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            unit_multiplier: Decimal::ONE,
            monthly_quantity: Quantity::Unknown,
            product_filter,
            price_filter: PriceFilter::default(),
            price: PriceState::Unresolved,
        }
    }

    /// Set the monthly quantity
    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.monthly_quantity = quantity;
        self
    }

    /// Set the unit multiplier
    pub fn with_unit_multiplier(mut self, multiplier: Decimal) -> Self {
        self.unit_multiplier = multiplier;
        self
    }

    /// Set the price filter
    pub fn with_price_filter(mut self, price_filter: PriceFilter) -> Self {
        self.price_filter = price_filter;
        self
    }

    /// Current price resolution state
    pub fn price_state(&self) -> PriceState {
        self.price
    }

    /// Move to a new price state
    ///
    /// Returns `false` and leaves the state untouched if the transition would
    /// go backwards or overwrite a terminal state.
    pub fn set_price_state(&mut self, next: PriceState) -> bool {
        if self.price.can_transition_to(&next) {
            self.price = next;
            true
        } else {
            false
        }
    }
}

/// Support status of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Built by a registered builder
    #[default]
    Supported,
    /// Registered as having no cost
    Free,
    /// No builder registered for the type
    Unsupported,
}

/// A node of the cost tree
///
/// Each resource exclusively owns its children; traversal is always top-down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Address for plan resources, label for sub-resources
    pub name: String,
    /// Resource type name; empty for sub-resources and the project root
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    /// Support status
    #[serde(default)]
    pub status: ResourceStatus,
    /// Own cost components, in display order
    #[serde(default)]
    pub components: Vec<CostComponent>,
    /// Sub-resources, in display order
    #[serde(default)]
    pub children: Vec<Resource>,
}

impl Resource {
    /// Create a supported resource with no components
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Supported,
            components: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create a sub-resource
    pub fn sub_resource(name: impl Into<String>) -> Self {
        Self::new(name, String::new())
    }

    /// Placeholder for a descriptor whose type has no builder
    pub fn unsupported(descriptor: &ResourceDescriptor) -> Self {
        Self {
            status: ResourceStatus::Unsupported,
            ..Self::new(&descriptor.address, &descriptor.resource_type)
        }
    }

    /// Resource whose type is known to have no cost
    pub fn free(descriptor: &ResourceDescriptor) -> Self {
        Self {
            status: ResourceStatus::Free,
            ..Self::new(&descriptor.address, &descriptor.resource_type)
        }
    }

    /// Root of a tree holding the given resources
    pub fn project(name: impl Into<String>, children: Vec<Resource>) -> Self {
        Self {
            children,
            ..Self::new(name, String::new())
        }
    }

    /// Add a cost component
    pub fn with_component(mut self, component: CostComponent) -> Self {
        self.components.push(component);
        self
    }

    /// Add several cost components
    pub fn with_components(mut self, components: impl IntoIterator<Item = CostComponent>) -> Self {
        self.components.extend(components);
        self
    }

    /// Add a sub-resource
    pub fn with_child(mut self, child: Resource) -> Self {
        self.children.push(child);
        self
    }

    /// Whether the resource has no registered builder
    pub fn is_unsupported(&self) -> bool {
        self.status == ResourceStatus::Unsupported
    }

    /// Visit every component in the subtree, depth first
    pub fn for_each_component(&self, f: &mut impl FnMut(&CostComponent)) {
        for component in &self.components {
            f(component);
        }
        for child in &self.children {
            child.for_each_component(f);
        }
    }

    /// Visit every component in the subtree mutably, depth first
    pub fn for_each_component_mut(&mut self, f: &mut impl FnMut(&mut CostComponent)) {
        for component in &mut self.components {
            f(component);
        }
        for child in &mut self.children {
            child.for_each_component_mut(f);
        }
    }

    /// Number of components in the subtree
    pub fn component_count(&self) -> usize {
        let mut count = 0;
        self.for_each_component(&mut |_| count += 1);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_descriptor_decimal_attributes() {
        let descriptor = ResourceDescriptor::new("aws_lambda_function", "fn", "us-east-1")
            .with_attribute("memory_size", 1536)
            .with_attribute("ratio", "0.1")
            .with_attribute("enabled", true);

        assert_eq!(descriptor.get_decimal("memory_size"), Some(dec!(1536)));
        assert_eq!(descriptor.get_decimal("ratio"), Some(dec!(0.1)));
        assert_eq!(descriptor.get_decimal("enabled"), None);
        assert_eq!(descriptor.get_i64("ratio"), None);
    }

    #[test]
    fn test_descriptor_deserialize() {
        let json = r#"{"type":"aws_s3_bucket","address":"aws_s3_bucket.logs","region":"eu-west-1","attributes":{"bucket":"logs"}}"#;
        let descriptor: ResourceDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.resource_type, "aws_s3_bucket");
        assert_eq!(descriptor.get_str("bucket"), Some("logs"));
    }

    #[test]
    fn test_usage_record_distinguishes_zero_from_missing() {
        let usage = UsageRecord::new().with("monthly_requests", Decimal::ZERO);
        assert_eq!(usage.get("monthly_requests"), Quantity::Known(Decimal::ZERO));
        assert_eq!(usage.get("storage_gb"), Quantity::Unknown);
    }

    #[test]
    fn test_usage_record_deserialize_numbers_and_strings() {
        let usage: UsageRecord =
            serde_json::from_str(r#"{"monthly_requests": 12000, "storage_gb": "2.5"}"#).unwrap();
        assert_eq!(usage.get("monthly_requests"), Quantity::known(12000));
        assert_eq!(usage.get("storage_gb"), Quantity::Known(dec!(2.5)));
    }

    #[test]
    fn test_quantity_combinators() {
        let q = Quantity::known(10).map(|v| v * dec!(2));
        assert_eq!(q, Quantity::known(20));
        assert_eq!(Quantity::Unknown.map(|v| v * dec!(2)), Quantity::Unknown);
        assert_eq!(
            Quantity::known(3).zip_with(Quantity::Unknown, |a, b| a * b),
            Quantity::Unknown
        );
        assert_eq!(Quantity::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_price_filter_normalization() {
        let a = PriceFilter::starting_at(dec!(1000));
        let b = PriceFilter::starting_at(dec!(1000.00));
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn test_price_state_transitions() {
        let unresolved = PriceState::Unresolved;
        let failing = PriceState::TransientFailure { attempts: 1 };
        let priced = PriceState::Priced {
            unit_price: dec!(0.75),
        };

        assert!(unresolved.can_transition_to(&failing));
        assert!(unresolved.can_transition_to(&PriceState::NotFound));
        assert!(failing.can_transition_to(&PriceState::TransientFailure { attempts: 2 }));
        assert!(!failing.can_transition_to(&PriceState::TransientFailure { attempts: 1 }));
        assert!(failing.can_transition_to(&priced));
        assert!(!priced.can_transition_to(&PriceState::NotFound));
        assert!(!failing.can_transition_to(&PriceState::Unresolved));
    }

    #[test]
    fn test_component_state_set_once() {
        let mut component =
            CostComponent::new("Hours", "hours", ProductFilter::new("aws", "AmazonVPC", "NAT"));
        assert_eq!(component.price_state(), PriceState::Unresolved);
        assert!(component.set_price_state(PriceState::Ambiguous { matches: 2 }));
        assert!(!component.set_price_state(PriceState::Priced {
            unit_price: dec!(1)
        }));
        assert_eq!(component.price_state(), PriceState::Ambiguous { matches: 2 });
    }

    #[test]
    fn test_resource_tree_visitors() {
        let filter = ProductFilter::new("aws", "AmazonS3", "Storage");
        let child = Resource::sub_resource("Standard")
            .with_component(CostComponent::new("Storage", "GB", filter.clone()));
        let mut resource = Resource::new("aws_s3_bucket.b", "aws_s3_bucket")
            .with_component(CostComponent::new("PUT requests", "1k requests", filter))
            .with_child(child);

        assert_eq!(resource.component_count(), 2);

        resource.for_each_component_mut(&mut |c| {
            c.set_price_state(PriceState::NotFound);
        });
        let mut not_found = 0;
        resource.for_each_component(&mut |c| {
            if c.price_state() == PriceState::NotFound {
                not_found += 1;
            }
        });
        assert_eq!(not_found, 2);
    }

    #[test]
    fn test_unsupported_placeholder() {
        let descriptor = ResourceDescriptor::new("aws_unknown_thing", "aws_unknown_thing.x", "");
        let resource = Resource::unsupported(&descriptor);
        assert!(resource.is_unsupported());
        assert!(resource.components.is_empty());
        assert_eq!(resource.name, "aws_unknown_thing.x");
    }
}
