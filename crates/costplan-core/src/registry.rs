//! Resource registry
//!
//! Maps resource type names to cost-component builders. The table is built
//! once from the registered providers and passed explicitly into each
//! evaluation run, so runs never share hidden global state.
//!
//! # Examples
//!
//! ```
//! use costplan_core::registry::{Registry, RegistryItem, UsagePolicy};
//! use costplan_core::types::{Resource, ResourceDescriptor, UsageRecord};
//!
//! fn build_widget(d: &ResourceDescriptor, _u: Option<&UsageRecord>) -> Resource {
//!     Resource::new(&d.address, &d.resource_type)
//! }
//!
//! let registry = Registry::new(vec![
//!     RegistryItem::new("widget", build_widget, UsagePolicy::NotApplicable),
//! ]);
//!
//! let known = ResourceDescriptor::new("widget", "widget.a", "us-east-1");
//! let unknown = ResourceDescriptor::new("gadget", "gadget.b", "us-east-1");
//!
//! assert!(!registry.build(&known, None).is_unsupported());
//! assert!(registry.build(&unknown, None).is_unsupported());
//! ```

use crate::provider::ResourceProvider;
use crate::types::{Resource, ResourceDescriptor, UsageRecord};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, warn};

/// Builds the cost tree for one resource
///
/// Builders are pure: they only read the descriptor and usage and never
/// perform I/O.
pub type BuildFn = fn(&ResourceDescriptor, Option<&UsageRecord>) -> Resource;

/// What a builder does with usage-priced components when usage data is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsagePolicy {
    /// Emit the component with an unknown quantity
    Placeholder,
    /// Leave the component out
    Omit,
    /// The builder has no usage-priced components
    NotApplicable,
}

/// One entry of the registry
#[derive(Debug, Clone, Copy)]
pub struct RegistryItem {
    /// Resource type name
    pub name: &'static str,
    /// Builder; `None` for free resource types
    pub build: Option<BuildFn>,
    /// Documented missing-usage policy of the builder
    pub usage_policy: UsagePolicy,
}

impl RegistryItem {
    /// A priced resource type
    pub const fn new(name: &'static str, build: BuildFn, usage_policy: UsagePolicy) -> Self {
        Self {
            name,
            build: Some(build),
            usage_policy,
        }
    }

    /// A resource type that never costs anything
    pub const fn free(name: &'static str) -> Self {
        Self {
            name,
            build: None,
            usage_policy: UsagePolicy::NotApplicable,
        }
    }

    /// Whether the type is registered as free
    pub fn is_free(&self) -> bool {
        self.build.is_none()
    }
}

/// Immutable lookup table from resource type name to builder
#[derive(Debug, Clone, Default)]
pub struct Registry {
    items: HashMap<&'static str, RegistryItem>,
}

impl Registry {
    /// Build a registry from a list of items
    ///
    /// If two items share a name, the first one wins.
    pub fn new(items: impl IntoIterator<Item = RegistryItem>) -> Self {
        let mut map = HashMap::new();
        for item in items {
            match map.entry(item.name) {
                Entry::Vacant(slot) => {
                    slot.insert(item);
                }
                Entry::Occupied(_) => {
                    warn!(resource_type = item.name, "Duplicate registry item ignored");
                }
            }
        }
        Self { items: map }
    }

    /// Build a registry from every item the providers contribute
    pub fn from_providers(providers: &[&dyn ResourceProvider]) -> Self {
        Self::new(providers.iter().flat_map(|p| {
            debug!(provider = p.name(), "Registering provider resources");
            p.registry_items()
        }))
    }

    /// Look up a resource type
    pub fn lookup(&self, resource_type: &str) -> Option<&RegistryItem> {
        self.items.get(resource_type)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Registered type names, sorted
    pub fn resource_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.items.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Dispatch a descriptor to its builder
    ///
    /// Never fails: an unregistered type yields an unsupported placeholder
    /// with no cost components.
    pub fn build(&self, descriptor: &ResourceDescriptor, usage: Option<&UsageRecord>) -> Resource {
        match self.lookup(&descriptor.resource_type) {
            Some(RegistryItem {
                build: Some(build), ..
            }) => build(descriptor, usage),
            Some(_) => Resource::free(descriptor),
            None => {
                debug!(
                    address = %descriptor.address,
                    resource_type = %descriptor.resource_type,
                    "Unsupported resource type"
                );
                Resource::unsupported(descriptor)
            }
        }
    }
}
