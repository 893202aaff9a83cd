//! Provider trait for resource builders
//!
//! Each provider crate (one per cloud vendor) implements this trait so the
//! registry can be assembled from any set of providers with generic code.

use crate::registry::RegistryItem;

/// A cloud vendor's set of supported resource types
pub trait ResourceProvider: Send + Sync {
    /// Vendor name, e.g. `aws`
    fn name(&self) -> &'static str;

    /// Every resource type this provider can build, including free ones
    fn registry_items(&self) -> Vec<RegistryItem>;
}
