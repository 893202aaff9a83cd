//! AWS provider for costplan
//!
//! This crate implements the provider trait for AWS, contributing one
//! cost-component builder per supported resource type plus the list of
//! resource types that never cost anything.
//!
//! Each builder documents its missing-usage policy on its registry item:
//!
//! | resource type                      | missing usage                   |
//! |------------------------------------|---------------------------------|
//! | `aws_acmpca_certificate_authority` | placeholder first tier          |
//! | `aws_s3_bucket`                    | placeholder components          |
//! | `aws_lambda_function`              | placeholder components          |
//! | `aws_nat_gateway`                  | data processed omitted          |

pub mod acmpca_certificate_authority;
pub mod lambda_function;
pub mod nat_gateway;
pub mod s3_bucket;
mod util;

use costplan_core::provider::ResourceProvider;
use costplan_core::registry::RegistryItem;

pub use util::HOURS_IN_MONTH;

/// Resource types registered as free
pub const FREE_RESOURCE_TYPES: &[&str] = &[
    "aws_iam_policy",
    "aws_iam_role",
    "aws_security_group",
    "aws_subnet",
    "aws_vpc",
];

/// The AWS resource provider
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsProvider;

impl ResourceProvider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn registry_items(&self) -> Vec<RegistryItem> {
        let mut items = vec![
            acmpca_certificate_authority::registry_item(),
            lambda_function::registry_item(),
            nat_gateway::registry_item(),
            s3_bucket::registry_item(),
        ];
        items.extend(FREE_RESOURCE_TYPES.iter().copied().map(RegistryItem::free));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costplan_core::registry::{Registry, UsagePolicy};
    use costplan_core::types::{ResourceDescriptor, ResourceStatus};

    #[test]
    fn test_registry_items() {
        let registry = Registry::from_providers(&[&AwsProvider]);
        assert_eq!(registry.len(), 4 + FREE_RESOURCE_TYPES.len());
        assert_eq!(
            registry.lookup("aws_nat_gateway").map(|i| i.usage_policy),
            Some(UsagePolicy::Omit)
        );
        assert!(registry.lookup("aws_iam_role").is_some_and(|i| i.is_free()));
    }

    #[test]
    fn test_free_and_unsupported_dispatch() {
        let registry = Registry::from_providers(&[&AwsProvider]);

        let role = registry.build(
            &ResourceDescriptor::new("aws_iam_role", "aws_iam_role.app", "us-east-1"),
            None,
        );
        assert_eq!(role.status, ResourceStatus::Free);
        assert!(role.components.is_empty());

        let table = registry.build(
            &ResourceDescriptor::new("aws_dynamodb_table", "aws_dynamodb_table.t", "us-east-1"),
            None,
        );
        assert_eq!(table.status, ResourceStatus::Unsupported);
    }
}
