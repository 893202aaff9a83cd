//! Evaluation runs
//!
//! An [`Evaluator`] ties the stages of a run together:
//!
//! 1. dispatch every descriptor to its registry builder, in parallel
//! 2. resolve the prices of every component through one run-scoped
//!    [`PriceResolver`]
//! 3. aggregate the priced tree into a [`CostReport`]
//!
//! The registry and catalog are passed in explicitly; nothing is shared
//! between runs except what the caller hands to several of them.

use crate::aggregation::{CostDiff, CostReport, RunStatus, diff};
use costplan_core::config::EngineConfig;
use costplan_core::error::{CostplanError, Result};
use costplan_core::registry::Registry;
use costplan_core::types::{Resource, ResourceDescriptor, UsageMap};
use costplan_pricing::{PriceCatalog, PriceResolver};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Name of the root resource holding the plan resources
pub const PROJECT_ROOT: &str = "project";

/// Reports of a before/after evaluation
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub past: CostReport,
    pub current: CostReport,
    pub diff: CostDiff,
}

/// Runs evaluations against one registry and catalog
pub struct Evaluator {
    registry: Arc<Registry>,
    catalog: Arc<dyn PriceCatalog>,
    config: EngineConfig,
    show_progress: bool,
}

impl Evaluator {
    /// Create an evaluator
    pub fn new(registry: Arc<Registry>, catalog: Arc<dyn PriceCatalog>, config: EngineConfig) -> Self {
        Self {
            registry,
            catalog,
            config,
            show_progress: false,
        }
    }

    /// Show a spinner while prices are resolved
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Build the unpriced tree for a set of descriptors
    ///
    /// Builders run in parallel; the children of the returned root keep the
    /// input order.
    pub fn build_tree(
        registry: &Registry,
        descriptors: &[ResourceDescriptor],
        usage: &UsageMap,
    ) -> Resource {
        let resources: Vec<Resource> = descriptors
            .par_iter()
            .map(|descriptor| registry.build(descriptor, usage.get(&descriptor.address)))
            .collect();
        Resource::project(PROJECT_ROOT, resources)
    }

    /// Evaluate one set of resources
    pub async fn evaluate(
        &self,
        descriptors: Vec<ResourceDescriptor>,
        usage: &UsageMap,
        cancel: CancellationToken,
    ) -> Result<CostReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("evaluation", %run_id);

        async {
            let resolver = self.resolver(cancel);
            let tree = self.build(descriptors, usage.clone()).await?;
            Ok(self.price(&resolver, tree).await)
        }
        .instrument(span)
        .await
    }

    /// Evaluate a past and a current set of resources and compare them
    ///
    /// Both trees share one resolver, so a filter used by both is looked up
    /// once.
    pub async fn evaluate_diff(
        &self,
        past: Vec<ResourceDescriptor>,
        current: Vec<ResourceDescriptor>,
        usage: &UsageMap,
        cancel: CancellationToken,
    ) -> Result<DiffReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("evaluation", %run_id, mode = "diff");

        async {
            let resolver = self.resolver(cancel);
            let past_tree = self.build(past, usage.clone()).await?;
            let current_tree = self.build(current, usage.clone()).await?;

            let past = self.price(&resolver, past_tree).await;
            let current = self.price(&resolver, current_tree).await;
            let diff = diff(&past, &current);
            info!(delta = %diff.total_delta, "Compared plans");

            Ok(DiffReport {
                past,
                current,
                diff,
            })
        }
        .instrument(span)
        .await
    }

    fn resolver(&self, cancel: CancellationToken) -> PriceResolver {
        PriceResolver::new(self.catalog.clone(), &self.config, cancel)
    }

    async fn build(&self, descriptors: Vec<ResourceDescriptor>, usage: UsageMap) -> Result<Resource> {
        let registry = self.registry.clone();
        let count = descriptors.len();

        let tree = tokio::task::spawn_blocking(move || Self::build_tree(&registry, &descriptors, &usage))
            .await
            .map_err(|e| CostplanError::Io(std::io::Error::other(e.to_string())))?;

        info!(
            resources = count,
            components = tree.component_count(),
            "Built cost tree"
        );
        Ok(tree)
    }

    async fn price(&self, resolver: &PriceResolver, mut tree: Resource) -> CostReport {
        let progress = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed_precise}]")
            {
                pb.set_style(style);
            }
            pb.set_message("Resolving prices");
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        resolver.resolve_tree(&mut tree).await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let mut pending = 0usize;
        tree.for_each_component(&mut |c| {
            if !c.price_state().is_terminal() {
                pending += 1;
            }
        });
        let status = if pending > 0 {
            warn!(
                pending,
                cancelled = resolver.is_cancelled(),
                "Evaluation cancelled, report is incomplete"
            );
            RunStatus::Incomplete
        } else {
            RunStatus::Complete
        };

        let stats = resolver.stats();
        info!(
            remote_calls = stats.remote_calls,
            cache_hits = stats.cache_hits,
            transient_failures = stats.transient_failures,
            "Price resolution finished"
        );

        CostReport::from_tree(&tree, &self.config.currency, status)
    }
}
