//! Run-scoped price resolution
//!
//! A [`PriceResolver`] belongs to exactly one evaluation run. It resolves
//! filter queries against a [`PriceCatalog`] and guarantees that:
//!
//! - identical normalized queries are looked up remotely at most once per
//!   run; later requesters read the cached state, concurrent requesters wait
//!   for the first one's result
//! - independent queries are grouped into batches of at most `batch_size`
//! - at most `max_concurrency` remote calls are in flight at any time
//! - transport failures are retried with capped exponential backoff and end
//!   as `NotFound` once `max_attempts` is used up
//! - a failing query never affects the state of any other query; when a
//!   batch fails, its queries are retried one by one
//! - cancellation abandons pending lookups without caching anything for them
//!
//! The cache is dropped with the resolver and never outlives the run.

use crate::catalog::{PriceCatalog, PriceQuery, classify, validate_patterns};
use costplan_core::config::EngineConfig;
use costplan_core::error::{CostplanError, Result};
use costplan_core::types::{PriceState, Resource};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Resolution state of one query inside the run cache
enum Slot {
    /// A lookup is running; the receiver yields its final state
    InFlight(watch::Receiver<Option<PriceState>>),
    /// Final state for the rest of the run
    Resolved(PriceState),
}

/// Counters describing the work a resolver has done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Remote catalog calls issued, batched or single
    pub remote_calls: usize,
    /// Queries answered from the cache or by waiting on another requester
    pub cache_hits: usize,
    /// Failed remote calls
    pub transient_failures: usize,
}

/// Outcome of looking up one query owned by this requester
struct Lookup {
    state: PriceState,
    /// Whether `state` is final and may be cached
    final_state: bool,
}

impl Lookup {
    fn done(state: PriceState) -> Self {
        Self {
            state,
            final_state: true,
        }
    }

    fn abandoned(state: PriceState) -> Self {
        Self {
            state,
            final_state: false,
        }
    }
}

/// Ownership of an in-flight cache slot
///
/// Dropping it without publishing removes the slot, which wakes every waiter
/// with a closed channel.
struct PendingSlot<'a> {
    resolver: &'a PriceResolver,
    query: PriceQuery,
    sender: Option<watch::Sender<Option<PriceState>>>,
}

impl PendingSlot<'_> {
    fn publish(mut self, lookup: &Lookup) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        let mut slots = self.resolver.slots();
        if lookup.final_state {
            sender.send_replace(Some(lookup.state));
            slots.insert(self.query.clone(), Slot::Resolved(lookup.state));
        } else {
            slots.remove(&self.query);
        }
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if self.sender.take().is_some() {
            self.resolver.slots().remove(&self.query);
        }
    }
}

/// Resolves price queries for one evaluation run
pub struct PriceResolver {
    catalog: Arc<dyn PriceCatalog>,
    config: EngineConfig,
    slots: Mutex<HashMap<PriceQuery, Slot>>,
    permits: Semaphore,
    cancel: CancellationToken,
    remote_calls: AtomicUsize,
    cache_hits: AtomicUsize,
    transient_failures: AtomicUsize,
}

impl PriceResolver {
    /// Create a resolver for one run
    pub fn new(
        catalog: Arc<dyn PriceCatalog>,
        config: &EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            config: config.clone(),
            slots: Mutex::new(HashMap::new()),
            permits: Semaphore::new(config.max_concurrency.max(1)),
            cancel,
            remote_calls: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            transient_failures: AtomicUsize::new(0),
        }
    }

    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Work done so far
    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<PriceQuery, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a single query
    pub async fn resolve(&self, query: PriceQuery) -> PriceState {
        self.resolve_all([query.clone()])
            .await
            .remove(&query)
            .unwrap_or_default()
    }

    /// Resolve many queries, returning the state of each distinct query
    ///
    /// Queries left `Unresolved` (or in `TransientFailure`) were abandoned
    /// because the run was cancelled.
    pub async fn resolve_all(
        &self,
        queries: impl IntoIterator<Item = PriceQuery>,
    ) -> HashMap<PriceQuery, PriceState> {
        let unique: HashSet<PriceQuery> = queries.into_iter().collect();
        let mut results = HashMap::with_capacity(unique.len());
        let mut waiting = Vec::new();
        let mut owned = Vec::new();

        {
            let mut slots = self.slots();
            for query in unique {
                match slots.get(&query) {
                    Some(Slot::Resolved(state)) => {
                        self.cache_hits.fetch_add(1, Ordering::Relaxed);
                        results.insert(query, *state);
                    }
                    Some(Slot::InFlight(receiver)) => {
                        self.cache_hits.fetch_add(1, Ordering::Relaxed);
                        waiting.push((query, receiver.clone()));
                    }
                    None => {
                        if let Err(e) = validate_patterns(&query.product_filter) {
                            warn!(error = %e, "Invalid filter pattern, price not found");
                            slots.insert(query.clone(), Slot::Resolved(PriceState::NotFound));
                            results.insert(query, PriceState::NotFound);
                            continue;
                        }
                        let (sender, receiver) = watch::channel(None);
                        slots.insert(query.clone(), Slot::InFlight(receiver));
                        owned.push(PendingSlot {
                            resolver: self,
                            query,
                            sender: Some(sender),
                        });
                    }
                }
            }
        }

        owned.sort_by(|a, b| a.query.cmp(&b.query));
        let mut batches = Vec::new();
        let mut owned = owned.into_iter().peekable();
        while owned.peek().is_some() {
            batches.push(owned.by_ref().take(self.config.batch_size.max(1)).collect::<Vec<_>>());
        }

        debug!(
            cached = results.len(),
            waiting = waiting.len(),
            batches = batches.len(),
            "Resolving prices"
        );

        let fetched = join_all(batches.into_iter().map(|batch| self.fetch_batch(batch))).await;
        results.extend(fetched.into_iter().flatten());

        for (query, mut receiver) in waiting {
            let state = match receiver.wait_for(Option::is_some).await {
                Ok(state) => (*state).unwrap_or_default(),
                Err(_) => PriceState::Unresolved,
            };
            results.insert(query, state);
        }

        results
    }

    /// Resolve every component of a tree in place
    pub async fn resolve_tree(&self, root: &mut Resource) {
        let mut queries = Vec::new();
        root.for_each_component(&mut |c| {
            queries.push(PriceQuery::new(&c.product_filter, &c.price_filter));
        });
        let component_count = queries.len();

        let states = self.resolve_all(queries).await;
        root.for_each_component_mut(&mut |c| {
            let query = PriceQuery::new(&c.product_filter, &c.price_filter);
            if let Some(state) = states.get(&query) {
                if *state != PriceState::Unresolved && !c.set_price_state(*state) {
                    debug!(component = %c.name, "Price state already final, kept");
                }
            }
        });

        info!(
            components = component_count,
            distinct_filters = states.len(),
            "Resolved prices for {}",
            root.name
        );
    }

    async fn fetch_batch(&self, batch: Vec<PendingSlot<'_>>) -> Vec<(PriceQuery, PriceState)> {
        let queries: Vec<PriceQuery> = batch.iter().map(|p| p.query.clone()).collect();

        let lookups = match self.remote_lookup(&queries).await {
            Ok(states) => states.into_iter().map(Lookup::done).collect(),
            Err(CostplanError::Cancelled) => queries
                .iter()
                .map(|_| Lookup::abandoned(PriceState::Unresolved))
                .collect(),
            Err(e) if e.is_transient() => {
                self.transient_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    catalog = self.catalog.name(),
                    queries = queries.len(),
                    error = %e,
                    "Price batch failed, retrying filters individually"
                );
                join_all(queries.iter().map(|q| self.retry_single(q, true))).await
            }
            Err(e) if queries.len() == 1 => {
                warn!(
                    catalog = self.catalog.name(),
                    error = %e,
                    "Price lookup rejected, treating as not found"
                );
                vec![Lookup::done(PriceState::NotFound)]
            }
            Err(e) => {
                warn!(
                    catalog = self.catalog.name(),
                    queries = queries.len(),
                    error = %e,
                    "Price batch rejected, looking filters up individually"
                );
                join_all(queries.iter().map(|q| self.retry_single(q, false))).await
            }
        };

        batch
            .into_iter()
            .zip(lookups)
            .map(|(pending, lookup)| {
                let query = pending.query.clone();
                pending.publish(&lookup);
                (query, lookup.state)
            })
            .collect()
    }

    /// Retry one query after its batch failed
    ///
    /// Only transient errors are retried; a rejected query resolves to
    /// `NotFound` at once. `backoff` delays the first attempt.
    async fn retry_single(&self, query: &PriceQuery, mut backoff: bool) -> Lookup {
        let mut attempts = 1;
        loop {
            if attempts >= self.config.max_attempts {
                warn!(
                    service = %query.product_filter.service,
                    product_family = %query.product_filter.product_family,
                    attempts,
                    "Price lookup failed after retries, treating as not found"
                );
                return Lookup::done(PriceState::NotFound);
            }

            if backoff {
                let delay = self.config.backoff_delay(attempts - 1);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        return Lookup::abandoned(PriceState::TransientFailure { attempts });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            backoff = true;

            attempts += 1;
            match self.remote_lookup(std::slice::from_ref(query)).await {
                Ok(mut states) => {
                    return Lookup::done(states.pop().unwrap_or(PriceState::NotFound));
                }
                Err(CostplanError::Cancelled) => {
                    return Lookup::abandoned(PriceState::TransientFailure {
                        attempts: attempts - 1,
                    });
                }
                Err(e) if !e.is_transient() => {
                    warn!(
                        service = %query.product_filter.service,
                        error = %e,
                        "Price lookup rejected, treating as not found"
                    );
                    return Lookup::done(PriceState::NotFound);
                }
                Err(e) => {
                    self.transient_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(attempts, error = %e, "Price lookup attempt failed");
                }
            }
        }
    }

    /// One remote call, holding a concurrency permit for its duration
    async fn remote_lookup(&self, queries: &[PriceQuery]) -> Result<Vec<PriceState>> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(CostplanError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| CostplanError::Cancelled)?,
        };

        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        let records = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(CostplanError::Cancelled),
            records = self.catalog.lookup(queries) => records?,
        };

        if records.len() != queries.len() {
            return Err(CostplanError::Catalog(format!(
                "{} returned {} results for {} queries",
                self.catalog.name(),
                records.len(),
                queries.len()
            )));
        }

        Ok(records.iter().map(|r| classify(r)).collect())
    }
}
