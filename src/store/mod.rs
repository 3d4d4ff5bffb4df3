//! Store - the facade over the view table, indexes, subscriptions, and
//! projections.
//!
//! Every mutation, whether a direct CRUD call or an event routed through a
//! projection, ends in the same path: the view table is updated, then the
//! indexes, then matching subscribers are notified. All of it happens before
//! the call returns.
//!
//! ## Example
//!
//! ```ignore
//! use view_store::{Filter, IndexSpec, ManualClock, SeededRng, Store};
//!
//! let mut store = Store::new(ManualClock::new(1000), SeededRng::new(42));
//! store.insert("1", json!({ "type": "admin" }))?;
//! store.create_index(IndexSpec::hash("idx_type", "type"))?;
//!
//! let admins = store.lookup_by_index("idx_type", &json!("admin"))?;
//! let adults = store.find_many(&Filter::gte("age", 18), Some(10));
//! ```

mod config;
mod shared;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{Clock, RandomSource};
use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::index::{IndexManager, IndexSpec, IndexStats};
use crate::projection::{ApplyReport, LedgerEvent, PlannedChange, ProjectionRegistry, ProjectionSpec};
use crate::query::{QueryEngine, QueryOptions, QueryResult};
use crate::subscription::{make_id, Subscription, SubscriptionId, SubscriptionRegistry};
use crate::view::{View, ViewChange};

pub use config::StoreConfig;
pub use shared::SharedStore;

/// In-memory, indexed, subscribable view store.
///
/// Mutating methods take `&mut self`. A subscriber callback therefore cannot
/// reach back into the store that is notifying it; wrap the store in a
/// [`SharedStore`] to share it across threads.
pub struct Store {
    clock: Box<dyn Clock>,
    rng: Box<dyn RandomSource>,
    config: StoreConfig,
    views: BTreeMap<String, Arc<View>>,
    indexes: IndexManager,
    subscriptions: SubscriptionRegistry,
    projections: ProjectionRegistry,
    subscription_seq: u64,
}

impl Store {
    pub fn new(clock: impl Clock + 'static, rng: impl RandomSource + 'static) -> Self {
        Self::with_config(clock, rng, StoreConfig::default())
    }

    pub fn with_config(
        clock: impl Clock + 'static,
        rng: impl RandomSource + 'static,
        config: StoreConfig,
    ) -> Self {
        Self {
            clock: Box::new(clock),
            rng: Box::new(rng),
            config,
            views: BTreeMap::new(),
            indexes: IndexManager::default(),
            subscriptions: SubscriptionRegistry::default(),
            projections: ProjectionRegistry::default(),
            subscription_seq: 0,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a view at version 1. Fails if `id` is taken.
    pub fn insert(&mut self, id: impl Into<String>, data: Value) -> Result<Arc<View>> {
        let id = id.into();
        if self.views.contains_key(&id) {
            return Err(StoreError::AlreadyExists { id });
        }
        Ok(self.apply_insert(id, data))
    }

    /// Replace a view's data and bump its version. With `expected_version`,
    /// fails without touching anything if the stored version differs.
    pub fn update(
        &mut self,
        id: &str,
        data: Value,
        expected_version: Option<u64>,
    ) -> Result<Arc<View>> {
        let previous = self
            .views
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if let Some(expected) = expected_version {
            if expected != previous.version() {
                return Err(StoreError::VersionConflict {
                    id: id.to_string(),
                    expected,
                    actual: previous.version(),
                });
            }
        }

        Ok(self.apply_update(previous, data))
    }

    /// Insert if absent, otherwise update with no version check.
    pub fn upsert(&mut self, id: impl Into<String>, data: Value) -> Arc<View> {
        let id = id.into();
        match self.views.get(&id).cloned() {
            Some(previous) => self.apply_update(previous, data),
            None => self.apply_insert(id, data),
        }
    }

    /// Remove a view and return it.
    pub fn delete(&mut self, id: &str) -> Result<Arc<View>> {
        self.apply_delete(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Remove every view, notifying one delete per view in id order.
    /// Indexes stay registered and subscriptions stay live.
    pub fn clear(&mut self) {
        let removed = self.views.len();
        while let Some((_, view)) = self.views.pop_first() {
            self.indexes.on_delete(&view);
            self.notify(ViewChange::delete(view));
        }
        self.indexes.clear_entries();
        debug!(removed, "store cleared");
    }

    /// Drop views, indexes, and subscriptions together, without
    /// notifications. Projections stay registered.
    pub fn reset(&mut self) {
        self.views.clear();
        self.indexes.drop_all();
        self.subscriptions.clear();
        debug!("store reset");
    }

    fn apply_insert(&mut self, id: String, data: Value) -> Arc<View> {
        let view = Arc::new(View::created(id.clone(), data, self.clock.now()));
        self.views.insert(id, view.clone());
        self.indexes.on_insert(&view);
        debug!(id = view.id(), "view inserted");
        self.notify(ViewChange::insert(view.clone()));
        view
    }

    fn apply_update(&mut self, previous: Arc<View>, data: Value) -> Arc<View> {
        let view = Arc::new(previous.next(data, self.clock.now()));
        self.views.insert(view.id().to_string(), view.clone());
        self.indexes.on_update(&previous, &view);
        debug!(id = view.id(), version = view.version(), "view updated");
        self.notify(ViewChange::update(previous, view.clone()));
        view
    }

    fn apply_delete(&mut self, id: &str) -> Option<Arc<View>> {
        let view = self.views.remove(id)?;
        self.indexes.on_delete(&view);
        debug!(id, "view deleted");
        self.notify(ViewChange::delete(view.clone()));
        Some(view)
    }

    fn notify(&mut self, change: ViewChange) {
        let (delivered, disconnected) = self.subscriptions.dispatch(&change);
        debug!(kind = ?change.kind, id = change.view.id(), delivered, "change dispatched");

        if self.config.prune_disconnected_channels {
            for id in disconnected {
                warn!(subscription = %id, "pruning subscription with dropped receiver");
                self.subscriptions.remove(&id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<Arc<View>> {
        self.views.get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.views.contains_key(id)
    }

    /// Every view, ascending by id.
    pub fn get_all(&self) -> Vec<Arc<View>> {
        self.views.values().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.views.len()
    }

    /// Views whose id starts with `prefix`, ascending by id.
    pub(crate) fn scan_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a Arc<View>> + 'a {
        self.views
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(id, _)| id.starts_with(prefix))
            .map(|(_, view)| view)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn engine(&self) -> QueryEngine<'_> {
        QueryEngine {
            table: &self.views,
            indexes: &self.indexes,
            use_indexes: self.config.index_accelerated_queries,
        }
    }

    pub fn query(&self, options: &QueryOptions) -> QueryResult {
        self.engine().query(options)
    }

    /// First match in id order.
    pub fn find_one(&self, filter: &Filter) -> Option<Arc<View>> {
        self.engine().find_one(filter)
    }

    pub fn find_many(&self, filter: &Filter, limit: Option<usize>) -> Vec<Arc<View>> {
        self.engine().find_many(filter, limit)
    }

    pub fn count(&self, filter: Option<&Filter>) -> usize {
        self.engine().count(filter)
    }

    // ------------------------------------------------------------------
    // Indexes
    // ------------------------------------------------------------------

    /// Register an index, backfilled from the current views.
    pub fn create_index(&mut self, spec: IndexSpec) -> Result<()> {
        let stats = self
            .indexes
            .create(spec, self.views.values().map(|view| &**view))?;
        info!(
            index = %stats.name,
            field = %stats.field,
            entries = stats.entries,
            keys = stats.keys,
            "index created"
        );
        Ok(())
    }

    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        self.indexes.drop_index(name)?;
        info!(index = name, "index dropped");
        Ok(())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.has(name)
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indexes.names()
    }

    pub fn index_stats(&self) -> Vec<IndexStats> {
        self.indexes.stats()
    }

    /// Views whose indexed field equals `value`, ascending by id.
    pub fn lookup_by_index(&self, name: &str, value: &Value) -> Result<Vec<Arc<View>>> {
        let index = self
            .indexes
            .get(name)
            .ok_or_else(|| StoreError::IndexNotFound {
                name: name.to_string(),
            })?;
        Ok(index
            .ids(value)
            .filter_map(|id| self.views.get(id).cloned())
            .collect())
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    fn next_subscription_id(&mut self) -> SubscriptionId {
        self.subscription_seq += 1;
        make_id(
            &self.config.subscription_id_prefix,
            self.subscription_seq,
            self.rng.next_u64(),
        )
    }

    /// Call `callback` synchronously for every change whose view matches
    /// `filter` (the removed view, for deletes).
    pub fn subscribe<F>(&mut self, callback: F, filter: Option<Filter>) -> Subscription
    where
        F: Fn(&ViewChange) + Send + Sync + 'static,
    {
        let id = self.next_subscription_id();
        debug!(subscription = %id, "subscribed");
        self.subscriptions.add_callback(id, Box::new(callback), filter)
    }

    /// Like [`subscribe`](Self::subscribe), but changes are sent down a
    /// channel within the mutating call.
    pub fn subscribe_channel(&mut self, filter: Option<Filter>) -> (Subscription, Receiver<ViewChange>) {
        let id = self.next_subscription_id();
        let (tx, rx) = channel();
        debug!(subscription = %id, "subscribed channel");
        (self.subscriptions.add_channel(id, tx, filter), rx)
    }

    /// No-op for unknown ids. Returns whether a subscription was removed.
    pub fn unsubscribe(&mut self, id: &SubscriptionId) -> bool {
        self.subscriptions.remove(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    // ------------------------------------------------------------------
    // Projections
    // ------------------------------------------------------------------

    pub fn register_projection(&mut self, spec: ProjectionSpec) -> Result<()> {
        let name = spec.name().to_string();
        self.projections.register(spec)?;
        info!(projection = %name, "projection registered");
        Ok(())
    }

    /// Returns whether a projection was removed.
    pub fn unregister_projection(&mut self, name: &str) -> bool {
        let removed = self.projections.unregister(name);
        if removed {
            info!(projection = name, "projection unregistered");
        }
        removed
    }

    pub fn projection_names(&self) -> Vec<String> {
        self.projections.names()
    }

    /// Route `event` to every projection consuming its type. Views are
    /// versioned and timestamped by the store, never by the patch.
    ///
    /// All projectors run and every delete target is resolved before the
    /// first mutation, so a failure leaves the store untouched.
    pub fn apply_event(&mut self, event: &LedgerEvent) -> Result<ApplyReport> {
        let planned = self.projections.plan(event)?;
        let mut report = ApplyReport {
            matched: planned.len(),
            ..ApplyReport::default()
        };

        for change in planned {
            match change {
                PlannedChange::Upsert(patch) => {
                    self.upsert(patch.id, patch.data);
                    report.upserts += 1;
                }
                PlannedChange::Delete(id) => {
                    if self.apply_delete(&id).is_some() {
                        report.deletes += 1;
                    } else {
                        debug!(id = %id, event_type = %event.event_type, "projected delete of absent view");
                    }
                }
            }
        }

        debug!(
            event_type = %event.event_type,
            matched = report.matched,
            upserts = report.upserts,
            deletes = report.deletes,
            "event applied"
        );
        Ok(report)
    }

    /// Apply events in order, stopping at the first error.
    pub fn apply_events<'e>(
        &mut self,
        events: impl IntoIterator<Item = &'e LedgerEvent>,
    ) -> Result<ApplyReport> {
        let mut total = ApplyReport::default();
        for event in events {
            total += self.apply_event(event)?;
        }
        Ok(total)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("views", &self.views.len())
            .field("indexes", &self.indexes.names())
            .field("subscriptions", &self.subscriptions.len())
            .field("projections", &self.projections.names())
            .field("config", &self.config)
            .finish()
    }
}
