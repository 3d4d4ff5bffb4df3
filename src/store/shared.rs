//! SharedStore - a clone-friendly handle that serializes mutations.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use super::Store;
use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::index::{IndexSpec, IndexStats};
use crate::projection::{ApplyReport, LedgerEvent, ProjectionSpec};
use crate::query::{QueryOptions, QueryResult};
use crate::subscription::{Subscription, SubscriptionId};
use crate::view::{View, ViewChange};

thread_local! {
    /// Stores whose lock this thread currently holds, innermost last.
    static HELD: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

fn is_held(store: usize) -> bool {
    HELD.with(|held| held.borrow().contains(&store))
}

/// Marks a store as held by this thread until dropped.
struct HoldMark {
    store: usize,
}

impl HoldMark {
    fn enter(store: usize) -> Self {
        HELD.with(|held| held.borrow_mut().push(store));
        Self { store }
    }
}

impl Drop for HoldMark {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(position) = held.iter().rposition(|s| *s == self.store) {
                held.remove(position);
            }
        });
    }
}

/// A lock guard that keeps its store marked as held.
struct Held<G> {
    guard: G,
    _mark: HoldMark,
}

impl<G: Deref<Target = Store>> Deref for Held<G> {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.guard
    }
}

impl<G: DerefMut<Target = Store>> DerefMut for Held<G> {
    fn deref_mut(&mut self) -> &mut Store {
        &mut self.guard
    }
}

/// A [`Store`] behind `Arc<RwLock<..>>`.
///
/// Mutations take the write lock, so at most one runs at a time; reads share
/// the read lock. A call on a store whose lock the current thread already
/// holds, e.g. from one of its own subscriber callbacks, fails with
/// [`StoreError::ReentrantAccess`] rather than deadlocking. Other stores stay
/// reachable, so a callback may forward changes into a second store.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<Store>>,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    fn read(&self, operation: &'static str) -> Result<Held<RwLockReadGuard<'_, Store>>> {
        let key = self.key();
        if is_held(key) {
            return Err(StoreError::ReentrantAccess(operation));
        }
        let guard = self
            .inner
            .read()
            .map_err(|_| StoreError::LockPoisoned(operation))?;
        Ok(Held {
            guard,
            _mark: HoldMark::enter(key),
        })
    }

    fn write(&self, operation: &'static str) -> Result<Held<RwLockWriteGuard<'_, Store>>> {
        let key = self.key();
        if is_held(key) {
            return Err(StoreError::ReentrantAccess(operation));
        }
        let guard = self
            .inner
            .write()
            .map_err(|_| StoreError::LockPoisoned(operation))?;
        Ok(Held {
            guard,
            _mark: HoldMark::enter(key),
        })
    }

    /// Run `f` with shared access.
    pub fn with<R>(&self, f: impl FnOnce(&Store) -> R) -> Result<R> {
        let store = self.read("with")?;
        Ok(f(&*store))
    }

    /// Run `f` with exclusive access. Everything `f` does is one critical
    /// section, e.g. a read-check-update sequence.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Store) -> R) -> Result<R> {
        let mut store = self.write("with_mut")?;
        Ok(f(&mut *store))
    }

    pub fn insert(&self, id: impl Into<String>, data: Value) -> Result<Arc<View>> {
        self.write("insert")?.insert(id, data)
    }

    pub fn update(
        &self,
        id: &str,
        data: Value,
        expected_version: Option<u64>,
    ) -> Result<Arc<View>> {
        self.write("update")?.update(id, data, expected_version)
    }

    pub fn upsert(&self, id: impl Into<String>, data: Value) -> Result<Arc<View>> {
        Ok(self.write("upsert")?.upsert(id, data))
    }

    pub fn delete(&self, id: &str) -> Result<Arc<View>> {
        self.write("delete")?.delete(id)
    }

    pub fn clear(&self) -> Result<()> {
        self.write("clear")?.clear();
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        self.write("reset")?.reset();
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Arc<View>>> {
        Ok(self.read("get")?.get(id))
    }

    pub fn has(&self, id: &str) -> Result<bool> {
        Ok(self.read("has")?.has(id))
    }

    pub fn get_all(&self) -> Result<Vec<Arc<View>>> {
        Ok(self.read("get_all")?.get_all())
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.read("size")?.size())
    }

    pub fn query(&self, options: &QueryOptions) -> Result<QueryResult> {
        Ok(self.read("query")?.query(options))
    }

    pub fn find_one(&self, filter: &Filter) -> Result<Option<Arc<View>>> {
        Ok(self.read("find_one")?.find_one(filter))
    }

    pub fn find_many(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<Arc<View>>> {
        Ok(self.read("find_many")?.find_many(filter, limit))
    }

    pub fn count(&self, filter: Option<&Filter>) -> Result<usize> {
        Ok(self.read("count")?.count(filter))
    }

    pub fn create_index(&self, spec: IndexSpec) -> Result<()> {
        self.write("create_index")?.create_index(spec)
    }

    pub fn drop_index(&self, name: &str) -> Result<()> {
        self.write("drop_index")?.drop_index(name)
    }

    pub fn has_index(&self, name: &str) -> Result<bool> {
        Ok(self.read("has_index")?.has_index(name))
    }

    pub fn index_names(&self) -> Result<Vec<String>> {
        Ok(self.read("index_names")?.index_names())
    }

    pub fn index_stats(&self) -> Result<Vec<IndexStats>> {
        Ok(self.read("index_stats")?.index_stats())
    }

    pub fn lookup_by_index(&self, name: &str, value: &Value) -> Result<Vec<Arc<View>>> {
        self.read("lookup_by_index")?.lookup_by_index(name, value)
    }

    pub fn subscribe<F>(&self, callback: F, filter: Option<Filter>) -> Result<Subscription>
    where
        F: Fn(&ViewChange) + Send + Sync + 'static,
    {
        Ok(self.write("subscribe")?.subscribe(callback, filter))
    }

    pub fn subscribe_channel(
        &self,
        filter: Option<Filter>,
    ) -> Result<(Subscription, Receiver<ViewChange>)> {
        Ok(self.write("subscribe_channel")?.subscribe_channel(filter))
    }

    pub fn unsubscribe(&self, id: &SubscriptionId) -> Result<bool> {
        Ok(self.write("unsubscribe")?.unsubscribe(id))
    }

    pub fn subscription_count(&self) -> Result<usize> {
        Ok(self.read("subscription_count")?.subscription_count())
    }

    pub fn register_projection(&self, spec: ProjectionSpec) -> Result<()> {
        self.write("register_projection")?.register_projection(spec)
    }

    pub fn unregister_projection(&self, name: &str) -> Result<bool> {
        Ok(self.write("unregister_projection")?.unregister_projection(name))
    }

    pub fn apply_event(&self, event: &LedgerEvent) -> Result<ApplyReport> {
        self.write("apply_event")?.apply_event(event)
    }

    /// The whole batch runs under one write lock.
    pub fn apply_events<'e>(
        &self,
        events: impl IntoIterator<Item = &'e LedgerEvent>,
    ) -> Result<ApplyReport> {
        self.write("apply_events")?.apply_events(events)
    }

    pub fn projection_names(&self) -> Result<Vec<String>> {
        Ok(self.read("projection_names")?.projection_names())
    }
}
