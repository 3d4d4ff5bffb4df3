//! Secondary hash indexes over the view table.
//!
//! Every registered index is updated in the same call that mutates the
//! table, so an index never disagrees with the views it covers.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::view::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Exact-match lookup.
    #[default]
    Hash,
}

/// `{name, field, type}` description used to create an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub field: String,
    #[serde(rename = "type", default)]
    pub index_type: IndexType,
}

impl IndexSpec {
    pub fn hash(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            index_type: IndexType::Hash,
        }
    }
}

/// Per-index counts for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub name: String,
    pub field: String,
    /// Number of indexed view ids.
    pub entries: usize,
    /// Number of distinct field values.
    pub keys: usize,
}

/// Hashable form of a field value. Every number, nested ones included, is
/// normalized through `f64` so that keys agree with filter equality (`1`
/// and `1.0` share a key, as do `[1e16]` and `[10000000000000000]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum IndexKey {
    Null,
    Bool(bool),
    Number(u64),
    /// A number with no `f64` form, keyed by its text.
    RawNumber(String),
    String(String),
    Array(Vec<IndexKey>),
    /// Entries sorted by key.
    Object(Vec<(String, IndexKey)>),
}

impl IndexKey {
    pub(crate) fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => IndexKey::Null,
            Value::Bool(b) => IndexKey::Bool(*b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => IndexKey::Number(normalize(f).to_bits()),
                None => IndexKey::RawNumber(n.to_string()),
            },
            Value::String(s) => IndexKey::String(s.clone()),
            Value::Array(items) => IndexKey::Array(items.iter().map(IndexKey::from_value).collect()),
            Value::Object(map) => {
                let mut entries: Vec<(String, IndexKey)> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), IndexKey::from_value(v)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                IndexKey::Object(entries)
            }
        }
    }
}

fn normalize(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

/// A single hash index: field value -> ids of views holding it.
#[derive(Debug, Clone)]
pub(crate) struct HashIndex {
    spec: IndexSpec,
    entries: HashMap<IndexKey, BTreeSet<String>>,
    indexed: usize,
}

impl HashIndex {
    fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            entries: HashMap::new(),
            indexed: 0,
        }
    }

    fn key_for(&self, view: &View) -> Option<IndexKey> {
        view.field(&self.spec.field).map(IndexKey::from_value)
    }

    fn add(&mut self, view: &View) {
        if let Some(key) = self.key_for(view) {
            if self.entries.entry(key).or_default().insert(view.id().to_string()) {
                self.indexed += 1;
            }
        }
    }

    fn remove(&mut self, view: &View) {
        let Some(key) = self.key_for(view) else {
            return;
        };
        if let Some(ids) = self.entries.get_mut(&key) {
            if ids.remove(view.id()) {
                self.indexed -= 1;
            }
            if ids.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.indexed = 0;
    }

    pub(crate) fn field(&self) -> &str {
        &self.spec.field
    }

    /// Ids holding `value`, ascending.
    pub(crate) fn ids(&self, value: &Value) -> impl Iterator<Item = &str> {
        self.entries
            .get(&IndexKey::from_value(value))
            .into_iter()
            .flat_map(|ids| ids.iter().map(String::as_str))
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            name: self.spec.name.clone(),
            field: self.spec.field.clone(),
            entries: self.indexed,
            keys: self.entries.len(),
        }
    }
}

/// Named indexes, kept in creation order.
#[derive(Debug, Default)]
pub(crate) struct IndexManager {
    indexes: Vec<HashIndex>,
}

impl IndexManager {
    /// Register an index and backfill it from `views`.
    pub(crate) fn create<'a>(
        &mut self,
        spec: IndexSpec,
        views: impl Iterator<Item = &'a View>,
    ) -> Result<IndexStats> {
        if self.has(&spec.name) {
            return Err(StoreError::IndexAlreadyExists { name: spec.name });
        }
        let mut index = HashIndex::new(spec);
        for view in views {
            index.add(view);
        }
        let stats = index.stats();
        self.indexes.push(index);
        Ok(stats)
    }

    pub(crate) fn drop_index(&mut self, name: &str) -> Result<()> {
        let position = self
            .indexes
            .iter()
            .position(|index| index.spec.name == name)
            .ok_or_else(|| StoreError::IndexNotFound {
                name: name.to_string(),
            })?;
        self.indexes.remove(position);
        Ok(())
    }

    pub(crate) fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&HashIndex> {
        self.indexes.iter().find(|index| index.spec.name == name)
    }

    /// First index covering `field`, if any.
    pub(crate) fn for_field(&self, field: &str) -> Option<&HashIndex> {
        self.indexes.iter().find(|index| index.field() == field)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.indexes.iter().map(|index| index.spec.name.clone()).collect()
    }

    pub(crate) fn stats(&self) -> Vec<IndexStats> {
        self.indexes.iter().map(HashIndex::stats).collect()
    }

    pub(crate) fn on_insert(&mut self, view: &View) {
        for index in &mut self.indexes {
            index.add(view);
        }
    }

    pub(crate) fn on_update(&mut self, previous: &View, current: &View) {
        for index in &mut self.indexes {
            index.remove(previous);
            index.add(current);
        }
    }

    pub(crate) fn on_delete(&mut self, view: &View) {
        for index in &mut self.indexes {
            index.remove(view);
        }
    }

    /// Empty every index but keep it registered.
    pub(crate) fn clear_entries(&mut self) {
        for index in &mut self.indexes {
            index.clear();
        }
    }

    pub(crate) fn drop_all(&mut self) {
        self.indexes.clear();
    }
}
