//! Views - the versioned documents held by the store.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// A uniquely keyed, versioned, timestamped document.
///
/// Views are immutable once built. The store hands them out as `Arc<View>`;
/// any change goes back through the store and produces a new View.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    id: String,
    data: Value,
    timestamp: u64,
    version: u64,
}

impl View {
    pub(crate) fn created(id: String, data: Value, timestamp: u64) -> Self {
        Self {
            id,
            data,
            timestamp,
            version: 1,
        }
    }

    /// The successor of this view carrying `data`, one version later.
    pub(crate) fn next(&self, data: Value, timestamp: u64) -> Self {
        Self {
            id: self.id.clone(),
            data,
            timestamp,
            version: self.version + 1,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Clock value at the last mutation.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Starts at 1, incremented by exactly 1 on every update.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Read a field of `data`. An exact top-level key wins; otherwise a
    /// dotted path descends into nested objects.
    pub fn field(&self, field: &str) -> Option<&Value> {
        lookup_field(&self.data, field)
    }
}

pub(crate) fn lookup_field<'a>(data: &'a Value, field: &str) -> Option<&'a Value> {
    let object = data.as_object()?;
    if let Some(value) = object.get(field) {
        return Some(value);
    }
    if !field.contains('.') {
        return None;
    }
    let mut current = data;
    for segment in field.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// What happened to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change notification delivered to subscribers.
///
/// `view` is the post-image for inserts and updates and the removed view for
/// deletes. `previous` carries the pre-image of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewChange {
    pub kind: ChangeKind,
    pub view: Arc<View>,
    pub previous: Option<Arc<View>>,
}

impl ViewChange {
    pub(crate) fn insert(view: Arc<View>) -> Self {
        Self {
            kind: ChangeKind::Insert,
            view,
            previous: None,
        }
    }

    pub(crate) fn update(previous: Arc<View>, view: Arc<View>) -> Self {
        Self {
            kind: ChangeKind::Update,
            view,
            previous: Some(previous),
        }
    }

    pub(crate) fn delete(view: Arc<View>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            view,
            previous: None,
        }
    }
}
