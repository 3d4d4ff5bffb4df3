//! Projections - derive views from an external event stream.
//!
//! A projection names the event types it consumes and a projector that turns
//! each such event into a view change. The store applies the change through
//! the same path as direct CRUD, so versions, indexes, and subscribers stay
//! consistent.
//!
//! ## Example
//!
//! ```ignore
//! use view_store::{LedgerEvent, ProjectionOutcome, ProjectionSpec, ViewPatch};
//!
//! store.register_projection(ProjectionSpec::new(
//!     "users",
//!     ["USER_CREATED", "USER_DELETED"],
//!     |event: &LedgerEvent| match event.event_type.as_str() {
//!         "USER_CREATED" => ProjectionOutcome::Upsert(ViewPatch::new(
//!             event.payload_str("id").unwrap_or_default(),
//!             json!({ "name": event.payload["name"] }),
//!         )),
//!         _ => ProjectionOutcome::Absent,
//!     },
//! ))?;
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

/// An event fed into `apply_event`. Read-only input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    pub timestamp: u64,
}

impl LedgerEvent {
    pub fn new(event_type: impl Into<String>, payload: Value, timestamp: u64) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp,
        }
    }

    /// A top-level string field of the payload.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field)?.as_str()
    }
}

/// The `{id, data}` a projector wants stored. Timestamp and version are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewPatch {
    pub id: String,
    pub data: Value,
}

impl ViewPatch {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// What a projector produced for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionOutcome {
    /// Create or replace the view.
    Upsert(ViewPatch),
    /// Remove the view with this id.
    Delete(String),
    /// No view. The target is resolved by the projection's id extractor
    /// and removed.
    Absent,
}

impl From<Option<ViewPatch>> for ProjectionOutcome {
    fn from(patch: Option<ViewPatch>) -> Self {
        match patch {
            Some(patch) => ProjectionOutcome::Upsert(patch),
            None => ProjectionOutcome::Absent,
        }
    }
}

pub type Projector = Box<dyn Fn(&LedgerEvent) -> ProjectionOutcome + Send + Sync>;
pub type TargetId = Box<dyn Fn(&LedgerEvent) -> Option<String> + Send + Sync>;

/// Registration for `register_projection`.
pub struct ProjectionSpec {
    name: String,
    source_event_types: BTreeSet<String>,
    projector: Projector,
    target_id: TargetId,
}

impl ProjectionSpec {
    pub fn new<I, S, F>(name: impl Into<String>, source_event_types: I, projector: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&LedgerEvent) -> ProjectionOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source_event_types: source_event_types.into_iter().map(Into::into).collect(),
            projector: Box::new(projector),
            target_id: Box::new(payload_id),
        }
    }

    /// Override how an `Absent` outcome finds the view to delete. The
    /// default reads the string `payload.id`.
    pub fn with_target_id<F>(mut self, target_id: F) -> Self
    where
        F: Fn(&LedgerEvent) -> Option<String> + Send + Sync + 'static,
    {
        self.target_id = Box::new(target_id);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_event_types(&self) -> &BTreeSet<String> {
        &self.source_event_types
    }

    fn consumes(&self, event_type: &str) -> bool {
        self.source_event_types.contains(event_type)
    }
}

impl fmt::Debug for ProjectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionSpec")
            .field("name", &self.name)
            .field("source_event_types", &self.source_event_types)
            .finish_non_exhaustive()
    }
}

fn payload_id(event: &LedgerEvent) -> Option<String> {
    event.payload_str("id").map(str::to_string)
}

/// A resolved mutation, ready for the store to apply.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlannedChange {
    Upsert(ViewPatch),
    Delete(String),
}

/// Counts from one `apply_event` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    /// Projections whose source types included the event type.
    pub matched: usize,
    pub upserts: usize,
    /// Views actually removed. Deletes of absent ids are not counted.
    pub deletes: usize,
}

impl std::ops::AddAssign for ApplyReport {
    fn add_assign(&mut self, other: Self) {
        self.matched += other.matched;
        self.upserts += other.upserts;
        self.deletes += other.deletes;
    }
}

/// Projections in registration order.
#[derive(Default)]
pub(crate) struct ProjectionRegistry {
    projections: Vec<ProjectionSpec>,
}

impl ProjectionRegistry {
    pub(crate) fn register(&mut self, spec: ProjectionSpec) -> Result<()> {
        if self.projections.iter().any(|p| p.name == spec.name) {
            return Err(StoreError::ProjectionAlreadyExists { name: spec.name });
        }
        self.projections.push(spec);
        Ok(())
    }

    pub(crate) fn unregister(&mut self, name: &str) -> bool {
        let before = self.projections.len();
        self.projections.retain(|p| p.name != name);
        self.projections.len() != before
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.projections.iter().map(|p| p.name.clone()).collect()
    }

    /// Run every projector that consumes `event` and resolve its target.
    /// Nothing is returned unless every target resolves.
    pub(crate) fn plan(&self, event: &LedgerEvent) -> Result<Vec<PlannedChange>> {
        let mut planned = Vec::new();
        for projection in self.projections.iter().filter(|p| p.consumes(&event.event_type)) {
            let change = match (projection.projector)(event) {
                ProjectionOutcome::Upsert(patch) => PlannedChange::Upsert(patch),
                ProjectionOutcome::Delete(id) => PlannedChange::Delete(id),
                ProjectionOutcome::Absent => {
                    let id = (projection.target_id)(event).ok_or_else(|| {
                        StoreError::MissingTargetId {
                            projection: projection.name.clone(),
                            event_type: event.event_type.clone(),
                        }
                    })?;
                    PlannedChange::Delete(id)
                }
            };
            planned.push(change);
        }
        Ok(planned)
    }
}
