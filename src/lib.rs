//! # view_store
//!
//! An in-process materialized view store. It holds uniquely keyed,
//! versioned documents ("views") and provides:
//!
//! - **CRUD with optimistic concurrency**: `insert`, `update` with an
//!   expected version, `upsert`, `delete`
//! - **Queries**: predicate filters with offset/limit pagination
//! - **Hash indexes**: equality lookup without scanning, maintained on every
//!   mutation
//! - **Subscriptions**: synchronous, optionally filtered change callbacks or
//!   channels
//! - **Projections**: views derived from an external event stream
//! - **Typed read models**: serde types stored as views via `#[derive(ReadModel)]`
//!
//! Time and randomness are injected ([`Clock`], [`RandomSource`]), so two
//! stores fed the same inputs end in identical states.

extern crate self as view_store;

mod clock;
mod error;
mod filter;
mod index;
mod projection;
mod query;
mod read_model;
mod store;
mod subscription;
mod view;

pub use clock::{Clock, FixedClock, ManualClock, RandomSource, SeededRng};
pub use error::{Result, StoreError};
pub use filter::{Filter, Operator};
pub use index::{IndexSpec, IndexStats, IndexType};
pub use projection::{
    ApplyReport, LedgerEvent, ProjectionOutcome, ProjectionSpec, Projector, TargetId, ViewPatch,
};
pub use query::{QueryOptions, QueryResult};
pub use read_model::{ReadModel, ReadModelRepository, ReadModelsExt, Versioned};
pub use store::{SharedStore, Store, StoreConfig};
pub use subscription::{Callback, Subscription, SubscriptionId};
pub use view::{ChangeKind, View, ViewChange};

// Derive macro for typed read models.
pub use view_store_macros::ReadModel;
