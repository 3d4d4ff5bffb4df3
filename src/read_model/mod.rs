//! Read Models - typed access to views.
//!
//! A read model is a serde type stored as a view whose id is
//! `"<collection>:<id>"` and whose data is the model's JSON form. It goes
//! through the same store path as untyped views, so versions, indexes, and
//! subscribers see typed writes too.
//!
//! ## Example
//!
//! ```ignore
//! use view_store::{ReadModel, ReadModelsExt, Store};
//!
//! #[derive(Serialize, Deserialize, ReadModel)]
//! #[readmodel(collection = "game_views")]
//! struct GameView {
//!     #[readmodel(id)]
//!     pub id: String,
//!     #[readmodel(index)]
//!     pub status: String,
//!     pub score: u32,
//! }
//!
//! let mut games = store.read_models::<GameView>();
//! games.ensure_indexes()?;
//! games.upsert(&view)?;
//! let live = games.lookup("status", &json!("live"))?;
//! ```

mod repository;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, StoreError};
use crate::view::View;

/// Trait for types that can be stored as read models.
pub trait ReadModel: Serialize + DeserializeOwned {
    /// Collection name, used as the view id prefix (e.g. "game_views").
    const COLLECTION: &'static str;

    /// Fields that get a hash index from
    /// [`ReadModelRepository::ensure_indexes`].
    const INDEXED_FIELDS: &'static [&'static str] = &[];

    /// Returns the unique identifier for this read model instance.
    fn id(&self) -> &str;

    /// The view id this model is stored under.
    fn key(&self) -> String {
        view_key::<Self>(self.id())
    }
}

/// A decoded read model with its view envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
    pub timestamp: u64,
}

pub(crate) fn view_key<M: ReadModel + ?Sized>(id: &str) -> String {
    format!("{}:{}", M::COLLECTION, id)
}

pub(crate) fn index_name<M: ReadModel + ?Sized>(field: &str) -> String {
    format!("{}_by_{}", M::COLLECTION, field)
}

pub(crate) fn decode<M: ReadModel>(view: &View) -> Result<Versioned<M>> {
    let data = M::deserialize(view.data()).map_err(|e| StoreError::Serde(e.to_string()))?;
    Ok(Versioned {
        data,
        version: view.version(),
        timestamp: view.timestamp(),
    })
}

pub(crate) fn encode<M: ReadModel>(model: &M) -> Result<serde_json::Value> {
    serde_json::to_value(model).map_err(|e| StoreError::Serde(e.to_string()))
}

pub use repository::{ReadModelRepository, ReadModelsExt};
