//! ReadModelRepository - Typed accessor for read model CRUD operations.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use super::{decode, encode, index_name, view_key, ReadModel, Versioned};
use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::index::IndexSpec;
use crate::store::Store;
use crate::view::View;

/// Typed repository over the views of one read model collection.
pub struct ReadModelRepository<'a, M> {
    store: &'a mut Store,
    _marker: PhantomData<M>,
}

impl<'a, M: ReadModel> ReadModelRepository<'a, M> {
    pub fn new(store: &'a mut Store) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    fn decode_all(&self, views: impl IntoIterator<Item = Arc<View>>) -> Result<Vec<Versioned<M>>> {
        views
            .into_iter()
            .filter(|view| in_collection::<M>(view))
            .map(|view| decode(&view))
            .collect()
    }

    /// Get a read model by ID.
    pub fn get(&self, id: &str) -> Result<Option<Versioned<M>>> {
        self.store
            .get(&view_key::<M>(id))
            .map(|view| decode(&view))
            .transpose()
    }

    /// Insert a new read model. Fails if it already exists.
    pub fn insert(&mut self, model: &M) -> Result<Versioned<M>> {
        let view = self.store.insert(model.key(), encode(model)?)?;
        decode(&view)
    }

    /// Update an existing read model with optimistic concurrency.
    pub fn update(&mut self, model: &M, expected_version: u64) -> Result<Versioned<M>> {
        let view = self
            .store
            .update(&model.key(), encode(model)?, Some(expected_version))?;
        decode(&view)
    }

    /// Upsert a read model (insert or update, no version check).
    pub fn upsert(&mut self, model: &M) -> Result<Versioned<M>> {
        let view = self.store.upsert(model.key(), encode(model)?);
        decode(&view)
    }

    /// Delete a read model by ID. Returns true if it existed.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        match self.store.delete(&view_key::<M>(id)) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Every model in the collection, ascending by id.
    pub fn all(&self) -> Result<Vec<Versioned<M>>> {
        self.store
            .scan_prefix(&collection_prefix::<M>())
            .map(|view| decode(view))
            .collect()
    }

    /// Find read models matching a predicate.
    pub fn find(&self, predicate: &dyn Fn(&M) -> bool) -> Result<Vec<Versioned<M>>> {
        let mut results = Vec::new();
        for model in self.all()? {
            if predicate(&model.data) {
                results.push(model);
            }
        }
        Ok(results)
    }

    /// Find the first read model matching a predicate.
    pub fn find_one(&self, predicate: &dyn Fn(&M) -> bool) -> Result<Option<Versioned<M>>> {
        for view in self.store.scan_prefix(&collection_prefix::<M>()) {
            let model = decode::<M>(view)?;
            if predicate(&model.data) {
                return Ok(Some(model));
            }
        }
        Ok(None)
    }

    /// Find read models whose JSON form matches `filter`.
    pub fn find_by(&self, filter: &Filter) -> Result<Vec<Versioned<M>>> {
        self.decode_all(self.store.find_many(filter, None))
    }

    /// Create a hash index for every field in `M::INDEXED_FIELDS` that does
    /// not have one yet.
    pub fn ensure_indexes(&mut self) -> Result<()> {
        for field in M::INDEXED_FIELDS {
            let name = index_name::<M>(field);
            if !self.store.has_index(&name) {
                self.store.create_index(IndexSpec::hash(name, *field))?;
            }
        }
        Ok(())
    }

    /// Models whose `field` equals `value`, through the collection's index
    /// when one exists.
    pub fn lookup(&self, field: &str, value: &Value) -> Result<Vec<Versioned<M>>> {
        let name = index_name::<M>(field);
        if self.store.has_index(&name) {
            self.decode_all(self.store.lookup_by_index(&name, value)?)
        } else {
            self.find_by(&Filter::eq(field, value.clone()))
        }
    }
}

fn collection_prefix<M: ReadModel>() -> String {
    format!("{}:", M::COLLECTION)
}

fn in_collection<M: ReadModel>(view: &View) -> bool {
    view.id().starts_with(&collection_prefix::<M>())
}

/// Extension trait for typed read model access on a [`Store`].
pub trait ReadModelsExt {
    /// Get a typed read model repository.
    fn read_models<M: ReadModel>(&mut self) -> ReadModelRepository<'_, M>;
}

impl ReadModelsExt for Store {
    fn read_models<M: ReadModel>(&mut self) -> ReadModelRepository<'_, M> {
        ReadModelRepository::new(self)
    }
}
