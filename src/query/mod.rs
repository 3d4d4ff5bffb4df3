//! Query engine - filtered, paginated reads over the view table.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::filter::{Filter, Operator};
use crate::index::IndexManager;
use crate::view::View;

/// Options for `Store::query`. Offset is applied before limit.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub filter: Option<Filter>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// A page of matches. `total` counts every match before pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub views: Vec<Arc<View>>,
    pub total: usize,
    pub has_more: bool,
}

/// Read-only access to the table plus its indexes.
pub(crate) struct QueryEngine<'a> {
    pub(crate) table: &'a BTreeMap<String, Arc<View>>,
    pub(crate) indexes: &'a IndexManager,
    pub(crate) use_indexes: bool,
}

impl<'a> QueryEngine<'a> {
    /// Matches in ascending id order. Equality filters on an indexed field
    /// are served from the index instead of a scan.
    pub(crate) fn matching(
        &self,
        filter: Option<&'a Filter>,
    ) -> Box<dyn Iterator<Item = &'a Arc<View>> + 'a> {
        let table = self.table;
        let indexes = self.indexes;
        let Some(filter) = filter else {
            return Box::new(table.values());
        };

        if let Some(value) = self.indexed_equality(filter) {
            if let Some(index) = indexes.for_field(&filter.field) {
                return Box::new(
                    index
                        .ids(value)
                        .filter_map(move |id| table.get(id))
                        .filter(move |view| filter.matches(view)),
                );
            }
        }

        Box::new(table.values().filter(move |view| filter.matches(view)))
    }

    fn indexed_equality(&self, filter: &'a Filter) -> Option<&'a Value> {
        if self.use_indexes && filter.operator == Operator::Eq {
            Some(&filter.value)
        } else {
            None
        }
    }

    pub(crate) fn query(&self, options: &'a QueryOptions) -> QueryResult {
        let matches: Vec<&Arc<View>> = self.matching(options.filter.as_ref()).collect();
        let total = matches.len();
        let views: Vec<Arc<View>> = matches
            .into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        let has_more = options.offset.saturating_add(views.len()) < total;
        QueryResult {
            views,
            total,
            has_more,
        }
    }

    pub(crate) fn find_one(&self, filter: &'a Filter) -> Option<Arc<View>> {
        self.matching(Some(filter)).next().cloned()
    }

    pub(crate) fn find_many(&self, filter: &'a Filter, limit: Option<usize>) -> Vec<Arc<View>> {
        self.matching(Some(filter))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub(crate) fn count(&self, filter: Option<&'a Filter>) -> usize {
        match filter {
            None => self.table.len(),
            Some(_) => self.matching(filter).count(),
        }
    }
}
