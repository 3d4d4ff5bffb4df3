//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use view_store::{ChangeKind, ManualClock, SeededRng, Store, ViewChange};

/// A store on a manual clock starting at 1000, seeded with 42.
pub fn store() -> (Store, ManualClock) {
    let clock = ManualClock::new(1000);
    (Store::new(clock.clone(), SeededRng::new(42)), clock)
}

/// Collects every change delivered to a subscription.
#[derive(Clone, Default)]
pub struct Recorder {
    changes: Arc<Mutex<Vec<ViewChange>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback suitable for `Store::subscribe`.
    pub fn callback(&self) -> impl Fn(&ViewChange) + Send + Sync + 'static {
        let changes = self.changes.clone();
        move |change: &ViewChange| changes.lock().unwrap().push(change.clone())
    }

    pub fn changes(&self) -> Vec<ViewChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.changes().iter().map(|c| c.kind).collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.changes()
            .iter()
            .map(|c| c.view.id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.changes.lock().unwrap().len()
    }
}
