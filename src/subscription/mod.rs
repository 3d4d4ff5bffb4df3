//! Subscription registry - synchronous, optionally filtered change delivery.

use std::fmt;
use std::sync::mpsc::Sender;

use serde::Serialize;

use crate::filter::Filter;
use crate::view::ViewChange;

/// Identifier returned by `subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle for a live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriptionId,
}

pub type Callback = Box<dyn Fn(&ViewChange) + Send + Sync>;

enum Sink {
    Callback(Callback),
    Channel(Sender<ViewChange>),
}

struct Registration {
    id: SubscriptionId,
    filter: Option<Filter>,
    sink: Sink,
}

impl Registration {
    fn wants(&self, change: &ViewChange) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.matches(&change.view))
    }
}

/// Registrations in subscription order.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    registrations: Vec<Registration>,
}

impl SubscriptionRegistry {
    pub(crate) fn add_callback(
        &mut self,
        id: SubscriptionId,
        callback: Callback,
        filter: Option<Filter>,
    ) -> Subscription {
        self.push(id, Sink::Callback(callback), filter)
    }

    pub(crate) fn add_channel(
        &mut self,
        id: SubscriptionId,
        sender: Sender<ViewChange>,
        filter: Option<Filter>,
    ) -> Subscription {
        self.push(id, Sink::Channel(sender), filter)
    }

    fn push(&mut self, id: SubscriptionId, sink: Sink, filter: Option<Filter>) -> Subscription {
        self.registrations.push(Registration {
            id: id.clone(),
            filter,
            sink,
        });
        Subscription { id }
    }

    /// Returns whether a subscription was removed.
    pub(crate) fn remove(&mut self, id: &SubscriptionId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|registration| &registration.id != id);
        self.registrations.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    pub(crate) fn clear(&mut self) {
        self.registrations.clear();
    }

    /// Deliver `change` once to every matching subscription. Returns the
    /// number delivered and the ids of channels whose receiver is gone.
    pub(crate) fn dispatch(&self, change: &ViewChange) -> (usize, Vec<SubscriptionId>) {
        let mut delivered = 0;
        let mut disconnected = Vec::new();

        for registration in &self.registrations {
            if !registration.wants(change) {
                continue;
            }
            match &registration.sink {
                Sink::Callback(callback) => {
                    callback(change);
                    delivered += 1;
                }
                Sink::Channel(sender) => {
                    if sender.send(change.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        disconnected.push(registration.id.clone());
                    }
                }
            }
        }

        (delivered, disconnected)
    }
}

pub(crate) fn make_id(prefix: &str, sequence: u64, random: u64) -> SubscriptionId {
    SubscriptionId(format!("{}-{}-{:08x}", prefix, sequence, random as u32))
}
