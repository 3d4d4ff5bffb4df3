use serde::{Deserialize, Serialize};

/// Tunables for a [`Store`](super::Store). Missing fields take their
/// defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Serve `eq` filters on indexed fields from the index.
    pub index_accelerated_queries: bool,
    /// Drop channel subscriptions once their receiver is gone.
    pub prune_disconnected_channels: bool,
    pub subscription_id_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_accelerated_queries: true,
            prune_disconnected_channels: true,
            subscription_id_prefix: "sub".to_string(),
        }
    }
}
