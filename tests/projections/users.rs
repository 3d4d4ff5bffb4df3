//! User directory projections driven by ledger events.

use serde_json::json;
use view_store::{LedgerEvent, ProjectionOutcome, ProjectionSpec, ViewPatch};

pub const USER_CREATED: &str = "USER_CREATED";
pub const USER_UPDATED: &str = "USER_UPDATED";
pub const USER_DELETED: &str = "USER_DELETED";

pub fn event(event_type: &str, payload: serde_json::Value) -> LedgerEvent {
    LedgerEvent::new(event_type, payload, 0)
}

fn user_view(event: &LedgerEvent) -> ProjectionOutcome {
    match event.event_type.as_str() {
        USER_CREATED | USER_UPDATED => ProjectionOutcome::Upsert(ViewPatch::new(
            event.payload_str("id").unwrap_or_default(),
            json!({
                "name": event.payload["name"],
                "role": event.payload.get("role").cloned().unwrap_or(json!("member")),
            }),
        )),
        _ => ProjectionOutcome::Absent,
    }
}

/// One view per user, keyed by the payload id.
pub fn users() -> ProjectionSpec {
    ProjectionSpec::new("users", [USER_CREATED, USER_UPDATED, USER_DELETED], user_view)
}

/// Keeps a single `user-count` view in step with creations.
pub fn user_count() -> ProjectionSpec {
    ProjectionSpec::new("user_count", [USER_CREATED], |event: &LedgerEvent| {
        let seen = event.payload["seq"].as_u64().unwrap_or(0);
        ProjectionOutcome::Upsert(ViewPatch::new("user-count", json!({ "total": seen })))
    })
}

/// Deletes a view named from the `userId` payload field.
pub fn archived() -> ProjectionSpec {
    ProjectionSpec::new("archive", [USER_DELETED], |_: &LedgerEvent| ProjectionOutcome::Absent)
        .with_target_id(|event| event.payload_str("userId").map(|id| format!("archive:{}", id)))
}
