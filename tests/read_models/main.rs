//! Integration tests for typed read models (ReadModel derive + repository).

#[path = "../support/mod.rs"]
mod support;
mod views;

use serde_json::json;
use view_store::{
    ChangeKind, Filter, LedgerEvent, ProjectionOutcome, ProjectionSpec, ReadModel, ReadModelsExt,
    StoreError, ViewPatch,
};

use support::{store, Recorder};
use views::{GameView, Note, PlayerTotal};

#[test]
fn derive_sets_collection_indexes_and_id() {
    assert_eq!(GameView::COLLECTION, "game_views");
    assert_eq!(GameView::INDEXED_FIELDS, &["status", "host"]);
    assert_eq!(PlayerTotal::COLLECTION, "player_totals");
    assert!(PlayerTotal::INDEXED_FIELDS.is_empty());
    assert_eq!(Note::COLLECTION, "notes");

    assert_eq!(GameView::new("g1", "ann").key(), "game_views:g1");
    assert_eq!(PlayerTotal::new("ann").id(), "ann");
    let note = Note {
        id: "n1".into(),
        text: "hi".into(),
    };
    assert_eq!(note.key(), "notes:n1");
}

#[test]
fn typed_models_round_trip_through_views() {
    let (mut store, clock) = store();

    let mut game = GameView::new("g1", "ann");
    let saved = store.read_models::<GameView>().insert(&game).unwrap();
    assert_eq!(saved.version, 1);
    assert_eq!(saved.timestamp, 1000);

    clock.set(1200);
    game.start();
    game.score(3);
    let saved = store.read_models::<GameView>().update(&game, 1).unwrap();
    assert_eq!(saved.version, 2);
    assert_eq!(saved.timestamp, 1200);

    let raw = store.get("game_views:g1").unwrap();
    assert_eq!(raw.data()["status"], "live");
    assert_eq!(raw.data()["score"], 3);

    let loaded = store.read_models::<GameView>().get("g1").unwrap().unwrap();
    assert_eq!(loaded.data, game);
}

#[test]
fn stale_typed_update_conflicts() {
    let (mut store, _) = store();
    let mut games = store.read_models::<GameView>();
    let mut game = GameView::new("g1", "ann");
    games.upsert(&game).unwrap();
    game.start();
    games.upsert(&game).unwrap();

    let err = games.update(&game, 1).unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionConflict {
            expected: 1,
            actual: 2,
            ..
        }
    ));
}

#[test]
fn collections_do_not_leak_into_each_other() {
    let (mut store, _) = store();
    store
        .read_models::<GameView>()
        .upsert(&GameView::new("ann", "ann"))
        .unwrap();
    store
        .read_models::<PlayerTotal>()
        .upsert(&PlayerTotal::new("ann"))
        .unwrap();

    assert_eq!(store.size(), 2);
    assert_eq!(store.read_models::<GameView>().all().unwrap().len(), 1);
    assert_eq!(store.read_models::<PlayerTotal>().all().unwrap().len(), 1);
    assert!(store.read_models::<Note>().get("ann").unwrap().is_none());
}

#[test]
fn indexed_fields_drive_lookups() {
    let (mut store, _) = store();
    let mut games = store.read_models::<GameView>();
    games.ensure_indexes().unwrap();

    let mut g1 = GameView::new("g1", "ann");
    let g2 = GameView::new("g2", "bob");
    let mut g3 = GameView::new("g3", "ann");
    g1.start();
    g3.start();
    for game in [&g1, &g2, &g3] {
        games.upsert(game).unwrap();
    }

    let live: Vec<_> = games
        .lookup("status", &json!("live"))
        .unwrap()
        .into_iter()
        .map(|m| m.data.id)
        .collect();
    assert_eq!(live, vec!["g1", "g3"]);

    let hosted_by_bob = games.lookup("host", &json!("bob")).unwrap();
    assert_eq!(hosted_by_bob.len(), 1);
    assert_eq!(hosted_by_bob[0].data, g2);

    // Non-indexed fields fall back to a filtered scan.
    assert_eq!(games.lookup("score", &json!(0)).unwrap().len(), 3);

    assert_eq!(
        store.index_names(),
        vec![
            "game_views_by_status".to_string(),
            "game_views_by_host".to_string()
        ]
    );
}

#[test]
fn predicate_and_filter_queries() {
    let (mut store, _) = store();
    let mut games = store.read_models::<GameView>();
    for (id, points) in [("g1", 5), ("g2", 12), ("g3", 20)] {
        let mut game = GameView::new(id, "ann");
        game.score(points);
        games.upsert(&game).unwrap();
    }

    assert_eq!(games.find(&|g| g.score > 10).unwrap().len(), 2);
    assert_eq!(
        games.find_one(&|g| g.score > 10).unwrap().unwrap().data.id,
        "g2"
    );
    assert!(games.find_one(&|g| g.score > 100).unwrap().is_none());
    assert_eq!(games.find_by(&Filter::lt("score", 15)).unwrap().len(), 2);
}

#[test]
fn typed_deletes_notify_subscribers() {
    let (mut store, _) = store();
    let recorder = Recorder::new();
    store.subscribe(recorder.callback(), Some(Filter::eq("host", "ann")));

    let mut games = store.read_models::<GameView>();
    games.upsert(&GameView::new("g1", "ann")).unwrap();
    games.upsert(&GameView::new("g2", "bob")).unwrap();
    assert!(games.delete("g1").unwrap());
    assert!(!games.delete("g1").unwrap());

    assert_eq!(recorder.kinds(), vec![ChangeKind::Insert, ChangeKind::Delete]);
    assert_eq!(recorder.ids(), vec!["game_views:g1", "game_views:g1"]);
}

#[test]
fn projections_can_maintain_read_models() {
    let (mut store, _) = store();
    store
        .register_projection(ProjectionSpec::new(
            "player_totals",
            ["GAME_FINISHED"],
            |event: &LedgerEvent| {
                let player = event.payload_str("player").unwrap_or_default();
                let mut stats = PlayerTotal::new(player);
                stats.record(
                    event.payload_str("game").unwrap_or_default(),
                    event.payload["score"].as_u64().unwrap_or(0) as u32,
                );
                match serde_json::to_value(&stats) {
                    Ok(data) => ProjectionOutcome::Upsert(ViewPatch::new(stats.key(), data)),
                    Err(_) => ProjectionOutcome::Delete(stats.key()),
                }
            },
        ))
        .unwrap();

    store
        .apply_event(&LedgerEvent::new(
            "GAME_FINISHED",
            json!({"player": "ann", "game": "g1", "score": 7}),
            0,
        ))
        .unwrap();

    let stats = store.read_models::<PlayerTotal>().get("ann").unwrap().unwrap();
    assert_eq!(stats.data.games, vec!["g1"]);
    assert_eq!(stats.data.total_score, 7);
    assert_eq!(stats.version, 1);
}
