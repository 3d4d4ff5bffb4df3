//! Read model views for a small game lobby.

use serde::{Deserialize, Serialize};
use view_store::ReadModel;

/// A read-optimized view of a single game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ReadModel)]
#[readmodel(collection = "game_views")]
pub struct GameView {
    #[readmodel(id)]
    pub id: String,
    #[readmodel(index)]
    pub status: String,
    #[readmodel(index)]
    pub host: String,
    pub score: u32,
}

impl GameView {
    pub fn new(id: &str, host: &str) -> Self {
        Self {
            id: id.to_string(),
            status: "waiting".to_string(),
            host: host.to_string(),
            score: 0,
        }
    }

    pub fn start(&mut self) {
        self.status = "live".to_string();
    }

    pub fn score(&mut self, points: u32) {
        self.score += points;
    }
}

/// Per-player totals. The id field is not called `id`, and the collection
/// name is derived from the struct name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ReadModel)]
pub struct PlayerTotal {
    #[readmodel(id)]
    pub player: String,
    pub games: Vec<String>,
    pub total_score: u32,
}

impl PlayerTotal {
    pub fn new(player: &str) -> Self {
        Self {
            player: player.to_string(),
            games: vec![],
            total_score: 0,
        }
    }

    pub fn record(&mut self, game_id: &str, score: u32) {
        if !self.games.iter().any(|g| g == game_id) {
            self.games.push(game_id.to_string());
        }
        self.total_score += score;
    }
}

/// Minimal model relying on the `id` field default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ReadModel)]
#[readmodel(collection = "notes")]
pub struct Note {
    pub id: String,
    pub text: String,
}
