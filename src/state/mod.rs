mod clue;
mod game;
mod guess;
mod player;
mod resolve;
mod round;
mod vote;

pub use guess::normalize;

use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Broadcast channels for one game: an all-participants channel plus a
/// game-master-only channel.
struct GameChannels {
    all: broadcast::Sender<ServerMessage>,
    master: broadcast::Sender<ServerMessage>,
}

/// Shared application state.
///
/// Each table is an independently locked map whose key encodes the row's
/// unique constraint, so upserts and at-most-once rules hold structurally:
/// one vote per `(round, voter)`, one guess per `(round, imposter)`, one
/// clue per `(round, player)`, one registry row per `(game, user)`.
#[derive(Clone)]
pub struct AppState {
    pub games: Arc<RwLock<HashMap<GameId, Game>>>,
    pub rounds: Arc<RwLock<HashMap<RoundId, Round>>>,
    pub players: Arc<RwLock<HashMap<(GameId, UserId), GamePlayer>>>,
    pub votes: Arc<RwLock<HashMap<(RoundId, UserId), Vote>>>,
    pub guesses: Arc<RwLock<HashMap<(RoundId, UserId), ImposterGuess>>>,
    pub clues: Arc<RwLock<HashMap<(RoundId, UserId), PlayerClue>>>,
    channels: Arc<RwLock<HashMap<GameId, GameChannels>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            games: Arc::new(RwLock::new(HashMap::new())),
            rounds: Arc::new(RwLock::new(HashMap::new())),
            players: Arc::new(RwLock::new(HashMap::new())),
            votes: Arc::new(RwLock::new(HashMap::new())),
            guesses: Arc::new(RwLock::new(HashMap::new())),
            clues: Arc::new(RwLock::new(HashMap::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create the broadcast channel pair for a new game
    pub(crate) async fn register_channels(&self, game_id: &str) {
        let (all, _) = broadcast::channel(100);
        let (master, _) = broadcast::channel(100);
        self.channels
            .write()
            .await
            .insert(game_id.to_string(), GameChannels { all, master });
    }

    /// Subscribe to a game's all-participants channel
    pub async fn subscribe(&self, game_id: &str) -> Option<broadcast::Receiver<ServerMessage>> {
        self.channels
            .read()
            .await
            .get(game_id)
            .map(|c| c.all.subscribe())
    }

    /// Subscribe to a game's master-only channel
    pub async fn subscribe_master(
        &self,
        game_id: &str,
    ) -> Option<broadcast::Receiver<ServerMessage>> {
        self.channels
            .read()
            .await
            .get(game_id)
            .map(|c| c.master.subscribe())
    }

    pub(crate) async fn broadcast_to_game(&self, game_id: &str, msg: ServerMessage) {
        if let Some(channels) = self.channels.read().await.get(game_id) {
            // Ignore send errors (no receivers connected is fine)
            let _ = channels.all.send(msg);
        }
    }

    pub(crate) async fn broadcast_to_master(&self, game_id: &str, msg: ServerMessage) {
        if let Some(channels) = self.channels.read().await.get(game_id) {
            let _ = channels.master.send(msg);
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
