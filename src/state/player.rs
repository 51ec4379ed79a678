use super::AppState;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Join a game by invite code. Re-joining is an idempotent no-op; the
    /// returned flag tells the caller which case it was.
    pub async fn join_game(
        &self,
        invite_code: &str,
        user_id: &str,
    ) -> Result<(Game, GamePlayer, bool), GameError> {
        let game = self
            .find_game_by_code(invite_code)
            .await
            .ok_or(GameError::GameNotFound)?;
        if game.status == GameStatus::GameEnd {
            return Err(GameError::InvalidTransition(
                "the game has ended".to_string(),
            ));
        }

        let key = (game.id.clone(), user_id.to_string());
        let (player, rejoined) = {
            let mut players = self.players.write().await;
            match players.get(&key) {
                Some(existing) => (existing.clone(), true),
                None => {
                    let player = GamePlayer {
                        id: ulid::Ulid::new().to_string(),
                        game_id: game.id.clone(),
                        user_id: user_id.to_string(),
                        total_points: 0,
                        joined_at: chrono::Utc::now().to_rfc3339(),
                    };
                    players.insert(key, player.clone());
                    (player, false)
                }
            }
        };

        if !rejoined {
            tracing::info!(game_id = %game.id, user_id, "player joined");
            self.broadcast_to_game(
                &game.id,
                ServerMessage::PlayerJoined {
                    player: player.clone(),
                },
            )
            .await;
        }

        Ok((game, player, rejoined))
    }

    /// All registry rows for a game, in join order
    pub async fn players_of(&self, game_id: &str) -> Vec<GamePlayer> {
        let mut players: Vec<GamePlayer> = self
            .players
            .read()
            .await
            .values()
            .filter(|p| p.game_id == game_id)
            .cloned()
            .collect();
        players.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        players
    }

    pub async fn is_participant(&self, game_id: &str, user_id: &str) -> bool {
        self.players
            .read()
            .await
            .contains_key(&(game_id.to_string(), user_id.to_string()))
    }

    /// Players sorted by total points descending
    pub async fn leaderboard(&self, game_id: &str) -> Vec<GamePlayer> {
        let mut players = self.players_of(game_id).await;
        players.sort_by(|a, b| b.total_points.cmp(&a.total_points));
        players
    }
}
