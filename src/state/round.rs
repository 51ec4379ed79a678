use super::game::ensure_master;
use super::AppState;
use crate::error::GameError;
use crate::protocol::{RoundInfo, ServerMessage};
use crate::types::*;
use std::collections::HashSet;

impl AppState {
    pub async fn get_round(&self, round_id: &str) -> Option<Round> {
        self.rounds.read().await.get(round_id).cloned()
    }

    /// Get the game's current round (the one matching `current_round`)
    pub async fn get_current_round(&self, game_id: &str) -> Option<Round> {
        let game = self.get_game(game_id).await?;
        if game.current_round == 0 {
            return None;
        }
        self.rounds
            .read()
            .await
            .values()
            .find(|r| r.game_id == game_id && r.round_number == game.current_round)
            .cloned()
    }

    /// Start a new round: the `waiting -> role_assignment` transition.
    ///
    /// Requires a fully specified setup (non-empty imposter set that is a
    /// strict subset of the players, a secret word and a bonus hint).
    /// Rejections mutate nothing.
    pub async fn start_round(
        &self,
        game_id: &str,
        acting_user: &str,
        secret_word: &str,
        bonus_hint: &str,
        imposter_ids: HashSet<UserId>,
    ) -> Result<Round, GameError> {
        let game = self.get_game(game_id).await.ok_or(GameError::GameNotFound)?;
        ensure_master(&game, acting_user, "start rounds")?;

        let secret_word = secret_word.trim();
        let bonus_hint = bonus_hint.trim();
        if secret_word.is_empty() {
            return Err(GameError::InvalidTransition(
                "a secret word is required to start a round".to_string(),
            ));
        }
        if bonus_hint.is_empty() {
            return Err(GameError::InvalidTransition(
                "a bonus hint is required to start a round".to_string(),
            ));
        }
        if imposter_ids.is_empty() {
            return Err(GameError::InvalidTransition(
                "at least one imposter is required".to_string(),
            ));
        }

        let players = self.players_of(game_id).await;
        for imposter in &imposter_ids {
            if !players.iter().any(|p| &p.user_id == imposter) {
                return Err(GameError::NotAParticipant(imposter.clone()));
            }
        }
        if imposter_ids.len() >= players.len() {
            return Err(GameError::InvalidTransition(
                "the imposter set must be a strict subset of the players".to_string(),
            ));
        }

        let round = {
            let mut games = self.games.write().await;
            let g = games.get_mut(game_id).ok_or(GameError::GameNotFound)?;
            if g.status != GameStatus::Waiting {
                return Err(GameError::InvalidTransition(format!(
                    "cannot start a round while the game is in {:?}",
                    g.status
                )));
            }

            let round_number = g.current_round + 1;
            let round = Round {
                id: ulid::Ulid::new().to_string(),
                game_id: game_id.to_string(),
                round_number,
                secret_word: secret_word.to_string(),
                bonus_hint: bonus_hint.to_string(),
                imposter_ids,
                spotlight_player_id: None,
                status: RoundStatus::Setup,
                outcome: RoundOutcome::Pending,
                created_at: chrono::Utc::now().to_rfc3339(),
            };

            {
                let mut rounds = self.rounds.write().await;
                if rounds
                    .values()
                    .any(|r| r.game_id == game_id && r.round_number == round_number)
                {
                    return Err(GameError::StorageConflict(format!(
                        "round {round_number} already exists for this game"
                    )));
                }
                rounds.insert(round.id.clone(), round.clone());
            }

            g.current_round = round_number;
            g.status = GameStatus::RoleAssignment;
            round
        };

        tracing::info!(game_id, round_number = round.round_number, "round started");
        self.broadcast_to_game(
            game_id,
            ServerMessage::RoundStarted {
                round: RoundInfo::from(&round),
            },
        )
        .await;
        self.broadcast_to_game(
            game_id,
            ServerMessage::PhaseChanged {
                status: GameStatus::RoleAssignment,
                round_number: round.round_number,
                server_now: chrono::Utc::now().to_rfc3339(),
            },
        )
        .await;

        Ok(round)
    }

    /// Point the spotlight at a player (or clear it). Game master only,
    /// freely reassignable during discussion.
    pub async fn set_spotlight(
        &self,
        game_id: &str,
        acting_user: &str,
        spotlight_player_id: Option<UserId>,
    ) -> Result<Round, GameError> {
        let game = self.get_game(game_id).await.ok_or(GameError::GameNotFound)?;
        ensure_master(&game, acting_user, "move the spotlight")?;

        let round = self
            .get_current_round(game_id)
            .await
            .ok_or(GameError::RoundNotFound)?;
        if round.status == RoundStatus::Completed {
            return Err(GameError::AlreadyResolved);
        }
        if let Some(player) = &spotlight_player_id {
            if !self.is_participant(game_id, player).await {
                return Err(GameError::NotAParticipant(player.clone()));
            }
        }

        let updated = {
            let mut rounds = self.rounds.write().await;
            let r = rounds.get_mut(&round.id).ok_or(GameError::RoundNotFound)?;
            r.spotlight_player_id = spotlight_player_id.clone();
            r.clone()
        };

        self.broadcast_to_game(
            game_id,
            ServerMessage::SpotlightChanged {
                round_id: updated.id.clone(),
                spotlight_player_id,
            },
        )
        .await;

        Ok(updated)
    }
}
