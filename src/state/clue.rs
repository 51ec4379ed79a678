use super::game::ensure_master;
use super::AppState;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Record a clue word for a player. Upsert by `(round, player)`. A
    /// player enters their own clue; the game master may enter one on any
    /// player's behalf (e.g. spoken clues the master transcribes). Clues
    /// belong to the discussion phase.
    pub async fn submit_clue(
        &self,
        round_id: &str,
        acting_user: &str,
        player_id: &str,
        clue_word: Option<String>,
    ) -> Result<PlayerClue, GameError> {
        let round = self
            .get_round(round_id)
            .await
            .ok_or(GameError::RoundNotFound)?;
        if round.status == RoundStatus::Completed {
            return Err(GameError::AlreadyResolved);
        }
        if round.status != RoundStatus::Discussion {
            return Err(GameError::InvalidTransition(
                "clues are only accepted during discussion".to_string(),
            ));
        }
        if !self.is_participant(&round.game_id, player_id).await {
            return Err(GameError::NotAParticipant(player_id.to_string()));
        }

        let entered_by = if acting_user == player_id {
            ClueEnteredBy::Player
        } else {
            let game = self
                .get_game(&round.game_id)
                .await
                .ok_or(GameError::GameNotFound)?;
            ensure_master(&game, acting_user, "enter clues for other players")?;
            ClueEnteredBy::GameMaster
        };

        let clue_word = clue_word.map(|w| w.trim().to_string()).filter(|w| !w.is_empty());
        let now = chrono::Utc::now().to_rfc3339();
        let clue = {
            let mut clues = self.clues.write().await;
            let key = (round_id.to_string(), player_id.to_string());
            match clues.get_mut(&key) {
                Some(existing) => {
                    existing.clue_word = clue_word;
                    existing.entered_by = entered_by;
                    existing.updated_at = now;
                    existing.clone()
                }
                None => {
                    let clue = PlayerClue {
                        id: ulid::Ulid::new().to_string(),
                        round_id: round_id.to_string(),
                        player_id: player_id.to_string(),
                        clue_word,
                        entered_by,
                        created_at: now.clone(),
                        updated_at: now,
                    };
                    clues.insert(key, clue.clone());
                    clue
                }
            }
        };

        self.broadcast_to_game(
            &round.game_id,
            ServerMessage::ClueRecorded { clue: clue.clone() },
        )
        .await;

        Ok(clue)
    }

    pub async fn clues_for_round(&self, round_id: &str) -> Vec<PlayerClue> {
        let mut clues: Vec<PlayerClue> = self
            .clues
            .read()
            .await
            .values()
            .filter(|c| c.round_id == round_id)
            .cloned()
            .collect();
        clues.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        clues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn discussion_round(state: &AppState) -> (Game, Round) {
        let game = state.create_game("master", 5).await;
        for p in ["alice", "bob", "carol"] {
            state.join_game(&game.invite_code, p).await.unwrap();
        }
        let imposters: HashSet<UserId> = ["alice".to_string()].into_iter().collect();
        state
            .start_round(&game.id, "master", "apple", "a fruit", imposters)
            .await
            .unwrap();
        state
            .advance_status(&game.id, "master", GameStatus::Discussion)
            .await
            .unwrap();
        let round = state.get_current_round(&game.id).await.unwrap();
        (game, round)
    }

    #[tokio::test]
    async fn test_clue_upsert() {
        let state = AppState::new();
        let (_, round) = discussion_round(&state).await;

        let clue = state
            .submit_clue(&round.id, "bob", "bob", Some("round".to_string()))
            .await
            .unwrap();
        assert_eq!(clue.entered_by, ClueEnteredBy::Player);

        let updated = state
            .submit_clue(&round.id, "bob", "bob", Some("red".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.id, clue.id);
        assert_eq!(updated.clue_word.as_deref(), Some("red"));
        assert_eq!(state.clues_for_round(&round.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_master_enters_clue_on_behalf() {
        let state = AppState::new();
        let (_, round) = discussion_round(&state).await;

        let clue = state
            .submit_clue(&round.id, "master", "carol", Some("tree".to_string()))
            .await
            .unwrap();
        assert_eq!(clue.entered_by, ClueEnteredBy::GameMaster);
        assert_eq!(clue.player_id, "carol");

        // A regular player cannot
        let result = state
            .submit_clue(&round.id, "bob", "carol", Some("sneaky".to_string()))
            .await;
        assert!(matches!(result, Err(GameError::NotGameMaster(_))));
    }

    #[tokio::test]
    async fn test_clue_rejected_outside_discussion() {
        let state = AppState::new();
        let game = state.create_game("master", 5).await;
        for p in ["alice", "bob"] {
            state.join_game(&game.invite_code, p).await.unwrap();
        }
        let imposters: HashSet<UserId> = ["alice".to_string()].into_iter().collect();
        state
            .start_round(&game.id, "master", "apple", "a fruit", imposters)
            .await
            .unwrap();
        let round = state.get_current_round(&game.id).await.unwrap();

        let result = state
            .submit_clue(&round.id, "bob", "bob", Some("early".to_string()))
            .await;
        assert!(matches!(result, Err(GameError::InvalidTransition(_))));
    }
}
