use super::AppState;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::Rng;

/// Safe character set for invite codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Capability check for game-master-only actions
pub(crate) fn ensure_master(game: &Game, acting_user: &str, action: &str) -> Result<(), GameError> {
    if game.game_master_id != acting_user {
        return Err(GameError::NotGameMaster(action.to_string()));
    }
    Ok(())
}

impl AppState {
    /// Create a new game owned by `game_master_id`, with a unique invite code
    pub async fn create_game(&self, game_master_id: &str, total_rounds: u32) -> Game {
        // Generate a unique invite code (check for collisions)
        let invite_code = loop {
            let code = generate_invite_code();
            let games = self.games.read().await;
            if !games.values().any(|g| g.invite_code == code) {
                break code;
            }
            // Collision - try again (extremely rare with ~880M combinations)
        };

        let game = Game {
            id: ulid::Ulid::new().to_string(),
            game_master_id: game_master_id.to_string(),
            invite_code,
            total_rounds,
            current_round: 0,
            status: GameStatus::Waiting,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        self.games
            .write()
            .await
            .insert(game.id.clone(), game.clone());
        self.register_channels(&game.id).await;
        game
    }

    pub async fn get_game(&self, game_id: &str) -> Option<Game> {
        self.games.read().await.get(game_id).cloned()
    }

    /// Look up a game by invite code, case-insensitively
    pub async fn find_game_by_code(&self, code: &str) -> Option<Game> {
        self.games
            .read()
            .await
            .values()
            .find(|g| g.invite_code.eq_ignore_ascii_case(code.trim()))
            .cloned()
    }

    /// Check if a status transition is valid
    fn is_valid_status_transition(from: GameStatus, to: GameStatus) -> bool {
        use GameStatus::*;

        matches!(
            (from, to),
            (Waiting, RoleAssignment)
                | (RoleAssignment, Discussion)
                | (Discussion, Voting)
                | (Voting, RoundEnd)
                | (RoundEnd, Waiting)
                | (RoundEnd, GameEnd)
        )
    }

    /// Advance the shared phase sequence.
    ///
    /// Only payload-free transitions go through here; `waiting ->
    /// role_assignment` is [`AppState::start_round`] and `voting ->
    /// round_end` is [`AppState::end_voting`]. The round row is kept in
    /// lockstep with the game status.
    pub async fn advance_status(
        &self,
        game_id: &str,
        acting_user: &str,
        to: GameStatus,
    ) -> Result<Game, GameError> {
        let game = self.get_game(game_id).await.ok_or(GameError::GameNotFound)?;
        ensure_master(&game, acting_user, "advance the game phase")?;

        let from = game.status;
        if !Self::is_valid_status_transition(from, to) {
            return Err(GameError::InvalidTransition(format!(
                "cannot go from {from:?} to {to:?}"
            )));
        }
        match to {
            GameStatus::RoleAssignment => {
                return Err(GameError::InvalidTransition(
                    "a new round needs its setup; use start_round".to_string(),
                ));
            }
            GameStatus::RoundEnd => {
                return Err(GameError::InvalidTransition(
                    "voting ends by declaring the voted-out player; use end_voting".to_string(),
                ));
            }
            _ => {}
        }

        // Preconditions: the phases that track a round need one to exist
        let round = self.get_current_round(game_id).await;
        let round_status = match to {
            GameStatus::Discussion | GameStatus::Voting => {
                let round = round
                    .as_ref()
                    .ok_or_else(|| GameError::InvalidTransition("no active round".to_string()))?;
                let expected = if to == GameStatus::Discussion {
                    RoundStatus::Setup
                } else {
                    RoundStatus::Discussion
                };
                if round.status != expected {
                    return Err(GameError::InvalidTransition(format!(
                        "round is in {:?}, expected {expected:?}",
                        round.status
                    )));
                }
                Some(match to {
                    GameStatus::Discussion => RoundStatus::Discussion,
                    _ => RoundStatus::Voting,
                })
            }
            _ => None,
        };

        let updated = {
            let mut games = self.games.write().await;
            let g = games.get_mut(game_id).ok_or(GameError::GameNotFound)?;
            // Re-check under the write lock; a racing master command may
            // have advanced the game already
            if g.status != from {
                return Err(GameError::StorageConflict(format!(
                    "game moved to {:?} concurrently",
                    g.status
                )));
            }
            g.status = to;
            g.clone()
        };

        if let (Some(new_status), Some(round)) = (round_status, round) {
            let mut rounds = self.rounds.write().await;
            if let Some(r) = rounds.get_mut(&round.id) {
                r.status = new_status;
            }
        }

        tracing::info!(game_id, ?from, ?to, "game phase advanced");
        self.broadcast_to_game(
            game_id,
            ServerMessage::PhaseChanged {
                status: updated.status,
                round_number: updated.current_round,
                server_now: chrono::Utc::now().to_rfc3339(),
            },
        )
        .await;

        if to == GameStatus::GameEnd {
            let standings = self.leaderboard(game_id).await;
            self.broadcast_to_game(
                game_id,
                ServerMessage::GameEnded {
                    game_id: game_id.to_string(),
                    standings,
                },
            )
            .await;
        }

        Ok(updated)
    }
}
