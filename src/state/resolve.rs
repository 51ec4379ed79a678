use super::game::ensure_master;
use super::AppState;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashSet;

impl AppState {
    /// End the voting phase: the `voting -> round_end` transition, and the
    /// single trigger of round resolution.
    ///
    /// The game master declares the voted-out player (`None` = nobody was
    /// eliminated). The winner and per-player point deltas are computed
    /// from that declaration plus the recorded guesses, and committed
    /// exactly once: flipping the round's outcome from `Pending` to
    /// `Resolved` under the rounds write lock is the compare-and-set that
    /// elects the one caller allowed to apply points. Every other caller
    /// (double click, retried request, concurrent race) gets the stored
    /// resolution back unchanged.
    pub async fn end_voting(
        &self,
        game_id: &str,
        acting_user: &str,
        voted_out_player_id: Option<UserId>,
    ) -> Result<RoundResolution, GameError> {
        let game = self.get_game(game_id).await.ok_or(GameError::GameNotFound)?;
        ensure_master(&game, acting_user, "end voting")?;

        let round = self
            .get_current_round(game_id)
            .await
            .ok_or(GameError::RoundNotFound)?;

        // Duplicate request after completion: idempotently hand back the
        // committed result instead of an error
        if let Some(prev) = round.outcome.resolution() {
            return Ok(prev.clone());
        }

        if game.status != GameStatus::Voting {
            return Err(GameError::InvalidTransition(format!(
                "cannot end voting while the game is in {:?}",
                game.status
            )));
        }
        if let Some(candidate) = &voted_out_player_id {
            if !self.is_participant(game_id, candidate).await {
                return Err(GameError::NotAParticipant(candidate.clone()));
            }
        }

        let resolution = {
            let mut rounds = self.rounds.write().await;
            let r = rounds.get_mut(&round.id).ok_or(GameError::RoundNotFound)?;
            match &r.outcome {
                // Lost the race: the winner has committed (or is committing)
                // the points; do not reapply them
                RoundOutcome::Resolved(prev) => return Ok(prev.clone()),
                RoundOutcome::Pending => {
                    let eliminated_is_imposter = voted_out_player_id
                        .as_ref()
                        .map(|v| r.imposter_ids.contains(v))
                        .unwrap_or(false);
                    let winner = if eliminated_is_imposter {
                        RoundWinner::NonImposters
                    } else {
                        RoundWinner::Imposter
                    };
                    let resolution = RoundResolution {
                        winner,
                        voted_out_player_id,
                        eliminated_is_imposter,
                    };
                    r.outcome = RoundOutcome::Resolved(resolution.clone());
                    r.status = RoundStatus::Completed;
                    resolution
                }
            }
        };

        // Only the caller that won the compare-and-set reaches this point
        let standings = self.apply_round_points(&round, &resolution).await;

        {
            let mut games = self.games.write().await;
            if let Some(g) = games.get_mut(game_id) {
                if g.status == GameStatus::Voting {
                    g.status = GameStatus::RoundEnd;
                }
            }
        }

        tracing::info!(
            game_id,
            round_number = round.round_number,
            winner = ?resolution.winner,
            "round resolved"
        );
        self.broadcast_to_game(
            game_id,
            ServerMessage::RoundResolved {
                round_id: round.id.clone(),
                winner: resolution.winner,
                eliminated_is_imposter: resolution.eliminated_is_imposter,
                voted_out_player_id: resolution.voted_out_player_id.clone(),
                standings,
            },
        )
        .await;
        self.broadcast_to_game(
            game_id,
            ServerMessage::PhaseChanged {
                status: GameStatus::RoundEnd,
                round_number: round.round_number,
                server_now: chrono::Utc::now().to_rfc3339(),
            },
        )
        .await;

        Ok(resolution)
    }

    /// Apply the round's point deltas to the registry and return the new
    /// standings (points descending).
    ///
    /// A surviving imposter earns 1 point, plus 1 more for a correct
    /// guess; the eliminated imposter earns nothing regardless of their
    /// guess. Non-imposters each earn 1 point iff an imposter was voted
    /// out. Deltas are additive increments applied under the table write
    /// lock; zero deltas are skipped.
    async fn apply_round_points(
        &self,
        round: &Round,
        resolution: &RoundResolution,
    ) -> Vec<GamePlayer> {
        let correct_guessers: HashSet<UserId> = self
            .guesses
            .read()
            .await
            .values()
            .filter(|g| g.round_id == round.id && g.is_correct)
            .map(|g| g.imposter_id.clone())
            .collect();

        let mut standings = Vec::new();
        {
            let mut players = self.players.write().await;
            for player in players
                .values_mut()
                .filter(|p| p.game_id == round.game_id)
            {
                let delta = if round.imposter_ids.contains(&player.user_id) {
                    if resolution.voted_out_player_id.as_ref() == Some(&player.user_id) {
                        0
                    } else {
                        let survived = 1;
                        let bonus = u32::from(correct_guessers.contains(&player.user_id));
                        survived + bonus
                    }
                } else if resolution.eliminated_is_imposter {
                    1
                } else {
                    0
                };

                if delta > 0 {
                    player.total_points += delta;
                }
                standings.push(player.clone());
            }
        }

        standings.sort_by(|a, b| b.total_points.cmp(&a.total_points));
        standings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    async fn setup_voting(
        state: &AppState,
        players: &[&str],
        imposters: &[&str],
    ) -> (Game, Round) {
        let game = state.create_game("master", 5).await;
        for p in players {
            state.join_game(&game.invite_code, p).await.unwrap();
        }
        let imposter_ids: HashSet<UserId> = imposters.iter().map(|s| s.to_string()).collect();
        state
            .start_round(&game.id, "master", "apple", "a fruit", imposter_ids)
            .await
            .unwrap();
        state
            .advance_status(&game.id, "master", GameStatus::Discussion)
            .await
            .unwrap();
        state
            .advance_status(&game.id, "master", GameStatus::Voting)
            .await
            .unwrap();
        let round = state.get_current_round(&game.id).await.unwrap();
        (game, round)
    }

    async fn points_by_user(state: &AppState, game_id: &str) -> HashMap<UserId, u32> {
        state
            .players_of(game_id)
            .await
            .into_iter()
            .map(|p| (p.user_id, p.total_points))
            .collect()
    }

    #[tokio::test]
    async fn test_imposter_survives_with_correct_guess() {
        let state = AppState::new();
        let (game, round) = setup_voting(&state, &["alice", "bob", "carol"], &["alice"]).await;

        state
            .submit_guess(&round.id, "alice", "apple")
            .await
            .unwrap();
        let resolution = state
            .end_voting(&game.id, "master", Some("bob".to_string()))
            .await
            .unwrap();

        assert_eq!(resolution.winner, RoundWinner::Imposter);
        assert!(!resolution.eliminated_is_imposter);

        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 2); // survived + correct guess
        assert_eq!(points["bob"], 0);
        assert_eq!(points["carol"], 0);
    }

    #[tokio::test]
    async fn test_imposter_survives_without_guess() {
        let state = AppState::new();
        let (game, round) = setup_voting(&state, &["alice", "bob", "carol"], &["alice"]).await;

        state
            .submit_guess(&round.id, "alice", "banana")
            .await
            .unwrap();
        state
            .end_voting(&game.id, "master", Some("carol".to_string()))
            .await
            .unwrap();

        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 1); // survived, wrong guess
        assert_eq!(points["bob"], 0);
        assert_eq!(points["carol"], 0);
    }

    #[tokio::test]
    async fn test_imposter_eliminated() {
        let state = AppState::new();
        let (game, round) = setup_voting(&state, &["alice", "bob", "carol"], &["alice"]).await;

        // A correct guess earns nothing for an eliminated imposter
        state
            .submit_guess(&round.id, "alice", "apple")
            .await
            .unwrap();
        let resolution = state
            .end_voting(&game.id, "master", Some("alice".to_string()))
            .await
            .unwrap();

        assert_eq!(resolution.winner, RoundWinner::NonImposters);
        assert!(resolution.eliminated_is_imposter);

        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 0);
        assert_eq!(points["bob"], 1);
        assert_eq!(points["carol"], 1);
    }

    #[tokio::test]
    async fn test_multi_imposter_one_caught() {
        let state = AppState::new();
        let (game, round) =
            setup_voting(&state, &["alice", "bob", "carol", "dave"], &["alice", "bob"]).await;

        state
            .submit_guess(&round.id, "bob", "banana")
            .await
            .unwrap();
        let resolution = state
            .end_voting(&game.id, "master", Some("alice".to_string()))
            .await
            .unwrap();

        assert_eq!(resolution.winner, RoundWinner::NonImposters);

        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 0); // caught
        assert_eq!(points["bob"], 1); // survived, wrong guess
        assert_eq!(points["carol"], 1);
        assert_eq!(points["dave"], 1);
    }

    #[tokio::test]
    async fn test_nobody_eliminated() {
        let state = AppState::new();
        let (game, _) = setup_voting(&state, &["alice", "bob", "carol"], &["alice"]).await;

        let resolution = state.end_voting(&game.id, "master", None).await.unwrap();

        assert_eq!(resolution.winner, RoundWinner::Imposter);
        assert!(!resolution.eliminated_is_imposter);
        assert_eq!(resolution.voted_out_player_id, None);

        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 1);
        assert_eq!(points["bob"], 0);
        assert_eq!(points["carol"], 0);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent_sequentially() {
        let state = AppState::new();
        let (game, round) = setup_voting(&state, &["alice", "bob", "carol"], &["alice"]).await;

        state
            .submit_guess(&round.id, "alice", "apple")
            .await
            .unwrap();
        let first = state
            .end_voting(&game.id, "master", Some("bob".to_string()))
            .await
            .unwrap();
        let second = state
            .end_voting(&game.id, "master", Some("bob".to_string()))
            .await
            .unwrap();

        assert_eq!(first, second);

        // Points applied exactly once
        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 2);
        assert_eq!(points["bob"], 0);

        let stored = state.get_round(&round.id).await.unwrap();
        assert_eq!(stored.status, RoundStatus::Completed);
        assert_eq!(stored.outcome.resolution(), Some(&first));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent_concurrently() {
        let state = AppState::new();
        let (game, round) = setup_voting(&state, &["alice", "bob", "carol"], &["alice"]).await;

        state
            .submit_guess(&round.id, "alice", "apple")
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            state.end_voting(&game.id, "master", Some("bob".to_string())),
            state.end_voting(&game.id, "master", Some("bob".to_string())),
        );
        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a, b);

        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 2);
        assert_eq!(points["bob"], 0);
        assert_eq!(points["carol"], 0);
    }

    #[tokio::test]
    async fn test_duplicate_resolution_ignores_new_declaration() {
        let state = AppState::new();
        let (game, _) = setup_voting(&state, &["alice", "bob", "carol"], &["alice"]).await;

        let first = state
            .end_voting(&game.id, "master", Some("alice".to_string()))
            .await
            .unwrap();
        // A retried request with a different voted-out player must not
        // overwrite the committed outcome
        let second = state
            .end_voting(&game.id, "master", Some("bob".to_string()))
            .await
            .unwrap();

        assert_eq!(second, first);
        assert_eq!(second.voted_out_player_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_resolution_requires_voting_phase() {
        let state = AppState::new();
        let game = state.create_game("master", 5).await;
        for p in ["alice", "bob"] {
            state.join_game(&game.invite_code, p).await.unwrap();
        }

        // No round at all
        let result = state.end_voting(&game.id, "master", None).await;
        assert!(matches!(result, Err(GameError::RoundNotFound)));

        // Round exists but voting never opened
        let imposter_ids: HashSet<UserId> = ["alice".to_string()].into_iter().collect();
        state
            .start_round(&game.id, "master", "apple", "a fruit", imposter_ids)
            .await
            .unwrap();
        let result = state.end_voting(&game.id, "master", None).await;
        assert!(matches!(result, Err(GameError::InvalidTransition(_))));

        // Nothing was scored
        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 0);
        assert_eq!(points["bob"], 0);
    }

    #[tokio::test]
    async fn test_points_accumulate_across_rounds() {
        let state = AppState::new();
        let (game, round1) = setup_voting(&state, &["alice", "bob", "carol"], &["alice"]).await;

        state
            .submit_guess(&round1.id, "alice", "apple")
            .await
            .unwrap();
        state
            .end_voting(&game.id, "master", Some("bob".to_string()))
            .await
            .unwrap();

        // Round 2: alice gets caught
        state
            .advance_status(&game.id, "master", GameStatus::Waiting)
            .await
            .unwrap();
        let imposter_ids: HashSet<UserId> = ["alice".to_string()].into_iter().collect();
        state
            .start_round(&game.id, "master", "pear", "another fruit", imposter_ids)
            .await
            .unwrap();
        state
            .advance_status(&game.id, "master", GameStatus::Discussion)
            .await
            .unwrap();
        state
            .advance_status(&game.id, "master", GameStatus::Voting)
            .await
            .unwrap();
        state
            .end_voting(&game.id, "master", Some("alice".to_string()))
            .await
            .unwrap();

        let points = points_by_user(&state, &game.id).await;
        assert_eq!(points["alice"], 2); // round 1 only
        assert_eq!(points["bob"], 1); // round 2 only
        assert_eq!(points["carol"], 1);

        let leaderboard = state.leaderboard(&game.id).await;
        assert_eq!(leaderboard[0].user_id, "alice");
    }
}
