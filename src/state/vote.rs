use super::AppState;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;

impl AppState {
    /// Record a vote for the round. Upsert by `(round, voter)`: a second
    /// vote from the same voter overwrites, last write wins. `None` means
    /// abstain. Accepted only while the round is voting.
    pub async fn record_vote(
        &self,
        round_id: &str,
        voter_id: &str,
        voted_for_id: Option<UserId>,
    ) -> Result<Vote, GameError> {
        let round = self
            .get_round(round_id)
            .await
            .ok_or(GameError::RoundNotFound)?;
        if round.status == RoundStatus::Completed {
            return Err(GameError::AlreadyResolved);
        }
        if round.status != RoundStatus::Voting {
            return Err(GameError::InvalidTransition(
                "votes are only accepted while the round is voting".to_string(),
            ));
        }

        if !self.is_participant(&round.game_id, voter_id).await {
            return Err(GameError::NotAParticipant(voter_id.to_string()));
        }
        if let Some(candidate) = &voted_for_id {
            if !self.is_participant(&round.game_id, candidate).await {
                return Err(GameError::NotAParticipant(candidate.clone()));
            }
        }

        let vote = {
            let mut votes = self.votes.write().await;
            let key = (round_id.to_string(), voter_id.to_string());
            match votes.get_mut(&key) {
                Some(existing) => {
                    existing.voted_for_id = voted_for_id;
                    existing.clone()
                }
                None => {
                    let vote = Vote {
                        id: ulid::Ulid::new().to_string(),
                        round_id: round_id.to_string(),
                        voter_id: voter_id.to_string(),
                        voted_for_id,
                        created_at: chrono::Utc::now().to_rfc3339(),
                    };
                    votes.insert(key, vote.clone());
                    vote
                }
            }
        };

        self.broadcast_tally(&round).await;
        Ok(vote)
    }

    /// Candidate -> vote count over the round's current votes. Purely
    /// derived and side-effect-free; abstentions are not counted for
    /// anyone. Safe to call at any time, including after resolution.
    pub async fn tally(&self, round_id: &str) -> HashMap<UserId, u32> {
        let votes = self.votes.read().await;

        let mut counts: HashMap<UserId, u32> = HashMap::new();
        for vote in votes.values() {
            if vote.round_id == round_id {
                if let Some(candidate) = &vote.voted_for_id {
                    *counts.entry(candidate.clone()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Push a tally snapshot to the round's game channel
    pub(crate) async fn broadcast_tally(&self, round: &Round) {
        let counts = self.tally(&round.id).await;
        let votes_cast = self
            .votes
            .read()
            .await
            .values()
            .filter(|v| v.round_id == round.id)
            .count() as u32;

        self.broadcast_to_game(
            &round.game_id,
            ServerMessage::VoteTally {
                round_id: round.id.clone(),
                counts,
                votes_cast,
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn voting_round(state: &AppState) -> (Game, Round) {
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
        state
            .advance_status(&game.id, "master", GameStatus::Voting)
            .await
            .unwrap();
        let round = state.get_current_round(&game.id).await.unwrap();
        (game, round)
    }

    #[tokio::test]
    async fn test_tally_empty() {
        let state = AppState::new();
        let (_, round) = voting_round(&state).await;

        assert!(state.tally(&round.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_tally_counts_votes() {
        let state = AppState::new();
        let (_, round) = voting_round(&state).await;

        state
            .record_vote(&round.id, "bob", Some("alice".to_string()))
            .await
            .unwrap();
        state
            .record_vote(&round.id, "carol", Some("alice".to_string()))
            .await
            .unwrap();
        state
            .record_vote(&round.id, "alice", Some("bob".to_string()))
            .await
            .unwrap();

        let counts = state.tally(&round.id).await;
        assert_eq!(counts.get("alice"), Some(&2));
        assert_eq!(counts.get("bob"), Some(&1));
        assert_eq!(counts.get("carol"), None);
    }

    #[tokio::test]
    async fn test_vote_upsert_last_write_wins() {
        let state = AppState::new();
        let (_, round) = voting_round(&state).await;

        state
            .record_vote(&round.id, "bob", Some("alice".to_string()))
            .await
            .unwrap();
        state
            .record_vote(&round.id, "bob", Some("carol".to_string()))
            .await
            .unwrap();

        let counts = state.tally(&round.id).await;
        assert_eq!(counts.get("alice"), None);
        assert_eq!(counts.get("carol"), Some(&1));
        assert_eq!(state.votes.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_abstain_is_not_counted() {
        let state = AppState::new();
        let (_, round) = voting_round(&state).await;

        state.record_vote(&round.id, "bob", None).await.unwrap();

        assert!(state.tally(&round.id).await.is_empty());
        // The abstention itself is still recorded
        assert_eq!(state.votes.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_vote_rejected_outside_voting_phase() {
        let state = AppState::new();
        let game = state.create_game("master", 5).await;
        for p in ["alice", "bob", "carol"] {
            state.join_game(&game.invite_code, p).await.unwrap();
        }
        let imposters: HashSet<UserId> = ["alice".to_string()].into_iter().collect();
        state
            .start_round(&game.id, "master", "apple", "a fruit", imposters)
            .await
            .unwrap();
        let round = state.get_current_round(&game.id).await.unwrap();

        let result = state
            .record_vote(&round.id, "bob", Some("alice".to_string()))
            .await;
        assert!(matches!(result, Err(GameError::InvalidTransition(_))));
        assert!(state.votes.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_vote_rejected_for_outsiders() {
        let state = AppState::new();
        let (_, round) = voting_round(&state).await;

        let result = state
            .record_vote(&round.id, "mallory", Some("alice".to_string()))
            .await;
        assert!(matches!(result, Err(GameError::NotAParticipant(_))));

        let result = state
            .record_vote(&round.id, "bob", Some("mallory".to_string()))
            .await;
        assert!(matches!(result, Err(GameError::NotAParticipant(_))));
        assert!(state.votes.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_vote_rejected_after_resolution() {
        let state = AppState::new();
        let (game, round) = voting_round(&state).await;
        state
            .end_voting(&game.id, "master", Some("alice".to_string()))
            .await
            .unwrap();

        let result = state
            .record_vote(&round.id, "bob", Some("alice".to_string()))
            .await;
        assert!(matches!(result, Err(GameError::AlreadyResolved)));
    }
}
