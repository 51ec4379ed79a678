use super::AppState;
use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::types::*;

/// Normalize a word for comparison (trim whitespace, lowercase)
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

impl AppState {
    /// Record an imposter's attempt at the secret word. Upsert by
    /// `(round, imposter)`: a later guess overwrites an earlier one and
    /// `is_correct` is recomputed from the latest text.
    ///
    /// Guesses are tolerated in any phase of a live round to absorb
    /// client/network skew around the voting window; only a completed
    /// round rejects.
    pub async fn submit_guess(
        &self,
        round_id: &str,
        imposter_id: &str,
        guessed_word: &str,
    ) -> Result<ImposterGuess, GameError> {
        let round = self
            .get_round(round_id)
            .await
            .ok_or(GameError::RoundNotFound)?;
        if round.status == RoundStatus::Completed {
            return Err(GameError::AlreadyResolved);
        }
        if !self.is_participant(&round.game_id, imposter_id).await {
            return Err(GameError::NotAParticipant(imposter_id.to_string()));
        }
        if !round.imposter_ids.contains(imposter_id) {
            return Err(GameError::NotAnImposter(imposter_id.to_string()));
        }

        let guessed_word = guessed_word.trim().to_string();
        let is_correct = normalize(&guessed_word) == normalize(&round.secret_word);

        let guess = {
            let mut guesses = self.guesses.write().await;
            let key = (round_id.to_string(), imposter_id.to_string());
            match guesses.get_mut(&key) {
                Some(existing) => {
                    existing.guessed_word = guessed_word;
                    existing.is_correct = is_correct;
                    existing.clone()
                }
                None => {
                    let guess = ImposterGuess {
                        id: ulid::Ulid::new().to_string(),
                        round_id: round_id.to_string(),
                        imposter_id: imposter_id.to_string(),
                        guessed_word,
                        is_correct,
                        created_at: chrono::Utc::now().to_rfc3339(),
                    };
                    guesses.insert(key, guess.clone());
                    guess
                }
            }
        };

        tracing::debug!(round_id, imposter_id, is_correct, "guess recorded");
        self.broadcast_to_master(
            &round.game_id,
            ServerMessage::GuessRecorded {
                round_id: round_id.to_string(),
                imposter_id: imposter_id.to_string(),
                guessed_word: guess.guessed_word.clone(),
                is_correct,
            },
        )
        .await;

        Ok(guess)
    }

    pub async fn get_guess(&self, round_id: &str, imposter_id: &str) -> Option<ImposterGuess> {
        self.guesses
            .read()
            .await
            .get(&(round_id.to_string(), imposter_id.to_string()))
            .cloned()
    }
}
