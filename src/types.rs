use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque ID types for type safety
pub type GameId = String;
pub type RoundId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Waiting,
    RoleAssignment,
    Discussion,
    Voting,
    RoundEnd,
    GameEnd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    Setup,
    Discussion,
    Voting,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundWinner {
    NonImposters,
    Imposter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClueEnteredBy {
    Player,
    GameMaster,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub game_master_id: UserId,
    /// 6-character join code, stored uppercase, matched case-insensitively
    pub invite_code: String,
    pub total_rounds: u32,
    pub current_round: u32,
    pub status: GameStatus,
    pub created_at: String,
}

/// Result of resolving a round. Stored inside [`RoundOutcome::Resolved`],
/// so the winner and voted-out player cannot be written twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundResolution {
    pub winner: RoundWinner,
    pub voted_out_player_id: Option<UserId>,
    pub eliminated_is_imposter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoundOutcome {
    Pending,
    Resolved(RoundResolution),
}

impl RoundOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, RoundOutcome::Resolved(_))
    }

    pub fn resolution(&self) -> Option<&RoundResolution> {
        match self {
            RoundOutcome::Pending => None,
            RoundOutcome::Resolved(r) => Some(r),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub game_id: GameId,
    pub round_number: u32,
    /// Shown to non-imposters during role assignment
    pub secret_word: String,
    /// Shown to imposters instead of the secret word
    pub bonus_hint: String,
    /// Non-empty, strict subset of the game's players
    pub imposter_ids: HashSet<UserId>,
    pub spotlight_player_id: Option<UserId>,
    pub status: RoundStatus,
    pub outcome: RoundOutcome,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayer {
    pub id: String,
    pub game_id: GameId,
    pub user_id: UserId,
    pub total_points: u32,
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub round_id: RoundId,
    pub voter_id: UserId,
    /// None = abstain
    pub voted_for_id: Option<UserId>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImposterGuess {
    pub id: String,
    pub round_id: RoundId,
    pub imposter_id: UserId,
    pub guessed_word: String,
    /// Derived from the round's secret word, recomputed on every write
    pub is_correct: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerClue {
    pub id: String,
    pub round_id: RoundId,
    pub player_id: UserId,
    pub clue_word: Option<String>,
    pub entered_by: ClueEnteredBy,
    pub created_at: String,
    pub updated_at: String,
}
