use crate::types::UserId;

/// Errors returned by the core game operations.
///
/// Every variant maps to a stable wire code via [`GameError::code`] so the
/// transport layer can surface rejections without string matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("game not found")]
    GameNotFound,

    #[error("round not found")]
    RoundNotFound,

    /// A phase change (or phase-gated write) whose preconditions are unmet.
    /// Nothing is mutated.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("user {0} is not a participant of this game")]
    NotAParticipant(UserId),

    #[error("user {0} is not an imposter this round")]
    NotAnImposter(UserId),

    /// The round is already completed and immutable.
    #[error("round is already resolved")]
    AlreadyResolved,

    /// A compare-and-set lost a genuine race; re-read and retry if needed.
    #[error("storage conflict: {0}")]
    StorageConflict(String),

    #[error("only the game master can {0}")]
    NotGameMaster(String),
}

impl GameError {
    pub fn code(&self) -> &'static str {
        match self {
            GameError::GameNotFound => "GAME_NOT_FOUND",
            GameError::RoundNotFound => "ROUND_NOT_FOUND",
            GameError::InvalidTransition(_) => "INVALID_TRANSITION",
            GameError::NotAParticipant(_) => "NOT_A_PARTICIPANT",
            GameError::NotAnImposter(_) => "NOT_AN_IMPOSTER",
            GameError::AlreadyResolved => "ALREADY_RESOLVED",
            GameError::StorageConflict(_) => "STORAGE_CONFLICT",
            GameError::NotGameMaster(_) => "NOT_GAME_MASTER",
        }
    }
}
