use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new game with the connected user as game master
    CreateGame {
        total_rounds: Option<u32>,
    },
    /// Join an existing game by invite code (idempotent for re-joins)
    JoinGame {
        invite_code: String,
    },
    /// Re-fetch the joined game's full state (reconnect recovery)
    FetchGameState,
    /// Ask for this user's role in the active round (secret word or hint)
    FetchRole,
    FetchLeaderboard,
    CastVote {
        voted_for_id: Option<UserId>,
    },
    SubmitGuess {
        guessed_word: String,
    },
    /// Record a clue word. `player_id` other than the sender's own means the
    /// game master is entering it on that player's behalf.
    SubmitClue {
        clue_word: Option<String>,
        player_id: Option<UserId>,
    },
    // Game-master commands
    MasterStartRound {
        secret_word: String,
        bonus_hint: String,
        imposter_ids: Vec<UserId>,
    },
    MasterAdvancePhase {
        status: GameStatus,
    },
    MasterEndVoting {
        voted_out_player_id: Option<UserId>,
    },
    MasterSetSpotlight {
        spotlight_player_id: Option<UserId>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        user_id: UserId,
        server_now: String,
    },
    GameCreated {
        game: Game,
    },
    GameJoined {
        game: Game,
        players: Vec<GamePlayer>,
        round: Option<RoundInfo>,
        rejoined: bool,
    },
    GameState {
        game: Game,
        players: Vec<GamePlayer>,
        round: Option<RoundInfo>,
    },
    /// Broadcast when a player joins the registry
    PlayerJoined {
        player: GamePlayer,
    },
    /// Broadcast on every lifecycle transition
    PhaseChanged {
        status: GameStatus,
        round_number: u32,
        server_now: String,
    },
    RoundStarted {
        round: RoundInfo,
    },
    /// Direct reply: the requesting user's role for the active round.
    /// `word` is the secret word for non-imposters, the bonus hint for
    /// imposters.
    RoleInfo {
        round_id: RoundId,
        is_imposter: bool,
        word: String,
    },
    VoteAck {
        round_id: RoundId,
        voted_for_id: Option<UserId>,
    },
    /// Broadcast tally snapshot; display-only, never consulted by resolution
    VoteTally {
        round_id: RoundId,
        counts: HashMap<UserId, u32>,
        votes_cast: u32,
    },
    GuessAck {
        round_id: RoundId,
        guessed_word: String,
        is_correct: bool,
    },
    /// Game-master channel only: a guess arrived
    GuessRecorded {
        round_id: RoundId,
        imposter_id: UserId,
        guessed_word: String,
        is_correct: bool,
    },
    ClueRecorded {
        clue: PlayerClue,
    },
    SpotlightChanged {
        round_id: RoundId,
        spotlight_player_id: Option<UserId>,
    },
    /// Broadcast once per round, from the single effective resolution run
    RoundResolved {
        round_id: RoundId,
        winner: RoundWinner,
        eliminated_is_imposter: bool,
        voted_out_player_id: Option<UserId>,
        standings: Vec<GamePlayer>,
    },
    GameEnded {
        game_id: GameId,
        standings: Vec<GamePlayer>,
    },
    Leaderboard {
        players: Vec<GamePlayer>,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Public round info (no secret word, hint, or imposter set to prevent
/// spoilers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundInfo {
    pub id: RoundId,
    pub game_id: GameId,
    pub round_number: u32,
    pub status: RoundStatus,
    pub spotlight_player_id: Option<UserId>,
    pub winner: Option<RoundWinner>,
    pub voted_out_player_id: Option<UserId>,
    pub eliminated_is_imposter: Option<bool>,
}

impl From<&Round> for RoundInfo {
    fn from(r: &Round) -> Self {
        let resolution = r.outcome.resolution();
        Self {
            id: r.id.clone(),
            game_id: r.game_id.clone(),
            round_number: r.round_number,
            status: r.status,
            spotlight_player_id: r.spotlight_player_id.clone(),
            winner: resolution.map(|res| res.winner),
            voted_out_player_id: resolution.and_then(|res| res.voted_out_player_id.clone()),
            eliminated_is_imposter: resolution.map(|res| res.eliminated_is_imposter),
        }
    }
}

impl ServerMessage {
    /// Build an error reply from a core error, preserving its wire code
    pub fn from_error(err: crate::error::GameError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}
