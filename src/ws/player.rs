//! Player message handlers
//!
//! Join, state recovery, voting, guessing and clue entry.

use crate::error::GameError;
use crate::protocol::{RoundInfo, ServerMessage};
use crate::state::AppState;
use crate::types::UserId;
use crate::ws::handlers::not_joined;
use crate::ws::ConnCtx;
use std::sync::Arc;

pub async fn handle_join_game(
    state: &Arc<AppState>,
    ctx: &mut ConnCtx,
    invite_code: String,
) -> Option<ServerMessage> {
    // The game master reconnects through the same flow but never enters
    // the player registry
    if let Some(game) = state.find_game_by_code(&invite_code).await {
        if game.game_master_id == ctx.user_id {
            ctx.game_id = Some(game.id.clone());
            let players = state.players_of(&game.id).await;
            let round = state
                .get_current_round(&game.id)
                .await
                .map(|r| RoundInfo::from(&r));
            return Some(ServerMessage::GameJoined {
                game,
                players,
                round,
                rejoined: true,
            });
        }
    }

    match state.join_game(&invite_code, &ctx.user_id).await {
        Ok((game, _player, rejoined)) => {
            ctx.game_id = Some(game.id.clone());
            let players = state.players_of(&game.id).await;
            let round = state
                .get_current_round(&game.id)
                .await
                .map(|r| RoundInfo::from(&r));
            Some(ServerMessage::GameJoined {
                game,
                players,
                round,
                rejoined,
            })
        }
        Err(e) => Some(ServerMessage::from_error(e)),
    }
}

pub async fn handle_fetch_game_state(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };
    let Some(game) = state.get_game(&game_id).await else {
        return Some(ServerMessage::from_error(GameError::GameNotFound));
    };
    let players = state.players_of(&game_id).await;
    let round = state
        .get_current_round(&game_id)
        .await
        .map(|r| RoundInfo::from(&r));
    Some(ServerMessage::GameState {
        game,
        players,
        round,
    })
}

/// Word distribution: imposters get the bonus hint, everyone else the
/// secret word. Direct reply only, never broadcast.
pub async fn handle_fetch_role(state: &Arc<AppState>, ctx: &ConnCtx) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };
    let Some(round) = state.get_current_round(&game_id).await else {
        return Some(ServerMessage::from_error(GameError::RoundNotFound));
    };

    if round.imposter_ids.contains(&ctx.user_id) {
        Some(ServerMessage::RoleInfo {
            round_id: round.id.clone(),
            is_imposter: true,
            word: round.bonus_hint.clone(),
        })
    } else if state.is_participant(&game_id, &ctx.user_id).await {
        Some(ServerMessage::RoleInfo {
            round_id: round.id.clone(),
            is_imposter: false,
            word: round.secret_word.clone(),
        })
    } else {
        Some(ServerMessage::from_error(GameError::NotAParticipant(
            ctx.user_id.clone(),
        )))
    }
}

pub async fn handle_fetch_leaderboard(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };
    Some(ServerMessage::Leaderboard {
        players: state.leaderboard(&game_id).await,
    })
}

pub async fn handle_cast_vote(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
    voted_for_id: Option<UserId>,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };
    let Some(round) = state.get_current_round(&game_id).await else {
        return Some(ServerMessage::from_error(GameError::RoundNotFound));
    };

    match state
        .record_vote(&round.id, &ctx.user_id, voted_for_id)
        .await
    {
        Ok(vote) => Some(ServerMessage::VoteAck {
            round_id: vote.round_id,
            voted_for_id: vote.voted_for_id,
        }),
        Err(e) => Some(ServerMessage::from_error(e)),
    }
}

pub async fn handle_submit_guess(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
    guessed_word: String,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };
    let Some(round) = state.get_current_round(&game_id).await else {
        return Some(ServerMessage::from_error(GameError::RoundNotFound));
    };

    match state
        .submit_guess(&round.id, &ctx.user_id, &guessed_word)
        .await
    {
        Ok(guess) => Some(ServerMessage::GuessAck {
            round_id: guess.round_id,
            guessed_word: guess.guessed_word,
            is_correct: guess.is_correct,
        }),
        Err(e) => Some(ServerMessage::from_error(e)),
    }
}

pub async fn handle_submit_clue(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
    clue_word: Option<String>,
    player_id: Option<UserId>,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };
    let Some(round) = state.get_current_round(&game_id).await else {
        return Some(ServerMessage::from_error(GameError::RoundNotFound));
    };

    let player_id = player_id.unwrap_or_else(|| ctx.user_id.clone());
    match state
        .submit_clue(&round.id, &ctx.user_id, &player_id, clue_word)
        .await
    {
        Ok(clue) => Some(ServerMessage::ClueRecorded { clue }),
        Err(e) => Some(ServerMessage::from_error(e)),
    }
}
