//! Game-master message handlers
//!
//! Thin wrappers around the lifecycle operations; the capability check
//! itself happens inside the core.

use crate::protocol::{RoundInfo, ServerMessage};
use crate::state::AppState;
use crate::types::{GameStatus, UserId};
use crate::ws::handlers::not_joined;
use crate::ws::ConnCtx;
use std::collections::HashSet;
use std::sync::Arc;

const DEFAULT_TOTAL_ROUNDS: u32 = 5;

pub async fn handle_create_game(
    state: &Arc<AppState>,
    ctx: &mut ConnCtx,
    total_rounds: Option<u32>,
) -> Option<ServerMessage> {
    let game = state
        .create_game(&ctx.user_id, total_rounds.unwrap_or(DEFAULT_TOTAL_ROUNDS))
        .await;
    tracing::info!(game_id = %game.id, invite_code = %game.invite_code, "game created");
    ctx.game_id = Some(game.id.clone());
    Some(ServerMessage::GameCreated { game })
}

pub async fn handle_start_round(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
    secret_word: String,
    bonus_hint: String,
    imposter_ids: Vec<UserId>,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };

    let imposter_ids: HashSet<UserId> = imposter_ids.into_iter().collect();
    match state
        .start_round(&game_id, &ctx.user_id, &secret_word, &bonus_hint, imposter_ids)
        .await
    {
        Ok(round) => Some(ServerMessage::RoundStarted {
            round: RoundInfo::from(&round),
        }),
        Err(e) => Some(ServerMessage::from_error(e)),
    }
}

pub async fn handle_advance_phase(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
    status: GameStatus,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };

    match state.advance_status(&game_id, &ctx.user_id, status).await {
        Ok(game) => Some(ServerMessage::PhaseChanged {
            status: game.status,
            round_number: game.current_round,
            server_now: chrono::Utc::now().to_rfc3339(),
        }),
        Err(e) => Some(ServerMessage::from_error(e)),
    }
}

pub async fn handle_end_voting(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
    voted_out_player_id: Option<UserId>,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };

    match state
        .end_voting(&game_id, &ctx.user_id, voted_out_player_id)
        .await
    {
        Ok(resolution) => {
            let round_id = state
                .get_current_round(&game_id)
                .await
                .map(|r| r.id)
                .unwrap_or_default();
            Some(ServerMessage::RoundResolved {
                round_id,
                winner: resolution.winner,
                eliminated_is_imposter: resolution.eliminated_is_imposter,
                voted_out_player_id: resolution.voted_out_player_id,
                standings: state.leaderboard(&game_id).await,
            })
        }
        Err(e) => Some(ServerMessage::from_error(e)),
    }
}

pub async fn handle_set_spotlight(
    state: &Arc<AppState>,
    ctx: &ConnCtx,
    spotlight_player_id: Option<UserId>,
) -> Option<ServerMessage> {
    let Some(game_id) = ctx.game_id.clone() else {
        return Some(not_joined());
    };

    match state
        .set_spotlight(&game_id, &ctx.user_id, spotlight_player_id)
        .await
    {
        Ok(round) => Some(ServerMessage::SpotlightChanged {
            round_id: round.id.clone(),
            spotlight_player_id: round.spotlight_player_id,
        }),
        Err(e) => Some(ServerMessage::from_error(e)),
    }
}
