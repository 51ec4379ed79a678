//! WebSocket message dispatch
//!
//! This module provides the main entry point for handling client messages.
//! Game-master authorization lives in the core operations themselves; this
//! layer resolves the connection context and maps rejections to wire
//! replies.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::ws::ConnCtx;
use std::sync::Arc;

use super::{master, player};

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    ctx: &mut ConnCtx,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateGame { total_rounds } => {
            master::handle_create_game(state, ctx, total_rounds).await
        }

        ClientMessage::JoinGame { invite_code } => {
            player::handle_join_game(state, ctx, invite_code).await
        }

        ClientMessage::FetchGameState => player::handle_fetch_game_state(state, ctx).await,

        ClientMessage::FetchRole => player::handle_fetch_role(state, ctx).await,

        ClientMessage::FetchLeaderboard => player::handle_fetch_leaderboard(state, ctx).await,

        ClientMessage::CastVote { voted_for_id } => {
            player::handle_cast_vote(state, ctx, voted_for_id).await
        }

        ClientMessage::SubmitGuess { guessed_word } => {
            player::handle_submit_guess(state, ctx, guessed_word).await
        }

        ClientMessage::SubmitClue {
            clue_word,
            player_id,
        } => player::handle_submit_clue(state, ctx, clue_word, player_id).await,

        // Game-master commands; the core verifies the capability
        ClientMessage::MasterStartRound {
            secret_word,
            bonus_hint,
            imposter_ids,
        } => master::handle_start_round(state, ctx, secret_word, bonus_hint, imposter_ids).await,

        ClientMessage::MasterAdvancePhase { status } => {
            master::handle_advance_phase(state, ctx, status).await
        }

        ClientMessage::MasterEndVoting { voted_out_player_id } => {
            master::handle_end_voting(state, ctx, voted_out_player_id).await
        }

        ClientMessage::MasterSetSpotlight {
            spotlight_player_id,
        } => master::handle_set_spotlight(state, ctx, spotlight_player_id).await,
    }
}

/// Reply for game-scoped messages arriving before the socket joined a game
pub(crate) fn not_joined() -> ServerMessage {
    ServerMessage::Error {
        code: "NOT_JOINED".to_string(),
        msg: "join a game first".to_string(),
    }
}
