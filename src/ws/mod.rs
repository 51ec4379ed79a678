pub mod handlers;
pub mod master;
pub mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{GameId, UserId};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Externally-authenticated user identity (the session layer's job;
    /// a query param stands in for it here)
    pub user: Option<String>,
}

/// Per-connection context: who is talking and which game the socket has
/// joined
#[derive(Debug, Clone)]
pub struct ConnCtx {
    pub user_id: UserId,
    pub game_id: Option<GameId>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match params
        .user
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
    {
        Some(u) => u,
        None => {
            let error = ServerMessage::Error {
                code: "MISSING_USER".to_string(),
                msg: "connect with ?user=<id>".to_string(),
            };
            if let Ok(json) = serde_json::to_string(&error) {
                let _ = sender.send(Message::Text(json.into())).await;
            }
            return;
        }
    };

    tracing::info!(%user_id, "WebSocket connected");

    let welcome = ServerMessage::Welcome {
        protocol: "1.0".to_string(),
        user_id: user_id.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if let Ok(msg) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            tracing::error!("Failed to send welcome message");
            return;
        }
    }

    let mut ctx = ConnCtx {
        user_id,
        game_id: None,
    };
    let mut subscribed_game: Option<GameId> = None;
    let mut game_rx: Option<tokio::sync::broadcast::Receiver<ServerMessage>> = None;
    let mut master_rx: Option<tokio::sync::broadcast::Receiver<ServerMessage>> = None;

    loop {
        tokio::select! {
            // Row-change notifications for the joined game
            broadcast_msg = async {
                match &mut game_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => {
                        // Not joined yet: wait forever
                        std::future::pending::<Option<ServerMessage>>().await
                    }
                }
            } => {
                if let Some(msg) = broadcast_msg {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Game-master-only notifications
            master_msg = async {
                match &mut master_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => {
                        std::future::pending::<Option<ServerMessage>>().await
                    }
                }
            } => {
                if let Some(msg) = master_msg {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let response =
                                    handlers::handle_message(client_msg, &mut ctx, &state).await;

                                // Joining (or creating) a game attaches this
                                // socket to its channels
                                if ctx.game_id != subscribed_game {
                                    if let Some(game_id) = ctx.game_id.clone() {
                                        game_rx = state.subscribe(&game_id).await;
                                        let is_master = state
                                            .get_game(&game_id)
                                            .await
                                            .map(|g| g.game_master_id == ctx.user_id)
                                            .unwrap_or(false);
                                        master_rx = if is_master {
                                            state.subscribe_master(&game_id).await
                                        } else {
                                            None
                                        };
                                        subscribed_game = Some(game_id);
                                    }
                                }

                                if let Some(response) = response {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            tracing::error!("Failed to send response");
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(user_id = %ctx.user_id, "WebSocket connection closed");
}
