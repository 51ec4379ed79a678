use crate::state::AppState;
use crate::types::GameStatus;
use std::sync::Arc;
use std::time::Duration;

/// Spawn a background task that pushes tally snapshots for every round
/// currently open for votes
pub fn spawn_tally_broadcaster(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;

            let voting_games: Vec<String> = state
                .games
                .read()
                .await
                .values()
                .filter(|g| g.status == GameStatus::Voting)
                .map(|g| g.id.clone())
                .collect();

            for game_id in voting_games {
                if let Some(round) = state.get_current_round(&game_id).await {
                    state.broadcast_tally(&round).await;
                }
            }
        }
    });
}
