use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::metrics::EXPIRY_SWEEPER_TICKS_TOTAL;
use crate::services::game_service::GameService;

/// Periodically closes games that ran past the time limit without a final
/// request from the player.
pub struct ExpirySweeper {
    games: Arc<GameService>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(games: Arc<GameService>, interval: Duration) -> Self {
        Self { games, interval }
    }

    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting expiry sweeper loop (interval {}s)",
            self.interval.as_secs()
        );

        loop {
            match self.run_once().await {
                Ok(expired) => {
                    EXPIRY_SWEEPER_TICKS_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    info!(expired, "Expiry sweeper tick completed");
                }
                Err(err) => {
                    EXPIRY_SWEEPER_TICKS_TOTAL
                        .with_label_values(&["error"])
                        .inc();
                    warn!(error = %err, "Expiry sweeper tick failed");
                }
            }

            sleep(self.interval).await;
        }
    }

    pub async fn run_once(&self) -> Result<usize> {
        Ok(self.games.expire_overdue_games().await?)
    }
}
