use std::sync::Arc;
use std::time::Duration;

use quizladder_api::{
    config::Config,
    services::{expiry_sweeper::ExpirySweeper, AppState},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let provider = telemetry::init_tracing("quizladder-expiry-sweeper");

    let config = Config::load()?;
    let interval = Duration::from_secs(config.sweeper_interval_secs.max(1));

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;

    // The sweeper never rate limits, so it does not need Redis.
    let app_state = AppState::new(config, mongo_client, None).await?;

    let sweeper = ExpirySweeper::new(Arc::clone(&app_state.games), interval);
    let result = sweeper.run().await;

    telemetry::shutdown_tracing(provider);
    result
}
