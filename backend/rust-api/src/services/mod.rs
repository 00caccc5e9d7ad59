use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::utils::time::{Clock, SystemClock};
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

use game_engine::GameEngine;
use game_repository::{GameRepository, MongoGameRepository};
use game_service::GameService;
use question_bank::{MongoQuestionBank, QuestionBank};
use user_store::{MongoUserStore, UserStore};

pub struct AppState {
    pub config: Config,
    pub games: Arc<GameService>,
    pub mongo: Option<Database>,
    pub redis: Option<ConnectionManager>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: Option<redis::Client>,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        let redis = match redis_client {
            Some(client) => Some(connect_redis(client).await?),
            None => {
                tracing::warn!("Redis is not configured, rate limiting is disabled");
                None
            }
        };

        let engine = GameEngine::from_settings(&config.game)?;
        let games = GameService::new(
            engine,
            Arc::new(MongoQuestionBank::new(&mongo)),
            Arc::new(MongoUserStore::new(&mongo)),
            Arc::new(MongoGameRepository::new(&mongo)),
            Arc::new(SystemClock),
        );

        Ok(Self {
            config,
            games: Arc::new(games),
            mongo: Some(mongo),
            redis,
        })
    }

    /// State without external connections. Health checks report the backends
    /// as in-memory and rate limiting is skipped.
    pub fn with_backends(
        config: Config,
        questions: Arc<dyn QuestionBank>,
        users: Arc<dyn UserStore>,
        games: Arc<dyn GameRepository>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let engine = GameEngine::from_settings(&config.game)?;
        let games = GameService::new(engine, questions, users, games, clock);

        Ok(Self {
            config,
            games: Arc::new(games),
            mongo: None,
            redis: None,
        })
    }
}

async fn connect_redis(client: redis::Client) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");

    let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    tracing::info!("Redis ConnectionManager created, testing with PING...");

    let mut conn = redis.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}

pub mod expiry_sweeper;
pub mod game_engine;
pub mod game_repository;
pub mod game_service;
pub mod question_bank;
pub mod user_store;
