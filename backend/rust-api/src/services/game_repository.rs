use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::{Collection, Database};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::metrics::track_db_operation;
use crate::models::game::GameSession;
use crate::utils::retry::{retry_async, RetryPolicy};

/// Persistence of game sessions. Sessions are always written whole.
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn insert(&self, game: &GameSession) -> Result<()>;
    async fn find(&self, game_id: &str) -> Result<Option<GameSession>>;
    async fn save(&self, game: &GameSession) -> Result<()>;
    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<GameSession>>;
    /// Unfinished games created strictly before `cutoff`, oldest first.
    async fn list_unfinished_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<GameSession>>;
}

pub struct MongoGameRepository {
    collection: Collection<GameSession>,
    read_retry: RetryPolicy,
    write_retry: RetryPolicy,
}

impl MongoGameRepository {
    pub fn new(mongo: &Database) -> Self {
        Self {
            collection: mongo.collection("games"),
            read_retry: RetryPolicy::for_reads(),
            write_retry: RetryPolicy::for_writes(),
        }
    }

    async fn find_many(&self, filter: Document, sort: Document) -> Result<Vec<GameSession>> {
        track_db_operation("find", "games", async {
            retry_async(&self.read_retry, "games.find", || async {
                let cursor = self
                    .collection
                    .find(filter.clone())
                    .sort(sort.clone())
                    .await?;
                cursor.try_collect::<Vec<GameSession>>().await
            })
            .await
            .context("Failed to query games")
        })
        .await
    }
}

#[async_trait]
impl GameRepository for MongoGameRepository {
    async fn insert(&self, game: &GameSession) -> Result<()> {
        track_db_operation("insert_one", "games", async {
            self.collection
                .insert_one(game)
                .await
                .map(|_| ())
                .with_context(|| format!("Failed to insert game {}", game.id))
        })
        .await
    }

    async fn find(&self, game_id: &str) -> Result<Option<GameSession>> {
        track_db_operation("find_one", "games", async {
            retry_async(&self.read_retry, "games.find_one", || async {
                self.collection.find_one(doc! { "_id": game_id }).await
            })
            .await
            .with_context(|| format!("Failed to load game {}", game_id))
        })
        .await
    }

    async fn save(&self, game: &GameSession) -> Result<()> {
        let result = track_db_operation("replace_one", "games", async {
            retry_async(&self.write_retry, "games.replace_one", || async {
                self.collection
                    .replace_one(doc! { "_id": game.id.as_str() }, game)
                    .await
            })
            .await
            .with_context(|| format!("Failed to save game {}", game.id))
        })
        .await?;

        if result.matched_count == 0 {
            return Err(anyhow!("Game {} does not exist", game.id));
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<GameSession>> {
        self.find_many(doc! { "user_id": user_id }, doc! { "created_at": -1 })
            .await
    }

    async fn list_unfinished_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<GameSession>> {
        let cutoff = bson::DateTime::from_millis(cutoff.timestamp_millis());
        self.find_many(
            doc! { "finished_at": Bson::Null, "created_at": { "$lt": cutoff } },
            doc! { "created_at": 1 },
        )
        .await
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGameRepository {
    games: RwLock<HashMap<String, GameSession>>,
}

impl InMemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameRepository for InMemoryGameRepository {
    async fn insert(&self, game: &GameSession) -> Result<()> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.id) {
            return Err(anyhow!("Game {} already exists", game.id));
        }
        games.insert(game.id.clone(), game.clone());
        Ok(())
    }

    async fn find(&self, game_id: &str) -> Result<Option<GameSession>> {
        Ok(self.games.read().await.get(game_id).cloned())
    }

    async fn save(&self, game: &GameSession) -> Result<()> {
        let mut games = self.games.write().await;
        match games.get_mut(&game.id) {
            Some(stored) => {
                *stored = game.clone();
                Ok(())
            }
            None => Err(anyhow!("Game {} does not exist", game.id)),
        }
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<GameSession>> {
        let mut games: Vec<GameSession> = self
            .games
            .read()
            .await
            .values()
            .filter(|game| game.user_id == user_id)
            .cloned()
            .collect();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(games)
    }

    async fn list_unfinished_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<GameSession>> {
        let mut games: Vec<GameSession> = self
            .games
            .read()
            .await
            .values()
            .filter(|game| !game.is_finished() && game.created_at < cutoff)
            .cloned()
            .collect();
        games.sort_by_key(|game| game.created_at);
        Ok(games)
    }
}
