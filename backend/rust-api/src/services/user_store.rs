use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::metrics::track_db_operation;
use crate::models::user::Player;
use crate::utils::retry::{retry_async, RetryPolicy};

/// Player identities and balances.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_player(&self, user_id: &str) -> Result<Option<Player>>;

    /// Adds `amount` to the balance and returns the new balance. Calls that
    /// repeat a `credit_key` already applied are no-ops.
    async fn credit_balance(&self, user_id: &str, amount: i64, credit_key: &str) -> Result<i64>;

    async fn current_balance(&self, user_id: &str) -> Result<Option<i64>> {
        Ok(self.find_player(user_id).await?.map(|player| player.balance))
    }
}

pub struct MongoUserStore {
    collection: Collection<Player>,
    read_retry: RetryPolicy,
    write_retry: RetryPolicy,
}

impl MongoUserStore {
    pub fn new(mongo: &Database) -> Self {
        Self {
            collection: mongo.collection("users"),
            read_retry: RetryPolicy::for_reads(),
            write_retry: RetryPolicy::for_writes(),
        }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_player(&self, user_id: &str) -> Result<Option<Player>> {
        track_db_operation("find_one", "users", async {
            retry_async(&self.read_retry, "users.find_one", || async {
                self.collection.find_one(doc! { "_id": user_id }).await
            })
            .await
            .with_context(|| format!("Failed to load user {}", user_id))
        })
        .await
    }

    async fn credit_balance(&self, user_id: &str, amount: i64, credit_key: &str) -> Result<i64> {
        // The key is recorded in the same atomic update as the increment, which
        // makes the write safe to retry.
        let filter = doc! { "_id": user_id, "credited_games": { "$ne": credit_key } };
        let update = doc! {
            "$inc": { "balance": amount },
            "$push": { "credited_games": credit_key },
        };

        let updated = track_db_operation("find_one_and_update", "users", async {
            retry_async(&self.write_retry, "users.credit_balance", || async {
                self.collection
                    .find_one_and_update(filter.clone(), update.clone())
                    .with_options(
                        FindOneAndUpdateOptions::builder()
                            .return_document(ReturnDocument::After)
                            .build(),
                    )
                    .await
            })
            .await
            .with_context(|| format!("Failed to credit balance of user {}", user_id))
        })
        .await?;

        match updated {
            Some(player) => Ok(player.balance),
            None => self
                .find_player(user_id)
                .await?
                .map(|player| player.balance)
                .ok_or_else(|| anyhow!("User {} not found", user_id)),
        }
    }
}

#[derive(Debug, Default)]
struct UserLedger {
    players: HashMap<String, Player>,
    applied_credits: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<UserLedger>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, player: Player) {
        let mut ledger = self.inner.write().await;
        ledger.players.insert(player.id.clone(), player);
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_player(&self, user_id: &str) -> Result<Option<Player>> {
        Ok(self.inner.read().await.players.get(user_id).cloned())
    }

    async fn credit_balance(&self, user_id: &str, amount: i64, credit_key: &str) -> Result<i64> {
        let mut ledger = self.inner.write().await;
        let already_applied = ledger.applied_credits.contains(credit_key);

        let player = ledger
            .players
            .get_mut(user_id)
            .ok_or_else(|| anyhow!("User {} not found", user_id))?;
        if !already_applied {
            player.balance += amount;
        }
        let balance = player.balance;

        ledger.applied_credits.insert(credit_key.to_string());
        Ok(balance)
    }
}
