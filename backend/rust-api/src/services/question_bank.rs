use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Collection, Database};

use crate::metrics::track_db_operation;
use crate::models::question::Question;
use crate::utils::retry::{retry_async, RetryPolicy};

/// Read side of the question bank.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn questions_at_level(&self, level: usize) -> Result<Vec<Question>>;
}

pub struct MongoQuestionBank {
    collection: Collection<Question>,
    retry: RetryPolicy,
}

impl MongoQuestionBank {
    pub fn new(mongo: &Database) -> Self {
        Self {
            collection: mongo.collection("questions"),
            retry: RetryPolicy::for_reads(),
        }
    }
}

#[async_trait]
impl QuestionBank for MongoQuestionBank {
    async fn questions_at_level(&self, level: usize) -> Result<Vec<Question>> {
        let filter = doc! { "level": level as i64 };

        track_db_operation("find", "questions", async {
            retry_async(&self.retry, "questions.find", || async {
                let cursor = self.collection.find(filter.clone()).await?;
                cursor.try_collect::<Vec<Question>>().await
            })
            .await
            .with_context(|| format!("Failed to load questions for level {}", level))
        })
        .await
    }
}

/// Fixed question set kept in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryQuestionBank {
    questions: Vec<Question>,
}

impl InMemoryQuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// `per_level` placeholder questions for each of `levels` levels. Answer
    /// texts follow the bank convention: the first one is correct.
    pub fn generated(levels: usize, per_level: usize) -> Self {
        let questions = (0..levels)
            .flat_map(|level| {
                (0..per_level).map(move |n| {
                    Question::new(
                        format!("q-{level}-{n}"),
                        level,
                        format!("Level {level} question #{n}"),
                        [
                            format!("right {level}/{n}"),
                            format!("wrong A {level}/{n}"),
                            format!("wrong B {level}/{n}"),
                            format!("wrong C {level}/{n}"),
                        ],
                    )
                })
            })
            .collect();

        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[async_trait]
impl QuestionBank for InMemoryQuestionBank {
    async fn questions_at_level(&self, level: usize) -> Result<Vec<Question>> {
        Ok(self
            .questions
            .iter()
            .filter(|question| question.level == level)
            .cloned()
            .collect())
    }
}
