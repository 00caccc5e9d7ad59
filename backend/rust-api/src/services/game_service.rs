use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::metrics::{self, ANSWERS_SUBMITTED_TOTAL, LIFELINES_USED_TOTAL};
use crate::models::game::{
    AnswerVariant, GameQuestion, GameSession, GameStatus, GameSummary, GameView, QuestionView,
};
use crate::models::lifeline::{LifelineHint, LifelineKind};
use crate::models::question::AnswerKey;
use crate::models::user::PlayerProfileResponse;
use crate::utils::time::Clock;

use super::game_engine::{AnswerOutcome, GameEngine, GameError, Settlement};
use super::game_repository::GameRepository;
use super::question_bank::QuestionBank;
use super::user_store::UserStore;

#[derive(Debug, Clone)]
pub struct AnswerResult {
    pub outcome: AnswerOutcome,
    pub status: GameStatus,
    pub game: GameSession,
}

#[derive(Debug, Clone)]
pub struct CashOutResult {
    pub settlement: Settlement,
    pub balance: i64,
}

/// One async mutex per game id; mutations of a game run one at a time.
#[derive(Default)]
struct GameLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GameLocks {
    fn lock_for(&self, game_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(game_id.to_string()).or_default().clone()
    }

    /// Drops the caller's handle and removes the entry once no other caller
    /// holds or waits on it. Handles are only cloned and dropped under the map
    /// lock, so the last caller out always sees a count of one.
    fn release(&self, game_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks
            .get(game_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(game_id);
        }
    }

    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

pub struct GameService {
    engine: GameEngine,
    questions: Arc<dyn QuestionBank>,
    users: Arc<dyn UserStore>,
    games: Arc<dyn GameRepository>,
    clock: Arc<dyn Clock>,
    locks: GameLocks,
}

impl GameService {
    pub fn new(
        engine: GameEngine,
        questions: Arc<dyn QuestionBank>,
        users: Arc<dyn UserStore>,
        games: Arc<dyn GameRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            questions,
            users,
            games,
            clock,
            locks: GameLocks::default(),
        }
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub async fn create_session(&self, user_id: &str) -> Result<GameSession, GameError> {
        if self.users.find_player(user_id).await?.is_none() {
            return Err(GameError::user_not_found(user_id));
        }

        let mut pools = Vec::with_capacity(self.engine.level_count());
        for level in 0..self.engine.level_count() {
            pools.push(self.questions.questions_at_level(level).await?);
        }

        let drawn = {
            let mut rng = rand::rng();
            self.engine.draw_game_questions(&pools, &mut rng)
        }?;
        let game = self.engine.new_session(user_id, drawn, self.clock.now())?;

        self.games.insert(&game).await?;
        metrics::record_game_started();

        tracing::info!(game_id = %game.id, user_id, "Game created");
        Ok(game)
    }

    pub async fn game(&self, game_id: &str, user_id: &str) -> Result<GameSession, GameError> {
        self.load(game_id, Some(user_id)).await
    }

    pub fn status_of(&self, game: &GameSession) -> GameStatus {
        self.engine.status(game)
    }

    /// With `finalize`, an overdue game is closed as a timeout before its
    /// status is derived.
    pub async fn status(
        &self,
        game_id: &str,
        user_id: &str,
        finalize: bool,
    ) -> Result<GameStatus, GameError> {
        let game = if finalize {
            self.mutate(game_id, Some(user_id), |engine, game, now| {
                Ok(engine.expire_if_overdue(game, now))
            })
            .await?
            .1
        } else {
            self.load(game_id, Some(user_id)).await?
        };

        Ok(self.engine.status(&game))
    }

    pub async fn current_question(
        &self,
        game_id: &str,
        user_id: &str,
    ) -> Result<Option<QuestionView>, GameError> {
        let game = self.load(game_id, Some(user_id)).await?;
        if game.is_finished() {
            return Ok(None);
        }
        Ok(game
            .current_game_question()
            .map(|question| self.question_view(question)))
    }

    pub async fn submit_answer(
        &self,
        game_id: &str,
        user_id: &str,
        key: AnswerKey,
    ) -> Result<AnswerResult, GameError> {
        let (outcome, game) = self
            .mutate(game_id, Some(user_id), |engine, game, now| {
                Ok(engine.submit_answer(game, key, now))
            })
            .await?;

        if let Some(correct) = outcome.correct() {
            ANSWERS_SUBMITTED_TOTAL
                .with_label_values(&[if correct { "true" } else { "false" }])
                .inc();
        }

        let status = self.engine.status(&game);
        tracing::info!(
            game_id,
            key = %key,
            ?outcome,
            status = %status,
            level = game.current_level,
            "Answer processed"
        );

        Ok(AnswerResult {
            outcome,
            status,
            game,
        })
    }

    pub async fn cash_out(&self, game_id: &str, user_id: &str) -> Result<CashOutResult, GameError> {
        let result = self
            .mutate(game_id, Some(user_id), |engine, game, now| {
                engine.cash_out(game, now)
            })
            .await;

        let (settlement, _) = match result {
            Ok(done) => done,
            Err(err @ (GameError::CannotCashOutYet | GameError::SessionAlreadyFinished)) => {
                tracing::warn!(game_id, user_id, error = %err, "Take money refused");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let balance = self.users.current_balance(user_id).await?.unwrap_or(0);
        Ok(CashOutResult {
            settlement,
            balance,
        })
    }

    pub async fn use_lifeline(
        &self,
        game_id: &str,
        user_id: &str,
        kind: LifelineKind,
    ) -> Result<LifelineHint, GameError> {
        let (hint, _) = self
            .mutate(game_id, Some(user_id), |engine, game, _| {
                let mut rng = rand::rng();
                engine.use_lifeline(game, kind, &mut rng)
            })
            .await?;

        LIFELINES_USED_TOTAL.with_label_values(&[kind.as_str()]).inc();
        tracing::info!(game_id, lifeline = %kind, "Lifeline used");
        Ok(hint)
    }

    pub async fn list_games(&self, user_id: &str) -> Result<Vec<GameSummary>, GameError> {
        let games = self.games.list_for_user(user_id).await?;
        Ok(games.iter().map(|game| self.summary(game)).collect())
    }

    pub async fn player_profile(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<PlayerProfileResponse, GameError> {
        let player = self
            .users
            .find_player(user_id)
            .await?
            .ok_or_else(|| GameError::user_not_found(user_id))?;
        let games = self.list_games(user_id).await?;

        Ok(PlayerProfileResponse {
            own_profile: viewer_id == Some(player.id.as_str()),
            id: player.id,
            name: player.name,
            balance: player.balance,
            games,
        })
    }

    /// Closes every unfinished game that ran past the time limit. Returns how
    /// many were closed.
    pub async fn expire_overdue_games(&self) -> Result<usize, GameError> {
        let now = self.clock.now();
        let candidates = self
            .games
            .list_unfinished_before(now - self.engine.time_limit())
            .await?;
        let mut expired = 0;

        for game in candidates
            .iter()
            .filter(|game| self.engine.is_overdue(game, now))
        {
            let result = self
                .mutate(&game.id, None, |engine, game, now| {
                    Ok(engine.expire_if_overdue(game, now))
                })
                .await;
            match result {
                Ok((Some(_), _)) => expired += 1,
                Ok((None, _)) => {}
                Err(err) => {
                    tracing::error!(game_id = %game.id, error = %err, "Failed to expire game");
                }
            }
        }

        if expired > 0 {
            tracing::info!(expired, "Expired overdue games");
        }
        Ok(expired)
    }

    pub fn view(&self, game: &GameSession) -> GameView {
        let current_question = if game.is_finished() {
            None
        } else {
            game.current_game_question()
                .map(|question| self.question_view(question))
        };

        GameView {
            id: game.id.clone(),
            user_id: game.user_id.clone(),
            status: self.engine.status(game),
            current_level: game.current_level,
            prize: game.prize,
            is_failed: game.is_failed,
            created_at: game.created_at,
            finished_at: game.finished_at,
            lifelines: game.lifelines.clone(),
            current_question,
        }
    }

    fn summary(&self, game: &GameSession) -> GameSummary {
        GameSummary {
            id: game.id.clone(),
            status: self.engine.status(game),
            current_level: game.current_level,
            prize: game.prize,
            created_at: game.created_at,
            finished_at: game.finished_at,
        }
    }

    fn question_view(&self, question: &GameQuestion) -> QuestionView {
        QuestionView {
            level: question.level,
            text: question.text.clone(),
            answers: AnswerKey::ALL
                .iter()
                .map(|&key| AnswerVariant {
                    key,
                    text: question.variant(key).to_string(),
                })
                .collect(),
            help: question.help.clone(),
            prize_for_level: self.engine.prizes().amount_for_level(question.level),
        }
    }

    async fn load(&self, game_id: &str, owner: Option<&str>) -> Result<GameSession, GameError> {
        match self.games.find(game_id).await? {
            Some(game) if owner.is_none() || owner == Some(game.user_id.as_str()) => Ok(game),
            _ => Err(GameError::game_not_found(game_id)),
        }
    }

    /// Games whose lock entry is currently held or awaited.
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    /// Runs one engine mutation under the game's lock, credits the prize if
    /// the mutation finished the game and persists the result.
    async fn mutate<T, F>(
        &self,
        game_id: &str,
        owner: Option<&str>,
        apply: F,
    ) -> Result<(T, GameSession), GameError>
    where
        F: FnOnce(&GameEngine, &mut GameSession, DateTime<Utc>) -> Result<T, GameError>,
    {
        let lock = self.locks.lock_for(game_id);
        let result = {
            let _guard = lock.lock().await;
            self.mutate_locked(game_id, owner, apply).await
        };
        self.locks.release(game_id, lock);
        result
    }

    async fn mutate_locked<T, F>(
        &self,
        game_id: &str,
        owner: Option<&str>,
        apply: F,
    ) -> Result<(T, GameSession), GameError>
    where
        F: FnOnce(&GameEngine, &mut GameSession, DateTime<Utc>) -> Result<T, GameError>,
    {
        let mut game = self.load(game_id, owner).await?;
        let before = game.clone();
        let value = apply(&self.engine, &mut game, self.clock.now())?;

        if game == before {
            return Ok((value, game));
        }

        // Credit first: the stored game stays open until its prize is paid.
        let finished_now = !before.is_finished() && game.is_finished();
        let balance = if finished_now {
            self.credit_prize(&game).await?
        } else {
            None
        };

        self.games.save(&game).await?;

        if finished_now {
            self.record_finished(&game, balance);
        }
        Ok((value, game))
    }

    async fn credit_prize(&self, game: &GameSession) -> Result<Option<i64>, GameError> {
        if game.prize <= 0 {
            return Ok(None);
        }
        let balance = self
            .users
            .credit_balance(&game.user_id, game.prize, &game.id)
            .await?;
        Ok(Some(balance))
    }

    fn record_finished(&self, game: &GameSession, balance: Option<i64>) {
        let status = self.engine.status(game);
        metrics::record_game_finished(status, game.prize);
        tracing::info!(
            game_id = %game.id,
            user_id = %game.user_id,
            status = %status,
            prize = game.prize,
            ?balance,
            "Game finished"
        );
    }
}
