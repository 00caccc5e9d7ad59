//! Rules of the question ladder.
//!
//! The engine is synchronous and side-effect free apart from mutating the
//! session it is handed: storage, balance credits and locking belong to
//! [`GameService`](super::game_service::GameService).

use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::config::GameSettings;
use crate::models::game::{GameQuestion, GameSession, GameStatus};
use crate::models::lifeline::{AudienceVote, FriendCall, LifelineHint, LifelineKind};
use crate::models::prize::{PrizeTable, PrizeTableError};
use crate::models::question::{AnswerKey, Question};

const FRIEND_CALL_ACCURACY: f64 = 0.8;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("not enough questions in the bank for level {level}")]
    InsufficientQuestions { level: usize },
    #[error("game is already finished")]
    SessionAlreadyFinished,
    #[error("cannot take money before the first correct answer")]
    CannotCashOutYet,
    #[error("lifeline {0} has already been used in this game")]
    LifelineAlreadyUsed(LifelineKind),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl GameError {
    pub fn game_not_found(id: impl Into<String>) -> Self {
        GameError::NotFound {
            entity: "game",
            id: id.into(),
        }
    }

    pub fn user_not_found(id: impl Into<String>) -> Self {
        GameError::NotFound {
            entity: "user",
            id: id.into(),
        }
    }
}

/// Result of one answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Advanced { level: usize },
    Won { prize: i64 },
    Failed { prize: i64 },
    TimedOut { prize: i64 },
    /// Submission against a terminal session; nothing changed.
    AlreadyFinished { status: GameStatus },
}

impl AnswerOutcome {
    /// Whether the answer was evaluated, and if so whether it was right.
    pub fn correct(&self) -> Option<bool> {
        match self {
            AnswerOutcome::Advanced { .. } | AnswerOutcome::Won { .. } => Some(true),
            AnswerOutcome::Failed { .. } => Some(false),
            AnswerOutcome::TimedOut { .. } | AnswerOutcome::AlreadyFinished { .. } => None,
        }
    }

    /// Prize settled by this call, if the call finished the game.
    pub fn settled_prize(&self) -> Option<i64> {
        match *self {
            AnswerOutcome::Won { prize }
            | AnswerOutcome::Failed { prize }
            | AnswerOutcome::TimedOut { prize } => Some(prize),
            AnswerOutcome::Advanced { .. } | AnswerOutcome::AlreadyFinished { .. } => None,
        }
    }
}

/// Terminal status and prize fixed when a game finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub status: GameStatus,
    pub prize: i64,
}

#[derive(Debug, Clone)]
pub struct GameEngine {
    prizes: PrizeTable,
    time_limit: Duration,
    allow_cash_out_at_start: bool,
}

impl GameEngine {
    pub fn new(prizes: PrizeTable, time_limit: Duration, allow_cash_out_at_start: bool) -> Self {
        Self {
            prizes,
            time_limit,
            allow_cash_out_at_start,
        }
    }

    pub fn from_settings(settings: &GameSettings) -> Result<Self, PrizeTableError> {
        let prizes = PrizeTable::new(settings.prizes.clone(), settings.fireproof_levels.clone())?;
        Ok(Self::new(
            prizes,
            Duration::seconds(settings.time_limit_seconds as i64),
            settings.allow_cash_out_at_start,
        ))
    }

    pub fn prizes(&self) -> &PrizeTable {
        &self.prizes
    }

    pub fn level_count(&self) -> usize {
        self.prizes.len()
    }

    pub fn max_level(&self) -> usize {
        self.prizes.max_level()
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Picks one question per level so that no question id repeats anywhere in
    /// the game. `pools[level]` holds the bank's candidates for that level.
    pub fn draw_game_questions<R: Rng + ?Sized>(
        &self,
        pools: &[Vec<Question>],
        rng: &mut R,
    ) -> Result<Vec<GameQuestion>, GameError> {
        let mut used_ids: HashSet<String> = HashSet::new();
        let mut drawn = Vec::with_capacity(self.level_count());

        for level in 0..self.level_count() {
            let mut candidates: Vec<&Question> = pools
                .get(level)
                .map(|pool| pool.iter().collect())
                .unwrap_or_default();

            let picked = loop {
                if candidates.is_empty() {
                    tracing::warn!(level, "Question bank exhausted while drawing a game");
                    return Err(GameError::InsufficientQuestions { level });
                }
                let index = rng.random_range(0..candidates.len());
                let candidate = candidates.swap_remove(index);
                if used_ids.insert(candidate.id.clone()) {
                    break candidate;
                }
                tracing::debug!(
                    level,
                    question_id = %candidate.id,
                    "Question already drawn for another level, redrawing"
                );
            };

            let mut question = picked.clone();
            question.level = level;
            drawn.push(GameQuestion::shuffled(question, rng));
        }

        Ok(drawn)
    }

    /// Builds a fresh session from one drawn question per level.
    pub fn new_session(
        &self,
        user_id: &str,
        game_questions: Vec<GameQuestion>,
        now: DateTime<Utc>,
    ) -> Result<GameSession, GameError> {
        for level in 0..self.level_count() {
            match game_questions.get(level) {
                Some(gq) if gq.level == level => {}
                _ => return Err(GameError::InsufficientQuestions { level }),
            }
        }
        if game_questions.len() != self.level_count() {
            return Err(GameError::InsufficientQuestions {
                level: self.level_count(),
            });
        }

        Ok(GameSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            game_questions,
            current_level: 0,
            is_failed: false,
            created_at: now,
            finished_at: None,
            prize: 0,
            lifelines: Default::default(),
        })
    }

    pub fn status(&self, session: &GameSession) -> GameStatus {
        let elapsed = session
            .finished_at
            .map(|finished_at| finished_at - session.created_at)
            .unwrap_or_else(Duration::zero);

        GameStatus::classify(
            session.is_finished(),
            session.is_failed,
            session.current_level,
            self.max_level(),
            elapsed,
            self.time_limit,
        )
    }

    pub fn is_overdue(&self, session: &GameSession, now: DateTime<Utc>) -> bool {
        !session.is_finished() && session.elapsed(now) > self.time_limit
    }

    /// Lazy timeout: finalizes an unfinished session that ran past the limit.
    pub fn expire_if_overdue(
        &self,
        session: &mut GameSession,
        now: DateTime<Utc>,
    ) -> Option<Settlement> {
        if !self.is_overdue(session, now) {
            return None;
        }

        let prize = self
            .prizes
            .nearest_fireproof_amount_below(session.current_level);
        self.finish(session, now, true, prize);
        tracing::warn!(
            game_id = %session.id,
            level = session.current_level,
            prize,
            "Game ran past its time limit"
        );

        Some(Settlement {
            status: self.status(session),
            prize,
        })
    }

    pub fn submit_answer(
        &self,
        session: &mut GameSession,
        key: AnswerKey,
        now: DateTime<Utc>,
    ) -> AnswerOutcome {
        if session.is_finished() {
            return AnswerOutcome::AlreadyFinished {
                status: self.status(session),
            };
        }

        if let Some(settlement) = self.expire_if_overdue(session, now) {
            return AnswerOutcome::TimedOut {
                prize: settlement.prize,
            };
        }

        let correct = match session.current_game_question() {
            Some(question) => question.answer_correct(key),
            None => {
                return AnswerOutcome::AlreadyFinished {
                    status: self.status(session),
                }
            }
        };

        if !correct {
            let prize = self
                .prizes
                .nearest_fireproof_amount_below(session.current_level);
            self.finish(session, now, true, prize);
            return AnswerOutcome::Failed { prize };
        }

        if session.current_level >= self.max_level() {
            let prize = self.prizes.amount_for_level(self.max_level());
            session.current_level = self.max_level() + 1;
            self.finish(session, now, false, prize);
            AnswerOutcome::Won { prize }
        } else {
            session.current_level += 1;
            AnswerOutcome::Advanced {
                level: session.current_level,
            }
        }
    }

    /// Voluntary exit paying the amount of the last completed level.
    pub fn cash_out(
        &self,
        session: &mut GameSession,
        now: DateTime<Utc>,
    ) -> Result<Settlement, GameError> {
        if session.is_finished() {
            return Err(GameError::SessionAlreadyFinished);
        }

        if let Some(settlement) = self.expire_if_overdue(session, now) {
            return Ok(settlement);
        }

        let prize = match session.previous_level() {
            Some(level) => self.prizes.amount_for_level(level),
            None if self.allow_cash_out_at_start => 0,
            None => return Err(GameError::CannotCashOutYet),
        };

        self.finish(session, now, false, prize);

        Ok(Settlement {
            status: self.status(session),
            prize,
        })
    }

    pub fn use_lifeline<R: Rng + ?Sized>(
        &self,
        session: &mut GameSession,
        kind: LifelineKind,
        rng: &mut R,
    ) -> Result<LifelineHint, GameError> {
        if session.is_finished() {
            return Err(GameError::SessionAlreadyFinished);
        }
        if session.lifelines.is_used(kind) {
            return Err(GameError::LifelineAlreadyUsed(kind));
        }

        let question = session
            .current_game_question_mut()
            .ok_or(GameError::SessionAlreadyFinished)?;

        let correct = question.correct_answer_key();
        let in_play = question.keys_in_play();
        let wrong: Vec<AnswerKey> = in_play.iter().copied().filter(|k| *k != correct).collect();

        let hint = match kind {
            LifelineKind::FiftyFifty => {
                let mut keys = vec![correct];
                keys.extend(wrong.choose(rng).copied());
                keys.sort_unstable();
                question.help.fifty_fifty = Some(keys.clone());
                LifelineHint::FiftyFifty { keys }
            }
            LifelineKind::AudienceHelp => {
                let votes = audience_distribution(&in_play, correct, rng);
                question.help.audience_help = Some(votes.clone());
                LifelineHint::AudienceHelp { votes }
            }
            LifelineKind::FriendCall => {
                let key = if rng.random_bool(FRIEND_CALL_ACCURACY) {
                    correct
                } else {
                    wrong.choose(rng).copied().unwrap_or(correct)
                };
                let call = FriendCall {
                    key,
                    message: format!(
                        "Your friend thinks the answer is {}",
                        key.as_str().to_uppercase()
                    ),
                };
                question.help.friend_call = Some(call.clone());
                LifelineHint::FriendCall(call)
            }
        };

        session.lifelines.mark_used(kind);
        Ok(hint)
    }

    fn finish(&self, session: &mut GameSession, now: DateTime<Utc>, failed: bool, prize: i64) {
        session.is_failed = failed;
        session.finished_at = Some(now);
        session.prize = session.prize.max(prize);
    }
}

/// Splits 100% across `keys`, giving the correct key a boosted share.
fn audience_distribution<R: Rng + ?Sized>(
    keys: &[AnswerKey],
    correct: AnswerKey,
    rng: &mut R,
) -> Vec<AudienceVote> {
    let others: Vec<AnswerKey> = keys.iter().copied().filter(|k| *k != correct).collect();
    let correct_share: u8 = if others.is_empty() {
        100
    } else {
        rng.random_range(45..=85)
    };

    let mut remaining = 100 - correct_share;
    let mut votes = vec![AudienceVote {
        key: correct,
        percent: correct_share,
    }];

    for (position, key) in others.iter().enumerate() {
        let percent = if position + 1 == others.len() {
            remaining
        } else {
            rng.random_range(0..=remaining)
        };
        remaining -= percent;
        votes.push(AudienceVote {
            key: *key,
            percent,
        });
    }

    votes.sort_by_key(|vote| vote.key);
    votes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const LIMIT_SECS: i64 = 3600;

    fn engine() -> GameEngine {
        GameEngine::new(
            PrizeTable::default(),
            Duration::seconds(LIMIT_SECS),
            false,
        )
    }

    fn question(id: &str, level: usize) -> Question {
        Question::new(
            id,
            level,
            format!("Question {id}"),
            [
                format!("{id}-right"),
                format!("{id}-wrong-1"),
                format!("{id}-wrong-2"),
                format!("{id}-wrong-3"),
            ],
        )
    }

    fn pools(per_level: usize) -> Vec<Vec<Question>> {
        (0..15)
            .map(|level| {
                (0..per_level)
                    .map(|i| question(&format!("q{level}-{i}"), level))
                    .collect()
            })
            .collect()
    }

    fn new_game(engine: &GameEngine, now: DateTime<Utc>) -> GameSession {
        let mut rng = StdRng::seed_from_u64(7);
        let questions = engine.draw_game_questions(&pools(4), &mut rng).unwrap();
        engine.new_session("user-1", questions, now).unwrap()
    }

    fn correct_key(session: &GameSession) -> AnswerKey {
        session.current_game_question().unwrap().correct_answer_key()
    }

    fn wrong_key(session: &GameSession) -> AnswerKey {
        let correct = correct_key(session);
        AnswerKey::ALL.into_iter().find(|k| *k != correct).unwrap()
    }

    fn climb_to(engine: &GameEngine, session: &mut GameSession, level: usize, now: DateTime<Utc>) {
        while session.current_level < level {
            let key = correct_key(session);
            engine.submit_answer(session, key, now);
        }
    }

    #[test]
    fn new_game_has_one_question_per_level() {
        let engine = engine();
        let game = new_game(&engine, Utc::now());

        assert_eq!(game.game_questions.len(), 15);
        let levels: Vec<usize> = game.game_questions.iter().map(|gq| gq.level).collect();
        assert_eq!(levels, (0..15).collect::<Vec<_>>());

        let ids: HashSet<&str> = game
            .game_questions
            .iter()
            .map(|gq| gq.question_id.as_str())
            .collect();
        assert_eq!(ids.len(), 15);

        assert_eq!(game.current_level, 0);
        assert!(!game.is_failed);
        assert!(game.finished_at.is_none());
        assert_eq!(game.prize, 0);
        assert_eq!(engine.status(&game), GameStatus::InProgress);
        assert_eq!(game.previous_level(), None);
        assert_eq!(game.current_game_question(), game.game_questions.first());
    }

    #[test]
    fn draw_never_repeats_a_question_shared_between_levels() {
        let engine = engine();
        // Every level offers the same two items plus one level-specific item.
        let shared = [question("shared-1", 0), question("shared-2", 0)];
        let pools: Vec<Vec<Question>> = (0..15)
            .map(|level| {
                let mut pool = shared.to_vec();
                pool.push(question(&format!("own-{level}"), level));
                pool
            })
            .collect();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let drawn = engine.draw_game_questions(&pools, &mut rng).unwrap();
            let ids: HashSet<&str> = drawn.iter().map(|gq| gq.question_id.as_str()).collect();
            assert_eq!(ids.len(), 15, "seed {seed} produced a duplicate");
            assert!(drawn.iter().enumerate().all(|(level, gq)| gq.level == level));
        }
    }

    #[test]
    fn draw_fails_when_a_level_is_empty() {
        let engine = engine();
        let mut pools = pools(2);
        pools[6].clear();

        let mut rng = StdRng::seed_from_u64(1);
        let err = engine.draw_game_questions(&pools, &mut rng).unwrap_err();
        assert!(matches!(err, GameError::InsufficientQuestions { level: 6 }));
    }

    #[test]
    fn draw_fails_when_only_reused_questions_remain() {
        let engine = engine();
        let only = question("only", 0);
        let pools: Vec<Vec<Question>> = (0..15).map(|_| vec![only.clone()]).collect();

        let mut rng = StdRng::seed_from_u64(1);
        let err = engine.draw_game_questions(&pools, &mut rng).unwrap_err();
        assert!(matches!(err, GameError::InsufficientQuestions { level: 1 }));
    }

    #[test]
    fn correct_answer_continues_game() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);
        let first = game.current_game_question().cloned().unwrap();

        let outcome = engine.submit_answer(&mut game, first.correct_answer_key(), now);

        assert_eq!(outcome, AnswerOutcome::Advanced { level: 1 });
        assert_eq!(game.current_level, 1);
        assert_ne!(game.current_game_question(), Some(&first));
        assert_eq!(game.previous_game_question(), Some(&first));
        assert_eq!(engine.status(&game), GameStatus::InProgress);
        assert!(!game.is_finished());
    }

    #[test]
    fn answering_every_level_wins() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);

        climb_to(&engine, &mut game, 14, now);
        let key = correct_key(&game);
        let outcome = engine.submit_answer(&mut game, key, now);

        assert_eq!(outcome, AnswerOutcome::Won { prize: 1_000_000 });
        assert_eq!(game.current_level, 15);
        assert!(game.is_finished());
        assert!(!game.is_failed);
        assert_eq!(game.prize, 1_000_000);
        assert_eq!(engine.status(&game), GameStatus::Won);
        assert!(game.current_game_question().is_none());
    }

    #[test]
    fn wrong_answer_before_checkpoint_pays_nothing() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);
        climb_to(&engine, &mut game, 4, now);

        let key = wrong_key(&game);
        let outcome = engine.submit_answer(&mut game, key, now + Duration::seconds(60));

        assert_eq!(outcome, AnswerOutcome::Failed { prize: 0 });
        assert!(game.is_failed);
        assert!(game.is_finished());
        assert_eq!(game.current_level, 4);
        assert_eq!(game.prize, 0);
        assert_eq!(engine.status(&game), GameStatus::Fail);
    }

    #[test]
    fn wrong_answer_after_checkpoint_keeps_fireproof_amount() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);
        climb_to(&engine, &mut game, 5, now);

        let key = wrong_key(&game);
        let outcome = engine.submit_answer(&mut game, key, now);

        assert_eq!(outcome, AnswerOutcome::Failed { prize: 1_000 });
        assert_eq!(game.prize, 1_000);
    }

    #[test]
    fn late_answer_times_out_without_evaluation() {
        let engine = engine();
        let created = Utc::now();
        let mut game = new_game(&engine, created);
        climb_to(&engine, &mut game, 2, created);

        let key = correct_key(&game);
        let outcome = engine.submit_answer(
            &mut game,
            key,
            created + Duration::seconds(LIMIT_SECS + 1),
        );

        assert_eq!(outcome, AnswerOutcome::TimedOut { prize: 0 });
        assert_eq!(outcome.correct(), None);
        assert_eq!(game.current_level, 2);
        assert!(game.is_failed);
        assert_eq!(engine.status(&game), GameStatus::Timeout);
    }

    #[test]
    fn answer_exactly_at_limit_is_still_evaluated() {
        let engine = engine();
        let created = Utc::now();
        let mut game = new_game(&engine, created);

        let key = correct_key(&game);
        let outcome = engine.submit_answer(&mut game, key, created + Duration::seconds(LIMIT_SECS));

        assert_eq!(outcome, AnswerOutcome::Advanced { level: 1 });
    }

    #[test]
    fn finished_game_ignores_further_answers() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);
        let key = wrong_key(&game);
        engine.submit_answer(&mut game, key, now);
        let snapshot = game.clone();

        let key = correct_key_of_level(&game, 0);
        let outcome = engine.submit_answer(&mut game, key, now + Duration::seconds(5));

        assert_eq!(
            outcome,
            AnswerOutcome::AlreadyFinished {
                status: GameStatus::Fail
            }
        );
        assert_eq!(game, snapshot);
        assert!(matches!(
            engine.cash_out(&mut game, now),
            Err(GameError::SessionAlreadyFinished)
        ));
        assert_eq!(game, snapshot);
    }

    fn correct_key_of_level(session: &GameSession, level: usize) -> AnswerKey {
        session.game_questions[level].correct_answer_key()
    }

    #[test]
    fn take_money_pays_last_completed_level() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);
        climb_to(&engine, &mut game, 5, now);

        let settlement = engine.cash_out(&mut game, now).unwrap();

        assert_eq!(
            settlement,
            Settlement {
                status: GameStatus::Money,
                prize: 1_000
            }
        );
        assert_eq!(game.prize, 1_000);
        assert!(game.is_finished());
        assert!(!game.is_failed);
        assert_eq!(engine.status(&game), GameStatus::Money);
    }

    #[test]
    fn take_money_at_start_is_refused() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);
        let snapshot = game.clone();

        let err = engine.cash_out(&mut game, now).unwrap_err();

        assert!(matches!(err, GameError::CannotCashOutYet));
        assert_eq!(game, snapshot);
    }

    #[test]
    fn take_money_at_start_allowed_by_policy_pays_zero() {
        let engine = GameEngine::new(PrizeTable::default(), Duration::seconds(LIMIT_SECS), true);
        let now = Utc::now();
        let mut game = new_game(&engine, now);

        let settlement = engine.cash_out(&mut game, now).unwrap();

        assert_eq!(settlement.prize, 0);
        assert_eq!(settlement.status, GameStatus::Money);
    }

    #[test]
    fn take_money_after_limit_becomes_timeout() {
        let engine = engine();
        let created = Utc::now();
        let mut game = new_game(&engine, created);
        climb_to(&engine, &mut game, 6, created);

        let settlement = engine
            .cash_out(&mut game, created + Duration::hours(2))
            .unwrap();

        assert_eq!(settlement.status, GameStatus::Timeout);
        assert_eq!(settlement.prize, 1_000);
        assert!(game.is_failed);
    }

    #[test]
    fn status_is_stable_for_finished_games() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);
        let key = wrong_key(&game);
        engine.submit_answer(&mut game, key, now + Duration::seconds(30));

        // Derivation only looks at stored fields, so re-reading never drifts.
        assert_eq!(engine.status(&game), GameStatus::Fail);
        assert_eq!(engine.status(&game), engine.status(&game.clone()));
    }

    #[test]
    fn status_of_manually_finished_games() {
        let engine = engine();
        let now = Utc::now();

        let mut game = new_game(&engine, now);
        game.finished_at = Some(now);
        assert_eq!(engine.status(&game), GameStatus::Money);

        game.current_level = engine.max_level() + 1;
        assert_eq!(engine.status(&game), GameStatus::Won);

        let mut game = new_game(&engine, now - Duration::hours(1) - Duration::seconds(1));
        game.finished_at = Some(now);
        game.is_failed = true;
        assert_eq!(engine.status(&game), GameStatus::Timeout);
    }

    #[test]
    fn expire_if_overdue_only_touches_late_games() {
        let engine = engine();
        let created = Utc::now();
        let mut game = new_game(&engine, created);

        assert!(engine.expire_if_overdue(&mut game, created).is_none());
        assert!(!game.is_finished());

        let settlement = engine
            .expire_if_overdue(&mut game, created + Duration::seconds(LIMIT_SECS + 1))
            .unwrap();
        assert_eq!(settlement.status, GameStatus::Timeout);
        assert!(engine
            .expire_if_overdue(&mut game, created + Duration::hours(3))
            .is_none());
    }

    #[test]
    fn level_never_decreases_and_stays_in_range() {
        let engine = engine();
        let now = Utc::now();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut game = new_game(&engine, now);
            let mut last_level = 0;

            for _ in 0..20 {
                let key = *AnswerKey::ALL.choose(&mut rng).unwrap();
                engine.submit_answer(&mut game, key, now);
                assert!(game.current_level >= last_level);
                assert!(game.current_level <= engine.max_level() + 1);
                last_level = game.current_level;
            }
        }
    }

    #[test]
    fn fifty_fifty_keeps_correct_and_one_wrong() {
        let engine = engine();
        let mut game = new_game(&engine, Utc::now());
        let correct = correct_key(&game);
        let mut rng = StdRng::seed_from_u64(3);

        let hint = engine
            .use_lifeline(&mut game, LifelineKind::FiftyFifty, &mut rng)
            .unwrap();

        let LifelineHint::FiftyFifty { keys } = hint else {
            panic!("expected fifty-fifty keys");
        };
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&correct));
        assert!(game.lifelines.fifty_fifty);
        assert_eq!(
            game.current_game_question().unwrap().keys_in_play(),
            keys
        );
        assert_eq!(game.current_level, 0);
        assert!(!game.is_finished());
    }

    #[test]
    fn lifelines_are_one_shot() {
        let engine = engine();
        let mut game = new_game(&engine, Utc::now());
        let mut rng = StdRng::seed_from_u64(3);

        engine
            .use_lifeline(&mut game, LifelineKind::FriendCall, &mut rng)
            .unwrap();
        let err = engine
            .use_lifeline(&mut game, LifelineKind::FriendCall, &mut rng)
            .unwrap_err();

        assert!(matches!(
            err,
            GameError::LifelineAlreadyUsed(LifelineKind::FriendCall)
        ));
    }

    #[test]
    fn audience_votes_sum_to_hundred_over_keys_in_play() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..20 {
            let mut game = new_game(&engine, Utc::now());
            engine
                .use_lifeline(&mut game, LifelineKind::FiftyFifty, &mut rng)
                .unwrap();
            let in_play = game.current_game_question().unwrap().keys_in_play();

            let LifelineHint::AudienceHelp { votes } = engine
                .use_lifeline(&mut game, LifelineKind::AudienceHelp, &mut rng)
                .unwrap()
            else {
                panic!("expected audience votes");
            };

            let total: u32 = votes.iter().map(|v| v.percent as u32).sum();
            assert_eq!(total, 100);
            assert!(votes.iter().all(|v| in_play.contains(&v.key)));
            let correct = correct_key(&game);
            let correct_vote = votes.iter().find(|v| v.key == correct).unwrap();
            assert!(correct_vote.percent >= 45);
        }
    }

    #[test]
    fn lifeline_on_finished_game_is_rejected() {
        let engine = engine();
        let now = Utc::now();
        let mut game = new_game(&engine, now);
        let key = wrong_key(&game);
        engine.submit_answer(&mut game, key, now);

        let mut rng = StdRng::seed_from_u64(3);
        let err = engine
            .use_lifeline(&mut game, LifelineKind::AudienceHelp, &mut rng)
            .unwrap_err();
        assert!(matches!(err, GameError::SessionAlreadyFinished));
        assert!(!game.lifelines.audience_help);
    }
}
