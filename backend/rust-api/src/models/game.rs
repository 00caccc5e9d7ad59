use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::lifeline::{LifelinesUsed, QuestionHelp};
use super::question::{AnswerKey, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    Won,
    Fail,
    Timeout,
    Money,
}

impl GameStatus {
    /// Total classification of a session. The precedence order is load-bearing:
    /// a failed session that also ran past the limit is a timeout, not a fail.
    pub fn classify(
        finished: bool,
        is_failed: bool,
        current_level: usize,
        max_level: usize,
        elapsed: Duration,
        time_limit: Duration,
    ) -> Self {
        if !finished {
            GameStatus::InProgress
        } else if !is_failed && current_level > max_level {
            GameStatus::Won
        } else if is_failed && elapsed > time_limit {
            GameStatus::Timeout
        } else if is_failed {
            GameStatus::Fail
        } else {
            GameStatus::Money
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::InProgress => "in_progress",
            GameStatus::Won => "won",
            GameStatus::Fail => "fail",
            GameStatus::Timeout => "timeout",
            GameStatus::Money => "money",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bank question bound to one level of one game, with its answers laid out
/// under the keys `a`..`d` in a per-game order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameQuestion {
    pub level: usize,
    pub question_id: String,
    pub text: String,
    pub variants: [String; 4],
    pub correct_key: AnswerKey,
    #[serde(default)]
    pub help: QuestionHelp,
}

impl GameQuestion {
    pub fn shuffled<R: Rng + ?Sized>(question: Question, rng: &mut R) -> Self {
        let mut order = [0usize, 1, 2, 3];
        order.shuffle(rng);
        Self::arranged(question, order)
    }

    /// `order[k]` is the bank answer shown under key `k`; it must be a
    /// permutation of `0..4`.
    pub fn arranged(question: Question, order: [usize; 4]) -> Self {
        debug_assert!(
            (0..4).all(|i| order.contains(&i)),
            "answer order must be a permutation"
        );

        let variants = order.map(|index| question.answers[index].clone());
        let correct_position = order.iter().position(|&index| index == 0).unwrap_or(0);

        Self {
            level: question.level,
            question_id: question.id,
            text: question.text,
            variants,
            correct_key: AnswerKey::ALL[correct_position],
            help: QuestionHelp::default(),
        }
    }

    pub fn correct_answer_key(&self) -> AnswerKey {
        self.correct_key
    }

    pub fn answer_correct(&self, key: AnswerKey) -> bool {
        key == self.correct_key
    }

    pub fn variant(&self, key: AnswerKey) -> &str {
        &self.variants[key.index()]
    }

    /// Keys a lifeline may still point at: all four, or the pair left by
    /// fifty-fifty.
    pub fn keys_in_play(&self) -> Vec<AnswerKey> {
        match &self.help.fifty_fifty {
            Some(keys) => keys.clone(),
            None => AnswerKey::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub game_questions: Vec<GameQuestion>,
    pub current_level: usize,
    pub is_failed: bool,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "bson_datetime_as_chrono::optional")]
    pub finished_at: Option<DateTime<Utc>>,
    pub prize: i64,
    #[serde(default)]
    pub lifelines: LifelinesUsed,
}

impl GameSession {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn level_count(&self) -> usize {
        self.game_questions.len()
    }

    pub fn current_game_question(&self) -> Option<&GameQuestion> {
        self.game_questions.get(self.current_level)
    }

    pub(crate) fn current_game_question_mut(&mut self) -> Option<&mut GameQuestion> {
        self.game_questions.get_mut(self.current_level)
    }

    /// Last completed level, `None` before the first correct answer.
    pub fn previous_level(&self) -> Option<usize> {
        self.current_level.checked_sub(1)
    }

    pub fn previous_game_question(&self) -> Option<&GameQuestion> {
        self.previous_level()
            .and_then(|level| self.game_questions.get(level))
    }

    /// Time spent in the game: up to `finished_at` once finished, else up to `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.finished_at.unwrap_or(now) - self.created_at
    }
}

// ---------------------------------------------------------------------------
// API views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerVariant {
    pub key: AnswerKey,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub level: usize,
    pub text: String,
    pub answers: Vec<AnswerVariant>,
    pub help: QuestionHelp,
    pub prize_for_level: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameView {
    pub id: String,
    pub user_id: String,
    pub status: GameStatus,
    pub current_level: usize,
    pub prize: i64,
    pub is_failed: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub lifelines: LifelinesUsed,
    pub current_question: Option<QuestionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: String,
    pub status: GameStatus,
    pub current_level: usize,
    pub prize: i64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub game_id: String,
    pub status: GameStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, max = 1, message = "answer must be a single letter key"))]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub status: GameStatus,
    pub correct: Option<bool>,
    pub already_finished: bool,
    pub current_level: usize,
    pub prize: i64,
    pub correct_answer: Option<AnswerKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeMoneyResponse {
    pub status: GameStatus,
    pub prize: i64,
    pub balance: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct StatusQuery {
    #[serde(default)]
    pub finalize: bool,
}

// Stores chrono timestamps as BSON dates so Mongo can sort and filter on them.
mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bson::DateTime::from_millis(date.timestamp_millis()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        to_chrono(bson_dt).map_err(D::Error::custom)
    }

    fn to_chrono(bson_dt: bson::DateTime) -> Result<DateTime<Utc>, String> {
        DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
            .ok_or_else(|| format!("timestamp {} out of range", bson_dt.timestamp_millis()))
    }

    pub mod optional {
        use super::*;

        pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<bson::DateTime>::deserialize(deserializer)?
                .map(to_chrono)
                .transpose()
                .map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson::{self, Bson};

    fn question() -> Question {
        Question::new(
            "q-1",
            3,
            "2 + 2 = ?",
            [
                "4".to_string(),
                "3".to_string(),
                "5".to_string(),
                "22".to_string(),
            ],
        )
    }

    #[test]
    fn arranged_question_tracks_correct_key() {
        let gq = GameQuestion::arranged(question(), [2, 3, 0, 1]);

        assert_eq!(gq.level, 3);
        assert_eq!(gq.correct_answer_key(), AnswerKey::C);
        assert_eq!(gq.variant(AnswerKey::C), "4");
        assert_eq!(gq.variant(AnswerKey::A), "5");
        assert!(gq.answer_correct(AnswerKey::C));
        assert!(!gq.answer_correct(AnswerKey::A));
    }

    #[test]
    fn shuffled_question_keeps_all_answers() {
        let mut rng = rand::rng();
        let gq = GameQuestion::shuffled(question(), &mut rng);

        let mut texts: Vec<&str> = gq.variants.iter().map(String::as_str).collect();
        texts.sort_unstable();
        assert_eq!(texts, vec!["22", "3", "4", "5"]);
        assert_eq!(gq.variant(gq.correct_answer_key()), "4");
    }

    #[test]
    fn classification_precedence() {
        let limit = Duration::seconds(60);
        let short = Duration::seconds(10);
        let long = Duration::seconds(61);

        assert_eq!(
            GameStatus::classify(false, true, 3, 14, long, limit),
            GameStatus::InProgress
        );
        assert_eq!(
            GameStatus::classify(true, false, 15, 14, long, limit),
            GameStatus::Won
        );
        assert_eq!(
            GameStatus::classify(true, true, 3, 14, short, limit),
            GameStatus::Fail
        );
        assert_eq!(
            GameStatus::classify(true, true, 3, 14, long, limit),
            GameStatus::Timeout
        );
        assert_eq!(
            GameStatus::classify(true, false, 3, 14, long, limit),
            GameStatus::Money
        );
        assert_eq!(
            GameStatus::classify(true, true, 3, 14, limit, limit),
            GameStatus::Fail
        );
    }

    #[test]
    fn session_timestamps_are_stored_as_bson_dates() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut session = GameSession {
            id: "game-1".to_string(),
            user_id: "player-1".to_string(),
            game_questions: vec![GameQuestion::arranged(question(), [0, 1, 2, 3])],
            current_level: 0,
            is_failed: false,
            created_at,
            finished_at: None,
            prize: 0,
            lifelines: LifelinesUsed::default(),
        };

        let document = bson::to_document(&session).unwrap();
        assert!(matches!(document.get("created_at"), Some(Bson::DateTime(_))));
        assert_eq!(document.get("finished_at"), Some(&Bson::Null));
        assert_eq!(bson::from_document::<GameSession>(document).unwrap(), session);

        session.finished_at = Some(created_at + Duration::seconds(90));
        let document = bson::to_document(&session).unwrap();
        assert!(matches!(document.get("finished_at"), Some(Bson::DateTime(_))));
        let restored: GameSession = bson::from_document(document).unwrap();
        assert_eq!(restored.elapsed(Utc::now()), Duration::seconds(90));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&GameStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(GameStatus::Money.to_string(), "money");
    }
}
