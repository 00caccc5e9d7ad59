use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A bank question. By storage convention `answers[0]` is the correct one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub level: usize,
    pub text: String,
    pub answers: [String; 4],
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        level: usize,
        text: impl Into<String>,
        answers: [String; 4],
    ) -> Self {
        Self {
            id: id.into(),
            level,
            text: text.into(),
            answers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKey {
    A,
    B,
    C,
    D,
}

impl AnswerKey {
    pub const ALL: [AnswerKey; 4] = [AnswerKey::A, AnswerKey::B, AnswerKey::C, AnswerKey::D];

    pub fn index(self) -> usize {
        match self {
            AnswerKey::A => 0,
            AnswerKey::B => 1,
            AnswerKey::C => 2,
            AnswerKey::D => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerKey::A => "a",
            AnswerKey::B => "b",
            AnswerKey::C => "c",
            AnswerKey::D => "d",
        }
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAnswerKey(pub String);

impl fmt::Display for InvalidAnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown answer key '{}', expected one of a, b, c, d", self.0)
    }
}

impl std::error::Error for InvalidAnswerKey {}

impl FromStr for AnswerKey {
    type Err = InvalidAnswerKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(AnswerKey::A),
            "b" => Ok(AnswerKey::B),
            "c" => Ok(AnswerKey::C),
            "d" => Ok(AnswerKey::D),
            _ => Err(InvalidAnswerKey(s.to_string())),
        }
    }
}
