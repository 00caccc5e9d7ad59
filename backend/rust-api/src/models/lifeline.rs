use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::question::AnswerKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifelineKind {
    FiftyFifty,
    AudienceHelp,
    FriendCall,
}

impl LifelineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LifelineKind::FiftyFifty => "fifty_fifty",
            LifelineKind::AudienceHelp => "audience_help",
            LifelineKind::FriendCall => "friend_call",
        }
    }
}

impl fmt::Display for LifelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-shot flags, one per lifeline, for a whole game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifelinesUsed {
    pub fifty_fifty: bool,
    pub audience_help: bool,
    pub friend_call: bool,
}

impl LifelinesUsed {
    pub fn is_used(&self, kind: LifelineKind) -> bool {
        match kind {
            LifelineKind::FiftyFifty => self.fifty_fifty,
            LifelineKind::AudienceHelp => self.audience_help,
            LifelineKind::FriendCall => self.friend_call,
        }
    }

    pub fn mark_used(&mut self, kind: LifelineKind) {
        match kind {
            LifelineKind::FiftyFifty => self.fifty_fifty = true,
            LifelineKind::AudienceHelp => self.audience_help = true,
            LifelineKind::FriendCall => self.friend_call = true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceVote {
    pub key: AnswerKey,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendCall {
    pub key: AnswerKey,
    pub message: String,
}

/// Lifeline results shown for a single question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionHelp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifty_fifty: Option<Vec<AnswerKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience_help: Option<Vec<AudienceVote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend_call: Option<FriendCall>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifelineHint {
    FiftyFifty { keys: Vec<AnswerKey> },
    AudienceHelp { votes: Vec<AudienceVote> },
    FriendCall(FriendCall),
}

#[derive(Debug, Deserialize, Validate)]
pub struct UseLifelineRequest {
    #[validate(length(min = 1, max = 32, message = "help_type must not be empty"))]
    pub help_type: String,
}

impl UseLifelineRequest {
    pub fn kind(&self) -> Option<LifelineKind> {
        match self.help_type.trim() {
            "fifty_fifty" => Some(LifelineKind::FiftyFifty),
            "audience_help" => Some(LifelineKind::AudienceHelp),
            "friend_call" => Some(LifelineKind::FriendCall),
            _ => None,
        }
    }
}
