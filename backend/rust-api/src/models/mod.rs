pub mod game;
pub mod lifeline;
pub mod prize;
pub mod question;
pub mod user;

pub use game::{GameQuestion, GameSession, GameStatus};
pub use lifeline::{LifelineHint, LifelineKind};
pub use prize::PrizeTable;
pub use question::{AnswerKey, Question};
pub use user::Player;
