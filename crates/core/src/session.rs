//! Session collaborator interface.
//!
//! Chat history persistence is an external concern; the core reads and
//! writes it only through this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::turn::ChatTurn;

/// One completed question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTurn {
    pub question: String,
    pub answer: String,

    /// Detected intent / task classification for the exchange, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl SessionTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            intent: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Expand this exchange into model-visible chat turns.
    pub fn as_chat_turns(&self) -> [ChatTurn; 2] {
        [
            ChatTurn::user(&self.question),
            ChatTurn::assistant(&self.answer),
        ]
    }
}

/// The session store interface: ordered history per session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Ordered prior turns for a session, oldest first.
    async fn get_history(&self, session_id: &str) -> Result<Vec<SessionTurn>, SessionError>;

    /// Append one exchange to a session's history.
    async fn append_turn(&self, session_id: &str, turn: SessionTurn) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::TurnRole;

    #[test]
    fn session_turn_expands_to_chat_turns() {
        let turn = SessionTurn::new("what is rust?", "a systems language");
        let [question, answer] = turn.as_chat_turns();
        assert_eq!(question.role, TurnRole::User);
        assert_eq!(answer.role, TurnRole::Assistant);
        assert_eq!(answer.content, "a systems language");
    }

    #[test]
    fn intent_is_optional_on_wire() {
        let turn = SessionTurn::new("q", "a");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(!json.contains("intent"));

        let tagged = SessionTurn::new("q", "a").with_intent("chat");
        let json = serde_json::to_string(&tagged).unwrap();
        assert!(json.contains(r#""intent":"chat""#));
    }
}
