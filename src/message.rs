//! Conversation messages exchanged between the user and the assistant

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The speaking user
    User,
    /// The dialogue assistant
    Assistant,
}

/// One entry in the ordered conversation list
///
/// Created, mutated, and removed exclusively by the recording controller;
/// observers only ever receive snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationMessage {
    /// Stable message identity
    pub id: Uuid,

    /// Message author
    pub role: Role,

    /// Message text in the practice language
    pub content: String,

    /// Optional translation of `content`
    pub translation: Option<String>,

    /// Set when this message replaced an expected result after a failure
    pub error: bool,

    /// Set on the placeholder shown while an utterance is transcribed
    pub processing: bool,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    /// A finished user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None, false, false)
    }

    /// An assistant reply with its translation
    #[must_use]
    pub fn assistant(content: impl Into<String>, translation: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            content.into(),
            Some(translation.into()),
            false,
            false,
        )
    }

    /// The transient placeholder inserted the instant capture stops
    #[must_use]
    pub fn placeholder(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None, false, true)
    }

    /// The apology appended when a turn fails
    #[must_use]
    pub fn apology(content: impl Into<String>, translation: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            content.into(),
            Some(translation.into()),
            true,
            false,
        )
    }

    fn new(
        role: Role,
        content: String,
        translation: Option<String>,
        error: bool,
        processing: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            translation,
            error,
            processing,
            created_at: Utc::now(),
        }
    }
}
