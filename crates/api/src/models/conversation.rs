//! Support chat types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use oxytoxin_core::{ConversationId, ConversationStatus, Email, MessageId, MessageSender, UserId};

/// A user's support conversation. Each user has at most one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub user_email: Email,
    pub user_name: String,
    pub status: ConversationStatus,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: MessageSender,
    #[serde(rename = "message")]
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Conversation plus its messages, oldest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationThread {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Admin inbox row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Messages from the user the admin has not read yet.
    pub unread_count: i64,
    pub last_message: Option<String>,
}
