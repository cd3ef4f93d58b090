//! Support chat repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use oxytoxin_core::{
    ConversationId, ConversationStatus, Email, MessageId, MessageSender, UserId,
};

use super::RepositoryError;
use crate::models::conversation::{Conversation, ConversationSummary, Message};

/// First message in every new conversation.
pub const WELCOME_MESSAGE: &str = "Welcome to Oxytoxin! We're here to help. If you have any \
     questions about your orders, products, or need assistance, feel free to message us anytime!";

/// Admin inbox size.
const SUMMARY_LIMIT: i64 = 100;

const CONVERSATION_COLUMNS: &str = "c.id, c.user_id, c.user_email, c.user_name, c.status, \
     c.last_message_at, c.created_at, c.updated_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender, body, read, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: i32,
    user_id: i32,
    user_email: String,
    user_name: String,
    status: ConversationStatus,
    last_message_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = RepositoryError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        let user_email = Email::parse(&row.user_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: ConversationId::new(row.id),
            user_id: UserId::new(row.user_id),
            user_email,
            user_name: row.user_name,
            status: row.status,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i32,
    conversation_id: i32,
    sender: MessageSender,
    body: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: MessageId::new(row.id),
            conversation_id: ConversationId::new(row.conversation_id),
            sender: row.sender,
            body: row.body,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    conversation: ConversationRow,
    unread_count: i64,
    last_message: Option<String>,
}

/// Repository for conversations and their messages.
pub struct ConversationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ConversationRepository<'a> {
    /// Create a new conversation repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's conversation, creating it with the welcome message
    /// when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(
        &self,
        user_id: UserId,
        user_email: &Email,
        user_name: &str,
    ) -> Result<Conversation, RepositoryError> {
        if let Some(existing) = self.find_by_user(user_id).await? {
            return Ok(existing);
        }

        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, ConversationRow>(&format!(
            r"
            INSERT INTO conversations AS c (user_id, user_email, user_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING {CONVERSATION_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(user_email)
        .bind(user_name)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(created) = created else {
            // Lost a race with a concurrent request
            tx.rollback().await?;
            return self
                .find_by_user(user_id)
                .await?
                .ok_or(RepositoryError::NotFound);
        };

        sqlx::query("INSERT INTO messages (conversation_id, sender, body) VALUES ($1, $2, $3)")
            .bind(created.id)
            .bind(MessageSender::Admin)
            .bind(WELCOME_MESSAGE)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        created.try_into()
    }

    /// Find the conversation belonging to a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Conversation::try_from).transpose()
    }

    /// Find a conversation by the customer's current account email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations c
            JOIN users u ON u.id = c.user_id
            WHERE u.email = $1
            "
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(Conversation::try_from).transpose()
    }

    /// Messages in a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages(&self, id: ConversationId) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = $1 ORDER BY created_at, id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    /// Append a message and bump `last_message_at`.
    ///
    /// A message from the user reopens a closed conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_message(
        &self,
        id: ConversationId,
        sender: MessageSender,
        body: &str,
    ) -> Result<Message, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r"
            INSERT INTO messages (conversation_id, sender, body)
            VALUES ($1, $2, $3)
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(sender)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE conversations
            SET last_message_at = $2,
                status = CASE WHEN $3 THEN 'open'::conversation_status ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(row.created_at)
        .bind(sender == MessageSender::User)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Number of unread messages from `sender` in the user's conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(
        &self,
        user_id: UserId,
        sender: MessageSender,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE c.user_id = $1 AND m.sender = $2 AND NOT m.read
            ",
        )
        .bind(user_id)
        .bind(sender)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Mark every message from `sender` read. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_read(
        &self,
        id: ConversationId,
        sender: MessageSender,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE messages SET read = TRUE WHERE conversation_id = $1 AND sender = $2 AND NOT read",
        )
        .bind(id)
        .bind(sender)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Set the conversation status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation does not exist.
    pub async fn set_status(
        &self,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, RepositoryError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            r"
            UPDATE conversations AS c
            SET status = $2, updated_at = NOW()
            WHERE c.id = $1
            RETURNING {CONVERSATION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Admin inbox: latest conversations by last message, optionally filtered
    /// by status, with unread user-message counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summaries(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, SummaryRow>(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS},
                (
                    SELECT COUNT(*) FROM messages m
                    WHERE m.conversation_id = c.id AND m.sender = 'user' AND NOT m.read
                ) AS unread_count,
                (
                    SELECT m.body FROM messages m
                    WHERE m.conversation_id = c.id
                    ORDER BY m.created_at DESC, m.id DESC
                    LIMIT 1
                ) AS last_message
            FROM conversations c
            WHERE $1::conversation_status IS NULL OR c.status = $1
            ORDER BY c.last_message_at DESC
            LIMIT $2
            "
        ))
        .bind(status)
        .bind(SUMMARY_LIMIT)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ConversationSummary {
                    conversation: row.conversation.try_into()?,
                    unread_count: row.unread_count,
                    last_message: row.last_message,
                })
            })
            .collect()
    }
}
