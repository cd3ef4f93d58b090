//! Support chat between a customer and the store admins.
//!
//! Customers always act on their own conversation; admins address one by the
//! customer's email.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use oxytoxin_core::{ConversationStatus, Email, MessageSender};

use crate::db::ConversationRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{Conversation, ConversationSummary, ConversationThread};
use crate::response::{ApiJson, ApiQuery, ApiResponse};
use crate::state::AppState;

/// Longest accepted message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct SendMessage {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReply {
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRead {
    pub sender: MessageSender,
    /// Admins only: whose conversation to update.
    pub user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseConversation {
    #[serde(default)]
    pub user_email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    /// `open`, `closed`, or `all` (default).
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

/// Trim a message and check its length.
fn message_body(raw: &str) -> Result<&str> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Message is required".to_string()));
    }
    if body.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Message cannot exceed {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(body)
}

fn parse_status(raw: Option<&str>) -> Result<Option<ConversationStatus>> {
    match raw.map(str::trim) {
        None | Some("" | "all") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(AppError::BadRequest),
    }
}

fn parse_email(raw: &str) -> Result<Email> {
    if raw.trim().is_empty() {
        return Err(AppError::BadRequest("User email is required".to_string()));
    }
    Email::parse(raw).map_err(|_| AppError::BadRequest("Invalid email address".to_string()))
}

fn conversation_not_found() -> AppError {
    AppError::NotFound("Conversation not found".to_string())
}

async fn thread(
    repo: &ConversationRepository<'_>,
    conversation: Conversation,
) -> Result<ConversationThread> {
    let messages = repo.messages(conversation.id).await?;
    Ok(ConversationThread {
        conversation,
        messages,
    })
}

async fn find_by_email(repo: &ConversationRepository<'_>, raw: &str) -> Result<Conversation> {
    let email = parse_email(raw)?;
    repo.find_by_email(&email)
        .await?
        .ok_or_else(conversation_not_found)
}

/// The caller's conversation, created with a welcome message if new.
///
/// GET /api/messages/conversation
pub async fn conversation(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<ConversationThread>> {
    let repo = ConversationRepository::new(state.pool());
    let conversation = repo.get_or_create(user.id, &user.email, &user.name).await?;
    Ok(ApiResponse::ok(thread(&repo, conversation).await?))
}

/// Post a message from the caller. Reopens a closed conversation.
///
/// POST /api/messages/send
pub async fn send(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(form): ApiJson<SendMessage>,
) -> Result<ApiResponse<ConversationThread>> {
    let body = message_body(&form.message)?;

    let repo = ConversationRepository::new(state.pool());
    let conversation = repo.get_or_create(user.id, &user.email, &user.name).await?;
    repo.add_message(conversation.id, MessageSender::User, body)
        .await?;

    let conversation = repo
        .find_by_user(user.id)
        .await?
        .ok_or_else(conversation_not_found)?;
    tracing::debug!(conversation_id = %conversation.id, "Customer message received");

    Ok(ApiResponse::ok(thread(&repo, conversation).await?))
}

/// Unread admin messages for the caller.
///
/// GET /api/messages/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<UnreadCount>> {
    let count = ConversationRepository::new(state.pool())
        .unread_count(user.id, MessageSender::Admin)
        .await?;
    Ok(ApiResponse::ok(UnreadCount { count }))
}

/// Mark messages from `sender` as read.
///
/// Customers may only mark admin messages in their own conversation. Admins
/// may name a customer's conversation with `userEmail`.
///
/// PATCH /api/messages/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(form): ApiJson<MarkRead>,
) -> Result<ApiResponse<ConversationThread>> {
    let repo = ConversationRepository::new(state.pool());

    let conversation = match form.user_email.as_deref().filter(|e| !e.trim().is_empty()) {
        Some(email) if user.is_admin => find_by_email(&repo, email).await?,
        Some(_) => {
            return Err(AppError::Forbidden(
                "Only admins can update another user's conversation".to_string(),
            ));
        }
        None => {
            if !user.is_admin && form.sender != MessageSender::Admin {
                return Err(AppError::Forbidden(
                    "You can only mark admin messages as read".to_string(),
                ));
            }
            repo.find_by_user(user.id)
                .await?
                .ok_or_else(conversation_not_found)?
        }
    };

    let updated = repo.mark_read(conversation.id, form.sender).await?;
    tracing::debug!(conversation_id = %conversation.id, updated, "Messages marked read");

    Ok(ApiResponse::ok(thread(&repo, conversation).await?))
}

// =============================================================================
// Admin
// =============================================================================

/// Reply to a customer.
///
/// POST /api/messages/admin/reply
pub async fn admin_reply(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(form): ApiJson<AdminReply>,
) -> Result<ApiResponse<ConversationThread>> {
    let body = message_body(&form.message)?;

    let repo = ConversationRepository::new(state.pool());
    let conversation = find_by_email(&repo, &form.user_email).await?;
    repo.add_message(conversation.id, MessageSender::Admin, body)
        .await?;
    tracing::info!(conversation_id = %conversation.id, admin_id = %admin.id, "Admin replied");

    let conversation = find_by_email(&repo, &form.user_email).await?;
    Ok(ApiResponse::ok(thread(&repo, conversation).await?))
}

/// The inbox: latest conversations with unread counts.
///
/// GET /api/messages/admin/conversations?status=open|closed|all
pub async fn admin_conversations(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(query): ApiQuery<InboxQuery>,
) -> Result<ApiResponse<Vec<ConversationSummary>>> {
    let status = parse_status(query.status.as_deref())?;
    let summaries = ConversationRepository::new(state.pool())
        .summaries(status)
        .await?;
    Ok(ApiResponse::ok(summaries))
}

/// PATCH /api/messages/admin/close
pub async fn admin_close(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(form): ApiJson<CloseConversation>,
) -> Result<ApiResponse<Conversation>> {
    let repo = ConversationRepository::new(state.pool());
    let conversation = find_by_email(&repo, &form.user_email).await?;
    let conversation = repo
        .set_status(conversation.id, ConversationStatus::Closed)
        .await?;
    tracing::info!(conversation_id = %conversation.id, admin_id = %admin.id, "Conversation closed");

    Ok(ApiResponse::ok(conversation).with_message("Conversation closed"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_trims() {
        assert_eq!(message_body("  hello  ").unwrap(), "hello");
    }

    #[test]
    fn test_message_body_rejects_blank_and_long() {
        assert!(message_body("   ").is_err());
        assert!(message_body(&"a".repeat(MAX_MESSAGE_LENGTH)).is_ok());
        assert!(message_body(&"a".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_message_length_counts_characters() {
        // Multi-byte characters count once each
        let emoji = "👋".repeat(MAX_MESSAGE_LENGTH);
        assert!(message_body(&emoji).is_ok());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("all")).unwrap(), None);
        assert_eq!(
            parse_status(Some("closed")).unwrap(),
            Some(ConversationStatus::Closed)
        );
        assert!(parse_status(Some("archived")).is_err());
    }

    #[test]
    fn test_mark_read_sender_is_lowercase() {
        let form: MarkRead =
            serde_json::from_value(serde_json::json!({ "sender": "admin" })).unwrap();
        assert_eq!(form.sender, MessageSender::Admin);
        assert!(form.user_email.is_none());
    }
}
