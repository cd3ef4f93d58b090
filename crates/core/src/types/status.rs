//! Status enums for orders and support conversations.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// Orders are created `pending` and move forward once payment is confirmed.
/// `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    /// Payment confirmed.
    Successful,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Successful,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether an order in this status may be moved to `next`.
    ///
    /// Re-applying the current status is always allowed so that retried
    /// updates are harmless.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self as u8 == next as u8 {
            return true;
        }
        match self {
            Self::Pending => true,
            Self::Successful => matches!(
                next,
                Self::Processing | Self::Shipped | Self::Delivered | Self::Cancelled
            ),
            Self::Processing => {
                matches!(next, Self::Shipped | Self::Delivered | Self::Cancelled)
            }
            Self::Shipped => matches!(next, Self::Delivered),
            Self::Delivered | Self::Cancelled => false,
        }
    }

    /// Whether moving from this status to `next` marks the order as paid.
    ///
    /// Stock is decremented and confirmation emails are sent only on this edge.
    #[must_use]
    pub const fn confirms_payment(self, next: Self) -> bool {
        matches!(self, Self::Pending)
            && matches!(
                next,
                Self::Successful | Self::Processing | Self::Shipped | Self::Delivered
            )
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// The lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Successful => "successful",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Whether a support conversation is awaiting attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "conversation_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Open,
    Closed,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("invalid conversation status: {s}")),
        }
    }
}

/// Author of a support chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "message_sender", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    User,
    Admin,
}

impl std::fmt::Display for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for MessageSender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid message sender: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_moves_anywhere() {
        for next in OrderStatus::ALL {
            assert!(OrderStatus::Pending.can_transition_to(next));
        }
    }

    #[test]
    fn test_forward_transitions() {
        use OrderStatus::{Cancelled, Delivered, Pending, Processing, Shipped, Successful};
        assert!(Successful.can_transition_to(Processing));
        assert!(Successful.can_transition_to(Cancelled));
        assert!(!Successful.can_transition_to(Pending));
        assert!(Processing.can_transition_to(Shipped));
        assert!(!Processing.can_transition_to(Successful));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Cancelled));
    }

    #[test]
    fn test_confirms_payment_only_from_pending() {
        use OrderStatus::{Cancelled, Delivered, Pending, Processing, Successful};
        assert!(Pending.confirms_payment(Successful));
        assert!(Pending.confirms_payment(Delivered));
        assert!(!Pending.confirms_payment(Pending));
        assert!(!Pending.confirms_payment(Cancelled));
        assert!(!Successful.confirms_payment(Processing));
    }

    #[test]
    fn test_terminal_states() {
        for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(status.is_terminal());
            for next in OrderStatus::ALL {
                assert_eq!(status.can_transition_to(next), next == status);
            }
        }
    }

    #[test]
    fn test_order_status_parse_and_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("paid".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Successful).unwrap(),
            "\"successful\""
        );
        assert_eq!(
            serde_json::from_str::<MessageSender>("\"admin\"").unwrap(),
            MessageSender::Admin
        );
        assert_eq!(
            "closed".parse::<ConversationStatus>().unwrap(),
            ConversationStatus::Closed
        );
    }
}
