//! Saved delivery information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oxytoxin_core::{DeliveryInfoId, Email, UserId};

/// A user's saved delivery address. There is at most one per user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub id: DeliveryInfoId,
    pub user_id: UserId,
    pub user_email: Email,
    pub full_name: String,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: Option<String>,
    pub landmark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Delivery info joined with the owning account, for admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryWithUser {
    #[serde(flatten)]
    pub info: DeliveryInfo,
    pub user_name: String,
}

/// Body of `POST /api/delivery/save`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInput {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub postal_code: Option<String>,
    pub landmark: Option<String>,
}

impl DeliveryInput {
    /// Trim every field and check the required ones.
    ///
    /// # Errors
    ///
    /// Returns the names of the required fields that are blank.
    pub fn normalize(self) -> Result<Self, Vec<&'static str>> {
        let trim_opt = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        let normalized = Self {
            full_name: self.full_name.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: trim_opt(self.postal_code),
            landmark: trim_opt(self.landmark),
        };

        let missing: Vec<&'static str> = [
            ("fullName", &normalized.full_name),
            ("phoneNumber", &normalized.phone_number),
            ("address", &normalized.address),
            ("city", &normalized.city),
            ("state", &normalized.state),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(normalized)
        } else {
            Err(missing)
        }
    }
}

/// Copy of the delivery info stored on an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySnapshot {
    pub full_name: String,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
}

impl From<&DeliveryInfo> for DeliverySnapshot {
    fn from(info: &DeliveryInfo) -> Self {
        Self {
            full_name: info.full_name.clone(),
            phone_number: info.phone_number.clone(),
            address: info.address.clone(),
            city: info.city.clone(),
            state: info.state.clone(),
            postal_code: info.postal_code.clone(),
            landmark: info.landmark.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_reports_missing_fields() {
        let input: DeliveryInput = serde_json::from_value(serde_json::json!({
            "fullName": "Jane Doe",
            "phoneNumber": "  ",
            "address": "12 Main St"
        }))
        .unwrap();
        assert_eq!(
            input.normalize().unwrap_err(),
            vec!["phoneNumber", "city", "state"]
        );
    }

    #[test]
    fn test_normalize_trims_optionals() {
        let input = DeliveryInput {
            full_name: " Jane Doe ".into(),
            phone_number: "555-0100".into(),
            address: "12 Main St".into(),
            city: "Lagos".into(),
            state: "LA".into(),
            postal_code: Some("  ".into()),
            landmark: Some(" Near the mall ".into()),
        };
        let input = input.normalize().unwrap();
        assert_eq!(input.full_name, "Jane Doe");
        assert!(input.postal_code.is_none());
        assert_eq!(input.landmark.as_deref(), Some("Near the mall"));
    }
}
