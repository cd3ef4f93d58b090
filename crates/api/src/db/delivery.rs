//! Delivery information repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use oxytoxin_core::{DeliveryInfoId, Email, UserId};

use super::RepositoryError;
use crate::models::delivery::{DeliveryInfo, DeliveryInput, DeliveryWithUser};

const DELIVERY_COLUMNS: &str = "d.id, d.user_id, d.user_email, d.full_name, d.phone_number, \
     d.address, d.city, d.state, d.postal_code, d.landmark, d.created_at, d.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: i32,
    user_id: i32,
    user_email: String,
    full_name: String,
    phone_number: String,
    address: String,
    city: String,
    state: String,
    postal_code: Option<String>,
    landmark: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRow> for DeliveryInfo {
    type Error = RepositoryError;

    fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
        let user_email = Email::parse(&row.user_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: DeliveryInfoId::new(row.id),
            user_id: UserId::new(row.user_id),
            user_email,
            full_name: row.full_name,
            phone_number: row.phone_number,
            address: row.address,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            landmark: row.landmark,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Upsert result row: the record plus whether it was newly inserted.
#[derive(Debug, sqlx::FromRow)]
struct SavedRow {
    #[sqlx(flatten)]
    info: DeliveryRow,
    inserted: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct WithUserRow {
    #[sqlx(flatten)]
    info: DeliveryRow,
    user_name: String,
}

/// Repository for delivery information.
pub struct DeliveryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DeliveryRepository<'a> {
    /// Create a new delivery repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create or replace a user's delivery information.
    ///
    /// Returns the record and `true` when it was created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(
        &self,
        user_id: UserId,
        user_email: &Email,
        input: &DeliveryInput,
    ) -> Result<(DeliveryInfo, bool), RepositoryError> {
        // xmax is zero only for rows created by this statement
        let row = sqlx::query_as::<_, SavedRow>(&format!(
            r"
            INSERT INTO delivery_info AS d (
                user_id, user_email, full_name, phone_number, address, city, state,
                postal_code, landmark
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE
            SET user_email = EXCLUDED.user_email,
                full_name = EXCLUDED.full_name,
                phone_number = EXCLUDED.phone_number,
                address = EXCLUDED.address,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                postal_code = EXCLUDED.postal_code,
                landmark = EXCLUDED.landmark,
                updated_at = NOW()
            RETURNING {DELIVERY_COLUMNS}, (d.xmax = 0) AS inserted
            "
        ))
        .bind(user_id)
        .bind(user_email)
        .bind(&input.full_name)
        .bind(&input.phone_number)
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.landmark)
        .fetch_one(self.pool)
        .await?;

        Ok((row.info.try_into()?, row.inserted))
    }

    /// Get a user's delivery information.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<DeliveryInfo>, RepositoryError> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM delivery_info d WHERE d.user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(DeliveryInfo::try_from).transpose()
    }

    /// Every saved record with the owner's name, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_users(&self) -> Result<Vec<DeliveryWithUser>, RepositoryError> {
        let rows = sqlx::query_as::<_, WithUserRow>(&format!(
            r"
            SELECT {DELIVERY_COLUMNS}, u.name AS user_name
            FROM delivery_info d
            JOIN users u ON u.id = d.user_id
            ORDER BY d.updated_at DESC
            "
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DeliveryWithUser {
                    info: row.info.try_into()?,
                    user_name: row.user_name,
                })
            })
            .collect()
    }
}
