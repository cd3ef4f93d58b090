//! Saved delivery information.
//!
//! The owner is always the session user; the body never names one.

use axum::{extract::State, http::StatusCode};

use oxytoxin_core::UserId;

use crate::db::DeliveryRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{DeliveryInfo, DeliveryInput, DeliveryWithUser};
use crate::response::{ApiJson, ApiPath, ApiResponse};
use crate::state::AppState;

fn not_found() -> AppError {
    AppError::NotFound("No delivery information found".to_string())
}

/// Create or replace the caller's delivery information.
///
/// POST /api/delivery/save (201 when created, 200 when updated)
pub async fn save(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(input): ApiJson<DeliveryInput>,
) -> Result<ApiResponse<DeliveryInfo>> {
    let input = input.normalize().map_err(|missing| {
        AppError::BadRequest(format!("Missing required fields: {}", missing.join(", ")))
    })?;

    let (info, created) = DeliveryRepository::new(state.pool())
        .save(user.id, &user.email, &input)
        .await?;

    let response = if created {
        ApiResponse::ok(info)
            .with_status(StatusCode::CREATED)
            .with_message("Delivery information saved successfully")
    } else {
        ApiResponse::ok(info).with_message("Delivery information updated successfully")
    };
    Ok(response)
}

/// GET /api/delivery/get
pub async fn get(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<ApiResponse<DeliveryInfo>> {
    let info = DeliveryRepository::new(state.pool())
        .get_for_user(user.id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(info))
}

/// GET /api/delivery/admin/all
pub async fn admin_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<ApiResponse<Vec<DeliveryWithUser>>> {
    let records = DeliveryRepository::new(state.pool()).list_with_users().await?;
    Ok(ApiResponse::ok(records))
}

/// GET /api/delivery/admin/user/{userId}
pub async fn admin_for_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(user_id): ApiPath<UserId>,
) -> Result<ApiResponse<DeliveryInfo>> {
    let info = DeliveryRepository::new(state.pool())
        .get_for_user(user_id)
        .await?
        .ok_or_else(not_found)?;
    Ok(ApiResponse::ok(info))
}
