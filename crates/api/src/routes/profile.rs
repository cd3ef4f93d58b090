//! The caller's own account: profile fields, password, picture.

use axum::extract::{Multipart, State};
use serde::Deserialize;

use crate::db::UserRepository;
use crate::db::users::ProfileUpdate;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::User;
use crate::response::{ApiJson, ApiResponse};
use crate::routes::upload::UploadForm;
use crate::services::AuthService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl UpdateProfile {
    fn into_update(self) -> Result<ProfileUpdate> {
        let name = match self.name.map(|n| n.trim().to_string()) {
            Some(n) if n.is_empty() => {
                return Err(AppError::BadRequest("Name cannot be blank".to_string()));
            }
            other => other,
        };
        Ok(ProfileUpdate {
            name,
            address: self.address.map(|a| a.trim().to_string()),
            phone: self.phone.map(|p| p.trim().to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    pub confirm_password: Option<String>,
}

/// GET /api/public/profile
pub async fn show(RequireUser(user): RequireUser) -> ApiResponse<User> {
    ApiResponse::ok(user)
}

/// PATCH /api/public/profile
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(form): ApiJson<UpdateProfile>,
) -> Result<ApiResponse<User>> {
    let update = form.into_update()?;
    let user = UserRepository::new(state.pool())
        .update_profile(user.id, &update)
        .await?;
    Ok(ApiResponse::ok(user).with_message("Profile updated successfully"))
}

/// POST /api/public/change-password
pub async fn change_password(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(form): ApiJson<ChangePassword>,
) -> Result<ApiResponse<()>> {
    if form.current_password.is_empty() {
        return Err(AppError::BadRequest("Current password is required".to_string()));
    }

    AuthService::new(state.pool(), state.registrations())
        .change_password(
            user.id,
            &form.current_password,
            &form.new_password,
            form.confirm_password.as_deref(),
        )
        .await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(ApiResponse::message("Password changed successfully"))
}

/// Upload a new profile picture.
///
/// POST /api/public/profile-picture (multipart, field `image`)
pub async fn upload_picture(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> Result<ApiResponse<User>> {
    if !state.media().is_enabled() {
        return Err(crate::services::MediaError::Disabled.into());
    }

    let image = UploadForm::read(multipart, "image", 1)
        .await?
        .into_first_image()
        .ok_or(crate::services::MediaError::NoFiles)?;
    let uploaded = state.media().upload(image).await?;

    let user = UserRepository::new(state.pool())
        .set_profile_picture(user.id, &uploaded.url)
        .await?;
    Ok(ApiResponse::ok(user).with_message("Profile picture updated successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_trims() {
        let update = UpdateProfile {
            name: Some("  Ada ".into()),
            address: None,
            phone: Some(" 555 ".into()),
        }
        .into_update()
        .unwrap();
        assert_eq!(update.name.as_deref(), Some("Ada"));
        assert!(update.address.is_none());
        assert_eq!(update.phone.as_deref(), Some("555"));
    }

    #[test]
    fn test_profile_update_rejects_blank_name() {
        let result = UpdateProfile {
            name: Some("   ".into()),
            ..UpdateProfile::default()
        }
        .into_update();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
