//! JSON success envelope and request extractors.
//!
//! Successful responses look like
//! `{"status":"success","message":"...","data":...}`; `message` is omitted
//! when there is nothing to say.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    data: T,
    #[serde(skip)]
    code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with data.
    pub const fn ok(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data,
            code: StatusCode::OK,
        }
    }

    /// 201 with data.
    pub const fn created(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data,
            code: StatusCode::CREATED,
        }
    }

    /// Attach a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Override the status code.
    #[must_use]
    pub const fn with_status(mut self, code: StatusCode) -> Self {
        self.code = code;
        self
    }
}

impl ApiResponse<()> {
    /// 200 with only a message; `data` is `null`.
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok(()).with_message(message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

/// `axum::Json` whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` whose rejections use the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Query` whose rejections use the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn render<T: Serialize>(response: ApiResponse<T>) -> (StatusCode, serde_json::Value) {
        let response = response.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_ok_without_message() {
        let (status, body) = render(ApiResponse::ok(vec![1, 2])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"], serde_json::json!([1, 2]));
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn test_created_with_message() {
        let (status, body) =
            render(ApiResponse::created("x").with_message("Product created")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Product created");
    }

    #[tokio::test]
    async fn test_message_only() {
        let (status, body) = render(
            ApiResponse::message("Registration started").with_status(StatusCode::ACCEPTED),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["data"].is_null());
    }
}
