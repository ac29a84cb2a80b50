/**
 * Routes Module
 * API route handlers
 */
pub mod assist;
pub mod auth;
pub mod categories;
pub mod feeds;
pub mod health;
pub mod images;
pub mod newsletter;
pub mod pages;
pub mod posts;
pub mod upload;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}

/// Success response (for delete and similar)
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Access guard for dashboard routes: a valid Bearer token whose claims
/// carry the admin role. Missing or bad token -> 401, non-admin -> 403.
pub fn require_admin(headers: &HeaderMap) -> Result<auth::Claims, (StatusCode, Json<ErrorResponse>)> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let token = match token {
        Some(t) => t,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Authorization required")),
            ));
        }
    };

    let claims = auth::verify_access_token(token).map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Invalid or expired token")),
        )
    })?;

    if claims.role != "admin" {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Admin access required")),
        ));
    }

    Ok(claims)
}
