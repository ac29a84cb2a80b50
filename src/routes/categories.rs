/**
 * Category Routes
 * Category listing and dashboard management
 */
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::content::slugify::slugify;
use crate::db::{self, models::Category};
use crate::routes::{require_admin, ErrorResponse, SuccessResponse};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListResponse {
    pub items: Vec<Category>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// GET /api/categories - List all categories
pub async fn list_categories() -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, created_at FROM categories ORDER BY name ASC",
    )
    .fetch_all(pool.as_ref())
    .await
    .unwrap_or_default();

    (
        StatusCode::OK,
        Json(CategoryListResponse { items: categories }),
    )
        .into_response()
}

/// POST /api/categories - Create a category (admin). The slug is derived
/// from the name.
pub async fn create_category(
    headers: HeaderMap,
    Json(payload): Json<CreateCategoryRequest>,
) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    if payload.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Name is required")),
        )
            .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    let name = payload.name.trim();
    let slug = slugify(name);

    match sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, slug)
        VALUES ($1, $2)
        RETURNING id, name, slug, created_at
        "#,
    )
    .bind(name)
    .bind(&slug)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => {
            if e.to_string().contains("duplicate key") || e.to_string().contains("unique constraint")
            {
                return (
                    StatusCode::CONFLICT,
                    Json(ErrorResponse::new("Category already exists")),
                )
                    .into_response();
            }
            tracing::error!("Database error creating category: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create category")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/categories/:slug - Delete a category (admin). Fails while
/// posts still reference it, which the FK surfaces as a conflict.
pub async fn delete_category(headers: HeaderMap, Path(slug): Path<String>) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("Database not available")),
            )
                .into_response();
        }
    };

    match sqlx::query("DELETE FROM categories WHERE slug = $1")
        .bind(&slug)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) => {
            if result.rows_affected() == 0 {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse::new("Not found")),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
        }
        Err(e) => {
            if e.to_string().contains("foreign key") {
                return (
                    StatusCode::CONFLICT,
                    Json(ErrorResponse::new("Category still has posts")),
                )
                    .into_response();
            }
            tracing::error!("Database error deleting category: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete category")),
            )
                .into_response()
        }
    }
}
