/**
 * Page Routes
 * Static pages: public reads by slug plus dashboard CRUD
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::content::editor::{ImageRef, PageEditor};
use crate::content::loader::{self, ContentError};
use crate::content::slugify::is_valid_slug;
use crate::db::{self, models::Page};
use crate::routes::posts::ValidationErrorResponse;
use crate::routes::{require_admin, ErrorResponse, SuccessResponse};
use crate::storage;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGetQuery {
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub data: Page,
    pub content_html: String,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageListResponse {
    pub items: Vec<Page>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageRequest {
    pub title: String,
    pub description: String,
    pub content_md: String,
    pub cover_image: Option<ImageRef>,
    #[serde(default = "default_is_draft")]
    pub is_draft: bool,
}

fn default_is_draft() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePageRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content_md: Option<String>,
    pub cover_image: Option<ImageRef>,
    pub is_draft: Option<bool>,
}

/// GET /api/pages - List pages. Drafts only for admins.
pub async fn list_pages(headers: HeaderMap) -> impl IntoResponse {
    let include_drafts = require_admin(&headers).is_ok();

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

    let pages = sqlx::query_as::<_, Page>(
        r#"
        SELECT id, title, slug, description, content_md, cover_image_url,
               images_urls, is_draft, published_at, created_at, updated_at
        FROM pages
        WHERE (is_draft = false OR $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(include_drafts)
    .fetch_all(pool.as_ref())
    .await
    .unwrap_or_default();

    (StatusCode::OK, Json(PageListResponse { items: pages })).into_response()
}

/// GET /api/pages/:slug - Resolve one page via the content loader.
pub async fn get_page(
    headers: HeaderMap,
    Path(slug): Path<String>,
    Query(query): Query<PageGetQuery>,
) -> impl IntoResponse {
    if !is_valid_slug(&slug) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_message(
                "Invalid slug",
                "Slug must contain only lowercase letters, numbers, and hyphens",
            )),
        )
            .into_response();
    }

    if query.draft {
        if let Err(err) = require_admin(&headers) {
            return err.into_response();
        }
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

    match loader::load_page(pool.as_ref(), &slug, query.draft).await {
        Ok(loaded) => (
            StatusCode::OK,
            Json(PageResponse {
                data: loaded.page,
                content_html: loaded.content_html,
                image_urls: loaded.image_urls,
            }),
        )
            .into_response(),
        Err(ContentError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Not found")),
        )
            .into_response(),
        Err(ContentError::Database(e)) => {
            tracing::error!("Database error fetching page: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response()
        }
    }
}

/// POST /api/pages - Create new page (admin)
pub async fn create_page(
    headers: HeaderMap,
    Json(payload): Json<CreatePageRequest>,
) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    let editor = PageEditor {
        title: payload.title,
        description: payload.description,
        content_md: payload.content_md,
        cover_image: payload.cover_image,
        is_draft: payload.is_draft,
    };

    let composed = match editor.compose() {
        Ok(c) => c,
        Err(violations) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ValidationErrorResponse {
                    error: "Validation failed".to_string(),
                    violations,
                }),
            )
                .into_response();
        }
    };

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

    let published_at = if composed.is_draft {
        None
    } else {
        Some(chrono::Utc::now())
    };

    match sqlx::query_as::<_, Page>(
        r#"
        INSERT INTO pages (title, slug, description, content_md, cover_image_url,
                           images_urls, is_draft, published_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
        RETURNING id, title, slug, description, content_md, cover_image_url,
                  images_urls, is_draft, published_at, created_at, updated_at
        "#,
    )
    .bind(&composed.title)
    .bind(&composed.slug)
    .bind(&composed.description)
    .bind(&composed.content_md)
    .bind(&composed.cover_image_url)
    .bind(sqlx::types::Json(&composed.images))
    .bind(composed.is_draft)
    .bind(published_at)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(page) => {
            let image_urls = page.image_urls();
            let content_html = crate::content::markdown::render(&page.content_md);
            (
                StatusCode::CREATED,
                Json(PageResponse {
                    data: page,
                    content_html,
                    image_urls,
                }),
            )
                .into_response()
        }
        Err(e) => {
            if e.to_string().contains("duplicate key") || e.to_string().contains("unique constraint")
            {
                return (
                    StatusCode::CONFLICT,
                    Json(ErrorResponse::new("Slug already exists")),
                )
                    .into_response();
            }

            tracing::error!("Database error creating page: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create page")),
            )
                .into_response()
        }
    }
}

/// PATCH /api/pages/:slug - Update page (admin)
pub async fn update_page(
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(payload): Json<UpdatePageRequest>,
) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    if !is_valid_slug(&slug) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_message(
                "Invalid slug",
                "Slug must contain only lowercase letters, numbers, and hyphens",
            )),
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

    let existing = sqlx::query_as::<_, Page>(
        r#"
        SELECT id, title, slug, description, content_md, cover_image_url,
               images_urls, is_draft, published_at, created_at, updated_at
        FROM pages WHERE slug = $1
        "#,
    )
    .bind(&slug)
    .fetch_optional(pool.as_ref())
    .await;

    let existing = match existing {
        Ok(Some(p)) => p,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Not found")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching page: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    };

    let cover_image = payload
        .cover_image
        .or_else(|| existing.images_urls.0.first().cloned());

    let editor = PageEditor {
        title: payload.title.unwrap_or_else(|| existing.title.clone()),
        description: payload
            .description
            .unwrap_or_else(|| existing.description.clone()),
        content_md: payload
            .content_md
            .unwrap_or_else(|| existing.content_md.clone()),
        cover_image,
        is_draft: payload.is_draft.unwrap_or(existing.is_draft),
    };

    let composed = match editor.compose() {
        Ok(c) => c,
        Err(violations) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ValidationErrorResponse {
                    error: "Validation failed".to_string(),
                    violations,
                }),
            )
                .into_response();
        }
    };

    let kept_paths: std::collections::HashSet<String> = composed
        .images
        .iter()
        .filter_map(|i| i.path.clone())
        .collect();
    let orphaned: Vec<String> = existing
        .stored_image_paths()
        .into_iter()
        .filter(|p| !kept_paths.contains(p))
        .collect();

    let published_at = match (existing.published_at, composed.is_draft) {
        (Some(ts), _) => Some(ts),
        (None, false) => Some(chrono::Utc::now()),
        (None, true) => None,
    };

    match sqlx::query_as::<_, Page>(
        r#"
        UPDATE pages
        SET title = $1, description = $2, content_md = $3, cover_image_url = $4,
            images_urls = $5, is_draft = $6, published_at = $7, updated_at = now()
        WHERE slug = $8
        RETURNING id, title, slug, description, content_md, cover_image_url,
                  images_urls, is_draft, published_at, created_at, updated_at
        "#,
    )
    .bind(&composed.title)
    .bind(&composed.description)
    .bind(&composed.content_md)
    .bind(&composed.cover_image_url)
    .bind(sqlx::types::Json(&composed.images))
    .bind(composed.is_draft)
    .bind(published_at)
    .bind(&slug)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(page) => {
            storage::remove_detached(orphaned);
            let image_urls = page.image_urls();
            let content_html = crate::content::markdown::render(&page.content_md);
            (
                StatusCode::OK,
                Json(PageResponse {
                    data: page,
                    content_html,
                    image_urls,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error updating page: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update page")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/pages/:slug - Delete page (admin)
pub async fn delete_page(headers: HeaderMap, Path(slug): Path<String>) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    if !is_valid_slug(&slug) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_message(
                "Invalid slug",
                "Slug must contain only lowercase letters, numbers, and hyphens",
            )),
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

    let stored_paths: Vec<String> = sqlx::query_as::<_, Page>(
        r#"
        SELECT id, title, slug, description, content_md, cover_image_url,
               images_urls, is_draft, published_at, created_at, updated_at
        FROM pages WHERE slug = $1
        "#,
    )
    .bind(&slug)
    .fetch_optional(pool.as_ref())
    .await
    .ok()
    .flatten()
    .map(|p| p.stored_image_paths())
    .unwrap_or_default();

    match sqlx::query("DELETE FROM pages WHERE slug = $1")
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
            storage::remove_detached(stored_paths);
            (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
        }
        Err(e) => {
            tracing::error!("Database error deleting page: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete page")),
            )
                .into_response()
        }
    }
}
