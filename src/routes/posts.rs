/**
 * Post Routes
 * Public reads by slug/category plus dashboard CRUD through the editor
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::editor::{ImageRef, PostEditor};
use crate::content::loader::{self, ContentError};
use crate::content::sections::{self, Section, SectionWithImage};
use crate::content::slugify::is_valid_slug;
use crate::db::{self, models::Post};
use crate::routes::{require_admin, ErrorResponse, SuccessResponse};
use crate::storage;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/posts (list)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub category: Option<String>,
    #[serde(default)]
    pub include_drafts: bool,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

/// Response for GET /api/posts (list)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListResponse {
    pub items: Vec<PostSummary>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Post summary (for list view)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category_id: Uuid,
    pub cover_image_url: String,
    pub is_draft: bool,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Query parameters for GET /api/posts/:slug
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostGetQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

/// Response for GET /api/posts/:slug
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub data: Post,
    pub content_html: String,
    pub image_urls: Vec<String>,
    pub sections: Vec<SectionWithImage>,
}

/// Assemble the full post payload: rendered body, flat image URL list, and
/// the section list with each section's image re-attached for the editor.
fn post_response(post: Post, content_html: String) -> PostResponse {
    let image_urls = post.image_urls();
    let image_paths = post.image_paths();
    let parsed = sections::parse(&post.content_md);
    let attached = sections::attach_images(&parsed, &image_urls, &image_paths);
    PostResponse {
        content_html,
        image_urls,
        sections: attached,
        data: post,
    }
}

/// Request body for POST /api/posts (create)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub conclusion: String,
    pub category_id: Uuid,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default = "default_is_draft")]
    pub is_draft: bool,
}

fn default_is_draft() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub intro: Option<String>,
    pub conclusion: Option<String>,
    pub category_id: Option<Uuid>,
    pub sections: Option<Vec<Section>>,
    pub images: Option<Vec<ImageRef>>,
    pub is_draft: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrorResponse {
    pub error: String,
    pub violations: Vec<crate::content::editor::EditorError>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/posts - List posts with pagination. Drafts are only included
/// for authenticated admins asking for them.
pub async fn list_posts(headers: HeaderMap, Query(query): Query<PostListQuery>) -> impl IntoResponse {
    let include_drafts = query.include_drafts && require_admin(&headers).is_ok();

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

    let page_size = query.page_size.clamp(1, 100);
    let page = query.page.max(1);
    let offset = (page - 1) * page_size;

    // Resolve the optional category filter first; an unknown category slug
    // is an empty listing, not an error.
    let category_id: Option<Uuid> = match &query.category {
        Some(slug) => {
            match sqlx::query_as::<_, (Uuid,)>("SELECT id FROM categories WHERE slug = $1")
                .bind(slug)
                .fetch_optional(pool.as_ref())
                .await
            {
                Ok(Some((id,))) => Some(id),
                Ok(None) => {
                    return (
                        StatusCode::OK,
                        Json(PostListResponse {
                            items: vec![],
                            page,
                            page_size,
                            total: 0,
                        }),
                    )
                        .into_response();
                }
                Err(e) => {
                    tracing::error!("Database error resolving category: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ErrorResponse::new("Database error")),
                    )
                        .into_response();
                }
            }
        }
        None => None,
    };

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, title, slug, description, intro, conclusion, content_md,
               category_id, images, is_draft, published_at, created_at, updated_at
        FROM posts
        WHERE ($1::uuid IS NULL OR category_id = $1)
          AND (is_draft = false OR $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(category_id)
    .bind(include_drafts)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool.as_ref())
    .await
    .unwrap_or_default();

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM posts
        WHERE ($1::uuid IS NULL OR category_id = $1)
          AND (is_draft = false OR $2)
        "#,
    )
    .bind(category_id)
    .bind(include_drafts)
    .fetch_one(pool.as_ref())
    .await
    .unwrap_or((0,));

    let items: Vec<PostSummary> = posts
        .into_iter()
        .map(|p| PostSummary {
            cover_image_url: p.image_urls().first().cloned().unwrap_or_default(),
            id: p.id,
            title: p.title,
            slug: p.slug,
            description: p.description,
            category_id: p.category_id,
            is_draft: p.is_draft,
            published_at: p.published_at,
            created_at: p.created_at,
        })
        .collect();

    (
        StatusCode::OK,
        Json(PostListResponse {
            items,
            page,
            page_size,
            total: total.0,
        }),
    )
        .into_response()
}

/// GET /api/posts/:slug - Resolve one post via the content loader.
/// `?draft=true` (admin preview) makes drafts visible.
pub async fn get_post(
    headers: HeaderMap,
    Path(slug): Path<String>,
    Query(query): Query<PostGetQuery>,
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

    match loader::load_post(pool.as_ref(), &slug, query.category.as_deref(), query.draft).await {
        Ok(loaded) => (
            StatusCode::OK,
            Json(post_response(loaded.post, loaded.content_html)),
        )
            .into_response(),
        Err(ContentError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Not found")),
        )
            .into_response(),
        Err(ContentError::Database(e)) => {
            tracing::error!("Database error fetching post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response()
        }
    }
}

fn editor_from_create(payload: &CreatePostRequest) -> PostEditor {
    PostEditor {
        title: payload.title.clone(),
        description: payload.description.clone(),
        intro: payload.intro.clone(),
        conclusion: payload.conclusion.clone(),
        category_id: Some(payload.category_id),
        sections: payload.sections.clone(),
        images: payload.images.clone(),
        is_draft: payload.is_draft,
    }
}

/// POST /api/posts - Create new post (admin)
pub async fn create_post(
    headers: HeaderMap,
    Json(payload): Json<CreatePostRequest>,
) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    let editor = editor_from_create(&payload);
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

    match sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (title, slug, description, intro, conclusion, content_md,
                           category_id, images, is_draft, published_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), now())
        RETURNING id, title, slug, description, intro, conclusion, content_md,
                  category_id, images, is_draft, published_at, created_at, updated_at
        "#,
    )
    .bind(&composed.title)
    .bind(&composed.slug)
    .bind(&composed.description)
    .bind(&composed.intro)
    .bind(&composed.conclusion)
    .bind(&composed.content_md)
    .bind(composed.category_id)
    .bind(sqlx::types::Json(&composed.images))
    .bind(composed.is_draft)
    .bind(published_at)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(post) => {
            let content_html = crate::content::markdown::render(&post.content_md);
            (StatusCode::CREATED, Json(post_response(post, content_html))).into_response()
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

            tracing::error!("Database error creating post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to create post")),
            )
                .into_response()
        }
    }
}

/// PATCH /api/posts/:slug - Update post (admin). The stored slug is kept;
/// replaced uploaded images are deleted best-effort after the write.
pub async fn update_post(
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(payload): Json<UpdatePostRequest>,
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

    let existing = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, title, slug, description, intro, conclusion, content_md,
               category_id, images, is_draft, published_at, created_at, updated_at
        FROM posts WHERE slug = $1
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
            tracing::error!("Database error fetching post: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    };

    let editor = PostEditor {
        title: payload.title.unwrap_or_else(|| existing.title.clone()),
        description: payload
            .description
            .unwrap_or_else(|| existing.description.clone()),
        intro: payload.intro.unwrap_or_else(|| existing.intro.clone()),
        conclusion: payload
            .conclusion
            .unwrap_or_else(|| existing.conclusion.clone()),
        category_id: Some(payload.category_id.unwrap_or(existing.category_id)),
        sections: payload
            .sections
            .unwrap_or_else(|| crate::content::sections::parse(&existing.content_md)),
        images: payload.images.unwrap_or_else(|| existing.images.0.clone()),
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

    // Stored objects dropped by this update are deleted after the row is
    // written; failures are logged and never surface to the caller.
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

    match sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET title = $1, description = $2, intro = $3, conclusion = $4, content_md = $5,
            category_id = $6, images = $7, is_draft = $8, published_at = $9, updated_at = now()
        WHERE slug = $10
        RETURNING id, title, slug, description, intro, conclusion, content_md,
                  category_id, images, is_draft, published_at, created_at, updated_at
        "#,
    )
    .bind(&composed.title)
    .bind(&composed.description)
    .bind(&composed.intro)
    .bind(&composed.conclusion)
    .bind(&composed.content_md)
    .bind(composed.category_id)
    .bind(sqlx::types::Json(&composed.images))
    .bind(composed.is_draft)
    .bind(published_at)
    .bind(&slug)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(post) => {
            storage::remove_detached(orphaned);
            let content_html = crate::content::markdown::render(&post.content_md);
            (StatusCode::OK, Json(post_response(post, content_html))).into_response()
        }
        Err(e) => {
            tracing::error!("Database error updating post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to update post")),
            )
                .into_response()
        }
    }
}

/// DELETE /api/posts/:slug - Delete post (admin), then best-effort delete
/// its stored images.
pub async fn delete_post(headers: HeaderMap, Path(slug): Path<String>) -> impl IntoResponse {
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

    let stored_paths: Vec<String> = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, title, slug, description, intro, conclusion, content_md,
               category_id, images, is_draft, published_at, created_at, updated_at
        FROM posts WHERE slug = $1
        "#,
    )
    .bind(&slug)
    .fetch_optional(pool.as_ref())
    .await
    .ok()
    .flatten()
    .map(|p| p.stored_image_paths())
    .unwrap_or_default();

    match sqlx::query("DELETE FROM posts WHERE slug = $1")
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
            tracing::error!("Database error deleting post: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete post")),
            )
                .into_response()
        }
    }
}
