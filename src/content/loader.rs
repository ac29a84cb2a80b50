//! Content resolution: slug (and optional category) to a renderable row.

use sqlx::PgPool;
use thiserror::Error;

use crate::content::markdown;
use crate::db::models::{Category, Page, Post};

#[derive(Debug, Error)]
pub enum ContentError {
    /// No matching row, or the row is a draft and draft access was not
    /// granted. Callers render a 404; this is never retried.
    #[error("content not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A resolved post together with its compiled body.
#[derive(Debug, Clone)]
pub struct LoadedPost {
    pub post: Post,
    pub content_html: String,
    pub image_urls: Vec<String>,
}

/// A resolved page together with its compiled body.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub page: Page,
    pub content_html: String,
    pub image_urls: Vec<String>,
}

/// Resolve a post by slug. With `category_slug` the category is resolved
/// first and a missing category is indistinguishable from a missing post.
/// Drafts are excluded unless `include_draft` is set (admin preview).
pub async fn load_post(
    pool: &PgPool,
    slug: &str,
    category_slug: Option<&str>,
    include_draft: bool,
) -> Result<LoadedPost, ContentError> {
    let post = match category_slug {
        Some(category_slug) => {
            let category = sqlx::query_as::<_, Category>(
                "SELECT id, name, slug, created_at FROM categories WHERE slug = $1",
            )
            .bind(category_slug)
            .fetch_optional(pool)
            .await?
            .ok_or(ContentError::NotFound)?;

            sqlx::query_as::<_, Post>(
                r#"
                SELECT id, title, slug, description, intro, conclusion, content_md,
                       category_id, images, is_draft, published_at, created_at, updated_at
                FROM posts
                WHERE slug = $1 AND category_id = $2 AND (is_draft = false OR $3)
                "#,
            )
            .bind(slug)
            .bind(category.id)
            .bind(include_draft)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Post>(
                r#"
                SELECT id, title, slug, description, intro, conclusion, content_md,
                       category_id, images, is_draft, published_at, created_at, updated_at
                FROM posts
                WHERE slug = $1 AND (is_draft = false OR $2)
                "#,
            )
            .bind(slug)
            .bind(include_draft)
            .fetch_optional(pool)
            .await?
        }
    }
    .ok_or(ContentError::NotFound)?;

    let content_html = markdown::render(&post.content_md);
    let image_urls = post.image_urls();

    Ok(LoadedPost {
        post,
        content_html,
        image_urls,
    })
}

/// Resolve a page by slug, excluding drafts unless explicitly granted.
pub async fn load_page(
    pool: &PgPool,
    slug: &str,
    include_draft: bool,
) -> Result<LoadedPage, ContentError> {
    let page = sqlx::query_as::<_, Page>(
        r#"
        SELECT id, title, slug, description, content_md, cover_image_url,
               images_urls, is_draft, published_at, created_at, updated_at
        FROM pages
        WHERE slug = $1 AND (is_draft = false OR $2)
        "#,
    )
    .bind(slug)
    .bind(include_draft)
    .fetch_optional(pool)
    .await?
    .ok_or(ContentError::NotFound)?;

    let content_html = markdown::render(&page.content_md);
    let image_urls = page.image_urls();

    Ok(LoadedPage {
        page,
        content_html,
        image_urls,
    })
}
