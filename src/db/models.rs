//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::content::editor::ImageRef;

/// User model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Refresh token model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

/// Category model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Post model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub intro: String,
    pub conclusion: String,
    pub content_md: String,
    pub category_id: Uuid,
    pub images: Json<Vec<ImageRef>>,
    pub is_draft: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Image refs flattened to a list of URL strings, cover first.
    pub fn image_urls(&self) -> Vec<String> {
        self.images.0.iter().map(|i| i.url.clone()).collect()
    }

    /// Paths of internally stored images, the ones we own and may delete.
    pub fn stored_image_paths(&self) -> Vec<String> {
        self.images.0.iter().filter_map(|i| i.path.clone()).collect()
    }

    /// Per-slot store paths, index-aligned with `image_urls` (external
    /// images yield an empty string).
    pub fn image_paths(&self) -> Vec<String> {
        self.images
            .0
            .iter()
            .map(|i| i.path.clone().unwrap_or_default())
            .collect()
    }
}

/// Page model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content_md: String,
    pub cover_image_url: String,
    pub images_urls: Json<Vec<ImageRef>>,
    pub is_draft: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn image_urls(&self) -> Vec<String> {
        self.images_urls.0.iter().map(|i| i.url.clone()).collect()
    }

    pub fn stored_image_paths(&self) -> Vec<String> {
        self.images_urls
            .0
            .iter()
            .filter_map(|i| i.path.clone())
            .collect()
    }
}

/// Newsletter subscriber row. `confirmation_token` doubles as the identity
/// key for confirm and unsubscribe links and is never rotated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub confirmation_token: String,
    pub confirmed: bool,
    pub unsubscribed: bool,
    pub created_at: DateTime<Utc>,
    pub resubscribed_at: Option<DateTime<Utc>>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// Newsletter campaign audit row, written once per broadcast. `sent_to`
/// counts attempted recipients, not provider-confirmed deliveries.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub subject: String,
    pub body: String,
    pub sent_to: i64,
    pub created_at: DateTime<Utc>,
}
