/**
 * Newsletter Routes
 * Double opt-in subscription lifecycle and campaign broadcast
 */
use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::db::{self, models::Post};
use crate::email::{Message, EMAIL};
use crate::routes::{require_admin, ErrorResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct NewsletterResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub sent_to: i64,
}

// ============================================================================
// Helpers
// ============================================================================

/// Minimal shape check: non-empty local part and a dotted domain. Anything
/// stricter belongs to the confirmation email itself.
pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Mint a confirmation token: 32 cryptographically random bytes as hex.
/// The token is the subscriber's identity for confirm and unsubscribe and
/// is never rotated afterwards.
pub fn mint_confirmation_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes[..]);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn site_url() -> String {
    std::env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

fn confirmation_email(token: &str) -> String {
    format!(
        "<p>Thanks for subscribing! Please confirm your address by clicking the link below.</p>\
         <p><a href=\"{base}/api/newsletter/confirm?token={token}\">Confirm subscription</a></p>\
         <p>If you didn't request this, you can ignore this email.</p>",
        base = site_url(),
        token = token,
    )
}

fn welcome_email(token: &str) -> String {
    format!(
        "<p>Your subscription is confirmed. Welcome!</p>{footer}",
        footer = unsubscribe_footer(token),
    )
}

fn unsubscribe_footer(token: &str) -> String {
    format!(
        "<p style=\"font-size:12px;color:#888\">\
         <a href=\"{base}/api/newsletter/unsubscribe?token={token}\">Unsubscribe</a></p>",
        base = site_url(),
        token = token,
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/newsletter/subscribe
/// Upsert the subscriber row keyed by email, then send the confirmation
/// email. A failed send does not roll back the row: re-subscribing mints a
/// fresh token for the same address, which is the recovery path.
pub async fn subscribe(Json(payload): Json<SubscribeRequest>) -> impl IntoResponse {
    let email = payload.email.trim().to_lowercase();

    if !is_valid_email(&email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(NewsletterResponse {
                success: false,
                message: "Enter a valid email address".to_string(),
            }),
        );
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(NewsletterResponse {
                    success: false,
                    message: "Service unavailable".to_string(),
                }),
            );
        }
    };

    let token = mint_confirmation_token();

    // Re-subscribing overwrites the token but leaves the confirmed and
    // unsubscribed flags alone; resubscribe is the explicit path back in.
    let row: Result<(String,), sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO emails (email, confirmation_token)
        VALUES ($1, $2)
        ON CONFLICT (email) DO UPDATE SET confirmation_token = EXCLUDED.confirmation_token
        RETURNING confirmation_token
        "#,
    )
    .bind(&email)
    .bind(&token)
    .fetch_one(pool.as_ref())
    .await;

    let token = match row {
        Ok((token,)) => token,
        Err(e) => {
            tracing::error!("Failed to upsert subscriber: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(NewsletterResponse {
                    success: false,
                    message: "Could not subscribe right now".to_string(),
                }),
            );
        }
    };

    match EMAIL.as_ref() {
        Some(client) => {
            let message = Message {
                from: client.from_address().to_string(),
                to: email.clone(),
                subject: "Confirm your subscription".to_string(),
                html: confirmation_email(&token),
            };
            if let Err(e) = client.send(&message).await {
                tracing::error!(email = %email, error = %e, "failed to send confirmation email");
            }
        }
        None => tracing::warn!("email provider not configured; confirmation email not sent"),
    }

    (
        StatusCode::OK,
        Json(NewsletterResponse {
            success: true,
            message: "Check your inbox to confirm your subscription".to_string(),
        }),
    )
}

/// GET /api/newsletter/confirm?token=
/// Flip `confirmed` on the row the token identifies. The token stays in
/// place: it doubles as the unsubscribe key.
pub async fn confirm(Query(query): Query<TokenQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(NewsletterResponse {
                    success: false,
                    message: "Service unavailable".to_string(),
                }),
            );
        }
    };

    let row: Result<Option<(String,)>, sqlx::Error> = sqlx::query_as(
        r#"
        UPDATE emails SET confirmed = true
        WHERE confirmation_token = $1
        RETURNING email
        "#,
    )
    .bind(&query.token)
    .fetch_optional(pool.as_ref())
    .await;

    let email = match row {
        Ok(Some((email,))) => email,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(NewsletterResponse {
                    success: false,
                    message: "This confirmation link is not valid".to_string(),
                }),
            );
        }
        Err(e) => {
            tracing::error!("Failed to confirm subscriber: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(NewsletterResponse {
                    success: false,
                    message: "Could not confirm right now".to_string(),
                }),
            );
        }
    };

    if let Some(client) = EMAIL.as_ref() {
        let message = Message {
            from: client.from_address().to_string(),
            to: email.clone(),
            subject: "Welcome aboard".to_string(),
            html: welcome_email(&query.token),
        };
        if let Err(e) = client.send(&message).await {
            tracing::error!(email = %email, error = %e, "failed to send welcome email");
        }
    }

    (
        StatusCode::OK,
        Json(NewsletterResponse {
            success: true,
            message: "Subscription confirmed".to_string(),
        }),
    )
}

/// GET /api/newsletter/unsubscribe?token=
pub async fn unsubscribe(Query(query): Query<TokenQuery>) -> impl IntoResponse {
    flip_subscription(&query.token, true).await
}

/// GET /api/newsletter/resubscribe?token=
pub async fn resubscribe(Query(query): Query<TokenQuery>) -> impl IntoResponse {
    flip_subscription(&query.token, false).await
}

/// Unsubscribe and resubscribe are the same boolean flip with a timestamp.
/// A row already in the requested state flips indistinguishably from one
/// that wasn't; only an unknown token is reported as a failure.
async fn flip_subscription(
    token: &str,
    unsubscribed: bool,
) -> (StatusCode, Json<NewsletterResponse>) {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(NewsletterResponse {
                    success: false,
                    message: "Service unavailable".to_string(),
                }),
            );
        }
    };

    let query = if unsubscribed {
        r#"UPDATE emails SET unsubscribed = true, unsubscribed_at = now()
           WHERE confirmation_token = $1"#
    } else {
        r#"UPDATE emails SET unsubscribed = false, resubscribed_at = now()
           WHERE confirmation_token = $1"#
    };

    match sqlx::query(query).bind(token).execute(pool.as_ref()).await {
        Ok(result) if result.rows_affected() > 0 => (
            StatusCode::OK,
            Json(NewsletterResponse {
                success: true,
                message: if unsubscribed {
                    "You have been unsubscribed".to_string()
                } else {
                    "Welcome back".to_string()
                },
            }),
        ),
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(NewsletterResponse {
                success: false,
                message: "This link is not valid".to_string(),
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to update subscription: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(NewsletterResponse {
                    success: false,
                    message: "Could not update subscription right now".to_string(),
                }),
            )
        }
    }
}

/// POST /api/newsletter/send - Broadcast a custom campaign (admin)
pub async fn send(headers: HeaderMap, Json(payload): Json<SendRequest>) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    if payload.subject.trim().is_empty() || payload.body.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Subject and body are required")),
        )
            .into_response();
    }

    broadcast(&payload.subject, &payload.body).await
}

/// POST /api/newsletter/send-latest - Broadcast a notification for the most
/// recently published post (admin)
pub async fn send_latest(headers: HeaderMap) -> impl IntoResponse {
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

    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, title, slug, description, intro, conclusion, content_md,
               category_id, images, is_draft, published_at, created_at, updated_at
        FROM posts
        WHERE is_draft = false
        ORDER BY published_at DESC NULLS LAST
        LIMIT 1
        "#,
    )
    .fetch_optional(pool.as_ref())
    .await;

    let post = match post {
        Ok(Some(p)) => p,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("No published posts to announce")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching latest post: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Database error")),
            )
                .into_response();
        }
    };

    let subject = format!("New post: {}", post.title);
    let body = format!(
        "<h2>{title}</h2><p>{description}</p>\
         <p><a href=\"{base}/blog/{slug}\">Read the full post</a></p>",
        title = post.title,
        description = post.description,
        base = site_url(),
        slug = post.slug,
    );

    broadcast(&subject, &body).await
}

/// Fan a campaign out to every confirmed, still-subscribed address as one
/// batch call, then record the audit row. `sent_to` is the attempted
/// recipient count; the provider's batch API gives no per-recipient status.
async fn broadcast(subject: &str, body: &str) -> axum::response::Response {
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

    let recipients: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT email, confirmation_token
        FROM emails
        WHERE confirmed = true AND unsubscribed = false
        "#,
    )
    .fetch_all(pool.as_ref())
    .await
    .unwrap_or_default();

    let sent_to = recipients.len() as i64;

    if sent_to > 0 {
        let client = match EMAIL.as_ref() {
            Some(c) => c,
            None => {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorResponse::new("Email provider not configured")),
                )
                    .into_response();
            }
        };

        let messages: Vec<Message> = recipients
            .iter()
            .map(|(email, token)| Message {
                from: client.from_address().to_string(),
                to: email.clone(),
                subject: subject.to_string(),
                html: format!("{}{}", body, unsubscribe_footer(token)),
            })
            .collect();

        if let Err(e) = client.send_batch(&messages).await {
            tracing::error!(error = %e, "failed to submit newsletter batch");
            return (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new("Email provider rejected the batch")),
            )
                .into_response();
        }
    }

    if let Err(e) = sqlx::query(
        r#"INSERT INTO newsletter_campaigns (subject, body, sent_to) VALUES ($1, $2, $3)"#,
    )
    .bind(subject)
    .bind(body)
    .bind(sent_to)
    .execute(pool.as_ref())
    .await
    {
        tracing::error!("Failed to record campaign: {}", e);
    }

    tracing::info!(recipients = sent_to, "newsletter campaign submitted");

    (
        StatusCode::OK,
        Json(SendResponse {
            success: true,
            sent_to,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@missing-local.com"));
        assert!(!is_valid_email("missing-domain@"));
        assert!(!is_valid_email("bad@domain"));
        assert!(!is_valid_email("bad@.com"));
    }

    #[test]
    fn test_mint_confirmation_token_is_hex() {
        let token = mint_confirmation_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_mint_confirmation_token_is_unique() {
        assert_ne!(mint_confirmation_token(), mint_confirmation_token());
    }

    #[test]
    fn test_emails_embed_the_token() {
        let token = "deadbeef";
        assert!(confirmation_email(token).contains("confirm?token=deadbeef"));
        assert!(welcome_email(token).contains("unsubscribe?token=deadbeef"));
        assert!(unsubscribe_footer(token).contains("unsubscribe?token=deadbeef"));
    }
}
