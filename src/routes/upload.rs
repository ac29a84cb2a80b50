/**
 * Upload Routes
 * Multipart image upload into the object store, plus deletion
 */
use axum::{
    extract::{Multipart, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::routes::{require_admin, ErrorResponse};
use crate::storage;

const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub path: String,
    pub size: usize,
    pub mime_type: String,
}

fn validate_image_magic_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn get_extension_from_mime(mime: &str) -> &str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// POST /api/uploads - Store one image (admin)
pub async fn upload_image(headers: HeaderMap, mut multipart: Multipart) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("No file provided")),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Multipart error: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Invalid multipart data")),
            )
                .into_response();
        }
    };

    // Get original filename for extension validation
    let original_name = field.file_name().unwrap_or("unknown").to_string();
    let original_ext = original_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase();

    if !ALLOWED_EXTENSIONS.contains(&original_ext.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.",
            )),
        )
            .into_response();
    }

    let bytes = match field.bytes().await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to read upload bytes: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Failed to read file data")),
            )
                .into_response();
        }
    };

    if bytes.len() > MAX_FILE_SIZE {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("File too large. Maximum size is 5MB.")),
        )
            .into_response();
    }

    if bytes.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Empty file")),
        )
            .into_response();
    }

    // Extension alone is spoofable; the content has to look like an image.
    let mime_type = match validate_image_magic_bytes(&bytes) {
        Some(mime) => mime,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "File content does not match an allowed image type.",
                )),
            )
                .into_response();
        }
    };

    let ext = get_extension_from_mime(mime_type);
    let image = match storage::store(ext, &bytes).await {
        Ok(image) => image,
        Err(e) => {
            tracing::error!("Failed to store upload: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to save file")),
            )
                .into_response();
        }
    };

    let path = image.path.clone().unwrap_or_default();
    tracing::info!("Image uploaded: {} ({} bytes)", path, bytes.len());

    (
        StatusCode::CREATED,
        Json(UploadResponse {
            url: image.url,
            path,
            size: bytes.len(),
            mime_type: mime_type.to_string(),
        }),
    )
        .into_response()
}

/// DELETE /api/uploads/:path - Remove a stored image (admin)
pub async fn delete_image(headers: HeaderMap, Path(path): Path<String>) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    if !storage::is_safe_path(&path) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid filename")),
        )
            .into_response();
    }

    match storage::remove(&path).await {
        Ok(()) => {
            tracing::info!("Image deleted: {}", path);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("File not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to delete file {}: {}", path, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to delete file")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_bytes_jpeg() {
        assert_eq!(
            validate_image_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some("image/jpeg")
        );
    }

    #[test]
    fn test_magic_bytes_png() {
        assert_eq!(
            validate_image_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]),
            Some("image/png")
        );
    }

    #[test]
    fn test_magic_bytes_webp() {
        let bytes = [
            0x52, 0x49, 0x46, 0x46, 0x00, 0x00, 0x00, 0x00, 0x57, 0x45, 0x42, 0x50,
        ];
        assert_eq!(validate_image_magic_bytes(&bytes), Some("image/webp"));
    }

    #[test]
    fn test_magic_bytes_rejects_other_content() {
        assert_eq!(validate_image_magic_bytes(b"<svg>not ok</svg>"), None);
        assert_eq!(validate_image_magic_bytes(&[0x00]), None);
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(get_extension_from_mime("image/jpeg"), "jpg");
        assert_eq!(get_extension_from_mime("application/pdf"), "bin");
    }
}
