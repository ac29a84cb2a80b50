/*!
 * Storage Module
 * Disk-backed image store behind the public /uploads/images/ prefix
 */

use std::path::PathBuf;
use uuid::Uuid;

use crate::content::editor::ImageRef;

const DEFAULT_UPLOAD_DIR: &str = "uploads/images";
const PUBLIC_PREFIX: &str = "/uploads/images";

pub fn upload_dir() -> PathBuf {
    PathBuf::from(std::env::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string()))
}

/// Public URL for a stored object path.
pub fn public_url(path: &str) -> String {
    format!("{}/{}", PUBLIC_PREFIX, path)
}

/// Reject path traversal and separators in stored object names.
pub fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains("..")
        && !path.contains('/')
        && !path.contains('\\')
        && !path.contains('\0')
}

/// Write bytes under a fresh UUID filename and return the ref that callers
/// persist on the owning row. `path` is the store-relative name; its
/// presence is what later marks the object as deletable by us.
pub async fn store(extension: &str, bytes: &[u8]) -> std::io::Result<ImageRef> {
    let dir = upload_dir();
    tokio::fs::create_dir_all(&dir).await?;

    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    tokio::fs::write(dir.join(&filename), bytes).await?;

    Ok(ImageRef::stored(public_url(&filename), filename))
}

/// Delete a stored object. Best-effort at every call site: a failure is
/// logged by the caller and never blocks the surrounding update.
pub async fn remove(path: &str) -> std::io::Result<()> {
    if !is_safe_path(path) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "invalid object path",
        ));
    }
    tokio::fs::remove_file(upload_dir().join(path)).await
}

/// Fire-and-forget removal of every stored object a row owned. Used when
/// images are replaced or the row is deleted; failures are logged only.
pub fn remove_detached(paths: Vec<String>) {
    if paths.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for path in paths {
            if let Err(e) = remove(&path).await {
                tracing::warn!(path = %path, error = %e, "failed to delete stored image");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url() {
        assert_eq!(public_url("abc.jpg"), "/uploads/images/abc.jpg");
    }

    #[test]
    fn test_is_safe_path_rejects_traversal() {
        assert!(is_safe_path("abc.jpg"));
        assert!(!is_safe_path("../abc.jpg"));
        assert!(!is_safe_path("a/b.jpg"));
        assert!(!is_safe_path("a\\b.jpg"));
        assert!(!is_safe_path(""));
    }

    #[tokio::test]
    async fn test_store_and_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("UPLOAD_DIR", dir.path());

        let image = store("png", b"fake image bytes").await.unwrap();
        let path = image.path.clone().unwrap();
        assert!(image.url.starts_with("/uploads/images/"));
        assert!(dir.path().join(&path).exists());

        remove(&path).await.unwrap();
        assert!(!dir.path().join(&path).exists());

        std::env::remove_var("UPLOAD_DIR");
    }
}
