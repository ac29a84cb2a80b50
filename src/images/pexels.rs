use once_cell::sync::Lazy;
use serde::Deserialize;

use super::{StockPhoto, HTTP_CLIENT, PAGE_SIZE};

const SEARCH_URL: &str = "https://api.pexels.com/v1/search";

static API_KEY: Lazy<String> = Lazy::new(|| std::env::var("PEXELS_API_KEY").unwrap_or_default());

#[derive(Debug, Deserialize)]
struct SearchResponse {
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    src: PhotoSrc,
    #[serde(default)]
    alt: String,
}

#[derive(Debug, Deserialize)]
struct PhotoSrc {
    original: String,
    large: String,
    tiny: String,
}

fn normalize(response: SearchResponse) -> Vec<StockPhoto> {
    response
        .photos
        .into_iter()
        .map(|p| StockPhoto {
            preview: p.src.large,
            full: p.src.original,
            thumbnail: p.src.tiny,
            alt: p.alt,
        })
        .collect()
}

/// Search Pexels. Same best-effort policy as the Unsplash adapter: errors
/// are logged and swallowed into an empty list.
pub async fn search(query: &str) -> Vec<StockPhoto> {
    if API_KEY.is_empty() {
        tracing::warn!("PEXELS_API_KEY not set; returning no results");
        return Vec::new();
    }

    let per_page = PAGE_SIZE.to_string();
    let response = HTTP_CLIENT
        .get(SEARCH_URL)
        .header("Authorization", API_KEY.as_str())
        .query(&[("query", query), ("per_page", per_page.as_str())])
        .send()
        .await;

    let response = match response {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::warn!(status = %r.status(), "pexels search returned error status");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "pexels search request failed");
            return Vec::new();
        }
    };

    match response.json::<SearchResponse>().await {
        Ok(parsed) => normalize(parsed),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse pexels response");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_maps_provider_shape() {
        let raw = r#"{
            "photos": [
                {
                    "src": {
                        "original": "https://images.example/orig.jpg",
                        "large": "https://images.example/large.jpg",
                        "tiny": "https://images.example/tiny.jpg"
                    },
                    "alt": "a river"
                }
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let photos = normalize(parsed);
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].preview, "https://images.example/large.jpg");
        assert_eq!(photos[0].full, "https://images.example/orig.jpg");
        assert_eq!(photos[0].thumbnail, "https://images.example/tiny.jpg");
        assert_eq!(photos[0].alt, "a river");
    }

    #[test]
    fn test_normalize_defaults_missing_alt() {
        let raw = r#"{"photos": [{"src": {"original": "o", "large": "l", "tiny": "t"}}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(normalize(parsed)[0].alt, "");
    }
}
