use once_cell::sync::Lazy;
use serde::Deserialize;

use super::{StockPhoto, HTTP_CLIENT, PAGE_SIZE};

const SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

static ACCESS_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("UNSPLASH_ACCESS_KEY").unwrap_or_default());

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
    alt_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
    full: String,
    thumb: String,
}

fn normalize(response: SearchResponse) -> Vec<StockPhoto> {
    response
        .results
        .into_iter()
        .map(|p| StockPhoto {
            preview: p.urls.regular,
            full: p.urls.full,
            thumbnail: p.urls.thumb,
            alt: p.alt_description.unwrap_or_default(),
        })
        .collect()
}

/// Search Unsplash. Best-effort: any transport or decode failure is logged
/// and surfaced as an empty result set, since image search only enhances
/// the editing UI.
pub async fn search(query: &str) -> Vec<StockPhoto> {
    if ACCESS_KEY.is_empty() {
        tracing::warn!("UNSPLASH_ACCESS_KEY not set; returning no results");
        return Vec::new();
    }

    let per_page = PAGE_SIZE.to_string();
    let response = HTTP_CLIENT
        .get(SEARCH_URL)
        .header("Authorization", format!("Client-ID {}", ACCESS_KEY.as_str()))
        .query(&[("query", query), ("per_page", per_page.as_str())])
        .send()
        .await;

    let response = match response {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::warn!(status = %r.status(), "unsplash search returned error status");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "unsplash search request failed");
            return Vec::new();
        }
    };

    match response.json::<SearchResponse>().await {
        Ok(parsed) => normalize(parsed),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse unsplash response");
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
            "results": [
                {
                    "urls": {
                        "regular": "https://images.example/reg.jpg",
                        "full": "https://images.example/full.jpg",
                        "thumb": "https://images.example/thumb.jpg"
                    },
                    "alt_description": "a mountain"
                }
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let photos = normalize(parsed);
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].preview, "https://images.example/reg.jpg");
        assert_eq!(photos[0].full, "https://images.example/full.jpg");
        assert_eq!(photos[0].thumbnail, "https://images.example/thumb.jpg");
        assert_eq!(photos[0].alt, "a mountain");
    }

    #[test]
    fn test_normalize_defaults_missing_alt() {
        let raw = r#"{
            "results": [
                {
                    "urls": {"regular": "r", "full": "f", "thumb": "t"},
                    "alt_description": null
                }
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(normalize(parsed)[0].alt, "");
    }
}
