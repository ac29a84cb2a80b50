/*!
 * Image Providers Module
 * Adapters for the two external stock-photo search APIs
 */

pub mod pexels;
pub mod unsplash;

use once_cell::sync::Lazy;
use serde::Serialize;

/// Results per search request. Every call is a fresh proxied request; the
/// only throttle is the provider's own per-key rate limit.
pub const PAGE_SIZE: u32 = 12;

pub static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("reqwest client")
});

/// Provider-agnostic search result shape returned by both adapters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockPhoto {
    pub preview: String,
    pub full: String,
    pub thumbnail: String,
    pub alt: String,
}
