use axum::{body::Body, http::header, response::Response};
use chrono::{DateTime, Utc};

use crate::db;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rfc822(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

fn w3c_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

fn site_url() -> String {
    std::env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

fn text_response(status: u16, content_type: &str, body: String) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CACHE_CONTROL,
            "public, max-age=3600, stale-while-revalidate=600",
        )
        .body(Body::from(body))
        .unwrap()
}

/// Row shape shared by the feed queries: slug plus the publication stamp.
type FeedRow = (String, DateTime<Utc>);

async fn published_rows(table: &str) -> Option<Vec<FeedRow>> {
    let pool = db::get_pool()?;
    // Rows that predate the published_at column fall back to created_at.
    let query = format!(
        "SELECT slug, COALESCE(published_at, created_at) \
         FROM {table} WHERE is_draft = false \
         ORDER BY COALESCE(published_at, created_at) DESC"
    );
    sqlx::query_as::<_, FeedRow>(&query)
        .fetch_all(pool.as_ref())
        .await
        .ok()
}

/// GET /sitemap.xml - generated from published posts and pages
pub async fn sitemap() -> Response {
    let base_url = site_url();

    let posts = published_rows("posts").await.unwrap_or_default();
    let pages = published_rows("pages").await.unwrap_or_default();

    let mut urls = String::new();
    urls.push_str(&format!(
        "  <url>\n    <loc>{}</loc>\n  </url>\n",
        escape_xml(&base_url)
    ));
    for (slug, published) in &posts {
        urls.push_str(&format!(
            "  <url>\n    <loc>{}/blog/{}</loc>\n    <lastmod>{}</lastmod>\n  </url>\n",
            escape_xml(&base_url),
            escape_xml(slug),
            w3c_date(published),
        ));
    }
    for (slug, published) in &pages {
        urls.push_str(&format!(
            "  <url>\n    <loc>{}/{}</loc>\n    <lastmod>{}</lastmod>\n  </url>\n",
            escape_xml(&base_url),
            escape_xml(slug),
            w3c_date(published),
        ));
    }

    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}</urlset>",
        urls
    );

    text_response(200, "application/xml; charset=utf-8", xml)
}

/// GET /robots.txt
pub async fn robots() -> Response {
    let body = format!(
        "User-agent: *\nAllow: /\nDisallow: /api/\n\nSitemap: {}/sitemap.xml\n",
        site_url()
    );
    text_response(200, "text/plain; charset=utf-8", body)
}

/// GET /rss.xml - feed of published posts
pub async fn rss_feed() -> Response {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return text_response(503, "text/plain", "Service unavailable".to_string());
        }
    };

    let base_url = site_url();
    let site_title = std::env::var("SITE_TITLE").unwrap_or_else(|_| "Blog".to_string());
    let site_description = std::env::var("SITE_DESCRIPTION")
        .unwrap_or_else(|_| "Latest articles and insights".to_string());

    let rows: Vec<(String, String, String, DateTime<Utc>)> = sqlx::query_as(
        r#"
            SELECT title, slug, description, COALESCE(published_at, created_at)
            FROM posts
            WHERE is_draft = false
            ORDER BY COALESCE(published_at, created_at) DESC
            LIMIT 50
            "#,
    )
    .fetch_all(pool.as_ref())
    .await
    .unwrap_or_default();

    let mut items = String::new();
    for (title, slug, description, published) in &rows {
        let post_url = format!("{}/blog/{}", base_url, slug);
        items.push_str(&format!(
            "    <item>\n\
                   <title>{}</title>\n\
                   <link>{}</link>\n\
                   <description>{}</description>\n\
                   <pubDate>{}</pubDate>\n\
                   <guid isPermaLink=\"true\">{}</guid>\n\
                 </item>\n",
            escape_xml(title),
            escape_xml(&post_url),
            escape_xml(description),
            rfc822(published),
            escape_xml(&post_url),
        ));
    }

    let feed_url = format!("{}/rss.xml", base_url);
    let blog_url = format!("{}/blog", base_url);

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>{}</title>
    <link>{}</link>
    <description>{}</description>
    <language>en-us</language>
    <atom:link href="{}" rel="self" type="application/rss+xml"/>
    <lastBuildDate>{}</lastBuildDate>
{}  </channel>
</rss>"#,
        escape_xml(&site_title),
        escape_xml(&blog_url),
        escape_xml(&site_description),
        escape_xml(&feed_url),
        rows.first()
            .map(|(_, _, _, dt)| rfc822(dt))
            .unwrap_or_default(),
        items,
    );

    text_response(200, "application/rss+xml; charset=utf-8", xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("<title>"), "&lt;title&gt;");
        assert_eq!(escape_xml("\"quote\""), "&quot;quote&quot;");
    }

    #[test]
    fn test_rfc822_format() {
        use chrono::TimeZone;
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert!(rfc822(&dt).contains("2024"));
    }

    #[test]
    fn test_w3c_date_format() {
        use chrono::TimeZone;
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(w3c_date(&dt), "2024-01-15");
    }
}
