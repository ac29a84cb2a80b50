/**
 * Assist Routes
 * AI-assisted draft generation for the post editor
 */
use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::content::sections::{self, Section};
use crate::routes::{require_admin, ErrorResponse};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-opus-5";
const MAX_TOKENS: u32 = 4096;

static API_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("ANTHROPIC_API_KEY").unwrap_or_default());

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .expect("reqwest client")
});

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub title: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub intro: String,
    pub sections: Vec<Section>,
    pub conclusion: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

fn build_prompt(title: &str, notes: &str) -> String {
    let mut prompt = format!(
        "Write a draft blog post titled \"{}\".\n\n\
         Respond with Markdown in exactly this shape: an opening paragraph \
         (no heading), then three to five sections each starting with a \
         `## ` heading followed by one or two paragraphs, then a closing \
         paragraph under the heading `## Conclusion`.",
        title
    );
    if !notes.trim().is_empty() {
        prompt.push_str(&format!("\n\nNotes from the author:\n{}", notes.trim()));
    }
    prompt
}

/// Split the model's Markdown into the editor's shape: the text before the
/// first heading is the intro, a trailing "Conclusion" section becomes the
/// conclusion field, the rest are body sections.
fn split_draft(markdown: &str) -> (String, Vec<Section>, String) {
    let intro = markdown
        .lines()
        .take_while(|line| !line.starts_with("## "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    let mut body = sections::parse(markdown);
    let conclusion = match body.last() {
        Some(last) if last.heading.eq_ignore_ascii_case("conclusion") => {
            body.pop().map(|s| s.content).unwrap_or_default()
        }
        _ => String::new(),
    };

    (intro, body, conclusion)
}

/// POST /api/assist/generate (admin)
///
/// One outbound call per request; upstream failure is surfaced to the
/// editor as a 502 and never retried here.
pub async fn generate(headers: HeaderMap, Json(payload): Json<GenerateRequest>) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    if payload.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Title is required")),
        )
            .into_response();
    }

    if API_KEY.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("Content generation is not configured")),
        )
            .into_response();
    }

    let body = json!({
        "model": MODEL,
        "max_tokens": MAX_TOKENS,
        "messages": [
            {"role": "user", "content": build_prompt(payload.title.trim(), &payload.notes)}
        ],
    });

    let response = HTTP_CLIENT
        .post(API_URL)
        .header("x-api-key", API_KEY.as_str())
        .header("anthropic-version", API_VERSION)
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "assist upstream request failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new("Content generation is unavailable")),
            )
                .into_response();
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, detail = %detail, "assist upstream returned error");
        return (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::new("Content generation is unavailable")),
        )
            .into_response();
    }

    let parsed: ApiResponse = match response.json::<Value>().await {
        Ok(value) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(error = %e, "failed to parse assist response");
                return (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse::new("Content generation is unavailable")),
                )
                    .into_response();
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "failed to read assist response");
            return (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new("Content generation is unavailable")),
            )
                .into_response();
        }
    };

    // The model can decline a request; that arrives as a successful
    // response with stop_reason = "refusal" and must not be read as text.
    if parsed.stop_reason.as_deref() == Some("refusal") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new("The draft request was declined")),
        )
            .into_response();
    }

    let markdown: String = parsed
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let (intro, body_sections, conclusion) = split_draft(&markdown);

    (
        StatusCode::OK,
        Json(GenerateResponse {
            intro,
            sections: body_sections,
            conclusion,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_draft_extracts_all_parts() {
        let draft = "An opening paragraph.\n\n\
                     ## First\n\nFirst body.\n\n\
                     ## Second\n\nSecond body.\n\n\
                     ## Conclusion\n\nWrapping up.";
        let (intro, sections, conclusion) = split_draft(draft);
        assert_eq!(intro, "An opening paragraph.");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, "First");
        assert_eq!(sections[1].heading, "Second");
        assert_eq!(conclusion, "Wrapping up.");
    }

    #[test]
    fn test_split_draft_without_conclusion() {
        let draft = "Intro.\n\n## Only\n\nBody.";
        let (intro, sections, conclusion) = split_draft(draft);
        assert_eq!(intro, "Intro.");
        assert_eq!(sections.len(), 1);
        assert_eq!(conclusion, "");
    }

    #[test]
    fn test_build_prompt_includes_notes() {
        let prompt = build_prompt("A Title", "mention rust");
        assert!(prompt.contains("\"A Title\""));
        assert!(prompt.contains("mention rust"));
        assert!(!build_prompt("A Title", " ").contains("Notes from the author"));
    }
}
