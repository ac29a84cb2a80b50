//! Markdown rendering for post and page bodies.

use pulldown_cmark::{html, Options, Parser};

/// Render Markdown to sanitized HTML.
///
/// GFM-style options are enabled so tables, strikethrough, and task lists in
/// post bodies come through. The output is passed through ammonia because
/// Markdown permits raw HTML and post bodies are editable through the
/// dashboard API.
pub fn render(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_GFM;
    let parser = Parser::new_ext(markdown, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    ammonia::clean(&html_output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let html = render("## Title\n\nSome *emphasis*.");
        assert!(html.contains("<h2>Title</h2>"));
        assert!(html.contains("<em>emphasis</em>"));
    }

    #[test]
    fn test_render_strips_script_tags() {
        let html = render("hello <script>alert(1)</script> world");
        assert!(!html.contains("<script>"));
        assert!(html.contains("hello"));
    }

    #[test]
    fn test_render_tables() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(""), "");
    }
}
