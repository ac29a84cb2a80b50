//! Section codec: posts store their body as a flat Markdown document built
//! from `## Heading` blocks, while the editor works on a list of sections.
//! `parse` and `stringify` convert between the two shapes.

use serde::{Deserialize, Serialize};

/// One editable section of a post body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub heading: String,
    pub content: String,
}

impl Section {
    pub fn new(heading: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            content: content.into(),
        }
    }

    /// A section survives `stringify` only if both parts carry real text.
    pub fn is_complete(&self) -> bool {
        !self.heading.trim().is_empty() && !self.content.trim().is_empty()
    }
}

/// Section plus its attached image, as consumed by the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionWithImage {
    pub heading: String,
    pub content: String,
    pub image_url: String,
    pub uploaded_image_path: String,
}

/// Split a Markdown document into sections keyed on level-2 headings.
///
/// A line starting with `"## "` opens a new section; everything until the
/// next such line belongs to it. Text before the first heading is dropped,
/// since no section exists to receive it. A document with no `"## "` lines
/// parses to an empty list.
pub fn parse(markdown: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in markdown.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            if let Some((heading, body)) = current.take() {
                sections.push(Section::new(heading, body.join("\n").trim()));
            }
            current = Some((rest.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((heading, body)) = current {
        sections.push(Section::new(heading, body.join("\n").trim()));
    }

    sections
}

/// Reassemble sections into a Markdown document. Sections missing a heading
/// or body are dropped rather than emitted half-formed, which makes
/// `stringify(parse(stringify(s)))` a fixed point.
pub fn stringify(sections: &[Section]) -> String {
    sections
        .iter()
        .filter(|s| s.is_complete())
        .map(|s| format!("## {}\n\n{}", s.heading.trim(), s.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Pair each section with its image. Index 0 of `images` is the cover, so
/// section *i* maps to `images[i + 1]`; absent slots become empty strings.
pub fn attach_images(sections: &[Section], image_urls: &[String], image_paths: &[String]) -> Vec<SectionWithImage> {
    sections
        .iter()
        .enumerate()
        .map(|(i, s)| SectionWithImage {
            heading: s.heading.clone(),
            content: s.content.clone(),
            image_url: image_urls.get(i + 1).cloned().unwrap_or_default(),
            uploaded_image_path: image_paths.get(i + 1).cloned().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_parse_no_headings() {
        assert!(parse("just some text\nwith no markers").is_empty());
    }

    #[test]
    fn test_parse_discards_preamble() {
        let doc = "intro text\n\n## First\n\nbody";
        let sections = parse(doc);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading, "First");
        assert_eq!(sections[0].content, "body");
    }

    #[test]
    fn test_parse_preserves_document_order() {
        let doc = "## B\n\nsecond\n\n## A\n\nfirst\n\n## B\n\nagain";
        let headings: Vec<_> = parse(doc).into_iter().map(|s| s.heading).collect();
        assert_eq!(headings, vec!["B", "A", "B"]);
    }

    #[test]
    fn test_parse_heading_without_body() {
        let sections = parse("## Lonely");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].content, "");
    }

    #[test]
    fn test_stringify_drops_incomplete_sections() {
        let sections = vec![
            Section::new("A", ""),
            Section::new("B", "text"),
            Section::new("  ", "orphan body"),
        ];
        let md = stringify(&sections);
        assert_eq!(md, "## B\n\ntext");
    }

    #[test]
    fn test_round_trip() {
        let sections = vec![
            Section::new("Setup", "Install the thing.\n\nThen configure it."),
            Section::new("Usage", "Run it."),
        ];
        let md = stringify(&sections);
        let reparsed = parse(&md);
        assert_eq!(reparsed, sections);
        assert_eq!(stringify(&reparsed), md);
    }

    #[test]
    fn test_attach_images_skips_cover_slot() {
        let sections = vec![Section::new("A", "x")];
        let urls = vec!["cover.jpg".to_string(), "sec1.jpg".to_string()];
        let attached = attach_images(&sections, &urls, &[]);
        assert_eq!(attached[0].image_url, "sec1.jpg");
        assert_eq!(attached[0].uploaded_image_path, "");
    }

    #[test]
    fn test_attach_images_defaults_to_empty() {
        let sections = vec![Section::new("A", "x"), Section::new("B", "y")];
        let urls = vec!["cover.jpg".to_string()];
        let attached = attach_images(&sections, &urls, &[]);
        assert_eq!(attached[0].image_url, "");
        assert_eq!(attached[1].image_url, "");
    }
}
