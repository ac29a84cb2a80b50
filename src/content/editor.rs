//! Editable post/page state and its transition functions.
//!
//! The dashboard form state lives here as an explicit struct with pure
//! mutation methods; persistence is a separate step performed by the route
//! handlers after `compose` succeeds. No partial writes: `compose` either
//! returns a fully validated record or the list of violations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::sections::{self, Section};
use crate::content::slugify::slugify;

/// Maximum length for the SEO description field.
pub const MAX_DESCRIPTION_LEN: usize = 160;

/// Image reference held by a post or page. `path` is set only for objects in
/// our own store and is what lets us delete them on replacement; externally
/// hosted URLs (stock photos) carry no path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ImageRef {
    pub fn external(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: None,
        }
    }

    pub fn stored(url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: Some(path.into()),
        }
    }
}

/// A validation failure with a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorError {
    pub field: &'static str,
    pub message: String,
}

impl EditorError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// In-memory editable state of a post.
#[derive(Debug, Clone, Default)]
pub struct PostEditor {
    pub title: String,
    pub description: String,
    pub intro: String,
    pub conclusion: String,
    pub category_id: Option<Uuid>,
    pub sections: Vec<Section>,
    /// Ordered image refs: index 0 is the cover, index n + 1 belongs to
    /// section n.
    pub images: Vec<ImageRef>,
    pub is_draft: bool,
}

/// The validated output of `PostEditor::compose`, ready for a single insert
/// or update.
#[derive(Debug, Clone)]
pub struct ComposedPost {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub intro: String,
    pub conclusion: String,
    pub category_id: Uuid,
    pub content_md: String,
    pub images: Vec<ImageRef>,
    pub is_draft: bool,
}

impl PostEditor {
    pub fn new() -> Self {
        Self {
            is_draft: true,
            ..Default::default()
        }
    }

    pub fn add_section(&mut self) {
        self.sections.push(Section::new("", ""));
    }

    pub fn update_section(&mut self, index: usize, heading: &str, content: &str) {
        if let Some(section) = self.sections.get_mut(index) {
            section.heading = heading.to_string();
            section.content = content.to_string();
        }
    }

    /// Removes the section and its attached image, shifting later section
    /// images down so they stay aligned with their sections.
    pub fn delete_section(&mut self, index: usize) {
        if index < self.sections.len() {
            self.sections.remove(index);
            if index + 1 < self.images.len() {
                self.images.remove(index + 1);
            }
        }
    }

    /// Replace the cover image, returning the previous ref so the caller can
    /// delete the stored object it may point at.
    pub fn set_cover_image(&mut self, image: ImageRef) -> Option<ImageRef> {
        if self.images.is_empty() {
            self.images.push(image);
            None
        } else {
            Some(std::mem::replace(&mut self.images[0], image))
        }
    }

    /// Replace section `index`'s image, returning the previous ref.
    pub fn set_section_image(&mut self, index: usize, image: ImageRef) -> Option<ImageRef> {
        let slot = index + 1;
        while self.images.len() <= slot {
            self.images.push(ImageRef::default());
        }
        let previous = std::mem::replace(&mut self.images[slot], image);
        if previous == ImageRef::default() {
            None
        } else {
            Some(previous)
        }
    }

    pub fn validate(&self) -> Result<(), Vec<EditorError>> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push(EditorError::new("title", "Title is required"));
        }
        if self.category_id.is_none() {
            errors.push(EditorError::new("category", "Select a category"));
        }
        if self.description.trim().is_empty() {
            errors.push(EditorError::new("description", "Description is required"));
        } else if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(EditorError::new(
                "description",
                format!("Description must be at most {} characters", MAX_DESCRIPTION_LEN),
            ));
        }
        if !self.sections.iter().any(|s| s.is_complete()) {
            errors.push(EditorError::new(
                "sections",
                "Add at least one section with a heading and content",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and assemble the final record. The slug is derived from the
    /// title; callers updating an existing row keep the stored slug instead.
    pub fn compose(&self) -> Result<ComposedPost, Vec<EditorError>> {
        self.validate()?;

        Ok(ComposedPost {
            title: self.title.trim().to_string(),
            slug: slugify(&self.title),
            description: self.description.trim().to_string(),
            intro: self.intro.trim().to_string(),
            conclusion: self.conclusion.trim().to_string(),
            category_id: self.category_id.expect("validated"),
            content_md: sections::stringify(&self.sections),
            images: self.images.clone(),
            is_draft: self.is_draft,
        })
    }
}

/// In-memory editable state of a static page. Pages have no sections or
/// category; the body is free-form Markdown.
#[derive(Debug, Clone, Default)]
pub struct PageEditor {
    pub title: String,
    pub description: String,
    pub content_md: String,
    pub cover_image: Option<ImageRef>,
    pub is_draft: bool,
}

#[derive(Debug, Clone)]
pub struct ComposedPage {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content_md: String,
    pub cover_image_url: String,
    pub images: Vec<ImageRef>,
    pub is_draft: bool,
}

impl PageEditor {
    pub fn validate(&self) -> Result<(), Vec<EditorError>> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push(EditorError::new("title", "Title is required"));
        }
        if self.description.trim().is_empty() {
            errors.push(EditorError::new("description", "Description is required"));
        } else if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(EditorError::new(
                "description",
                format!("Description must be at most {} characters", MAX_DESCRIPTION_LEN),
            ));
        }
        if self.content_md.trim().is_empty() {
            errors.push(EditorError::new("content", "Page body is required"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn compose(&self) -> Result<ComposedPage, Vec<EditorError>> {
        self.validate()?;

        let images: Vec<ImageRef> = self.cover_image.iter().cloned().collect();
        Ok(ComposedPage {
            title: self.title.trim().to_string(),
            slug: slugify(&self.title),
            description: self.description.trim().to_string(),
            content_md: self.content_md.trim().to_string(),
            cover_image_url: self
                .cover_image
                .as_ref()
                .map(|i| i.url.clone())
                .unwrap_or_default(),
            images,
            is_draft: self.is_draft,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_editor() -> PostEditor {
        let mut editor = PostEditor::new();
        editor.title = "A Post".to_string();
        editor.description = "Short summary".to_string();
        editor.category_id = Some(Uuid::new_v4());
        editor.sections = vec![Section::new("Heading", "Body text")];
        editor
    }

    #[test]
    fn test_compose_derives_slug() {
        let mut editor = valid_editor();
        editor.title = "Hello, World!".to_string();
        let composed = editor.compose().unwrap();
        assert_eq!(composed.slug, "hello-world");
        assert_eq!(composed.content_md, "## Heading\n\nBody text");
    }

    #[test]
    fn test_validate_requires_title() {
        let mut editor = valid_editor();
        editor.title = "  ".to_string();
        let errors = editor.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "title"));
    }

    #[test]
    fn test_validate_requires_category() {
        let mut editor = valid_editor();
        editor.category_id = None;
        let errors = editor.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "category"));
    }

    #[test]
    fn test_validate_caps_description_length() {
        let mut editor = valid_editor();
        editor.description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        let errors = editor.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "description"));

        editor.description = "x".repeat(MAX_DESCRIPTION_LEN);
        assert!(editor.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_one_complete_section() {
        let mut editor = valid_editor();
        editor.sections = vec![Section::new("Heading only", "")];
        let errors = editor.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "sections"));
    }

    #[test]
    fn test_incomplete_sections_do_not_block_save() {
        let mut editor = valid_editor();
        editor.add_section();
        let composed = editor.compose().unwrap();
        // The empty trailing section is filtered out of the composed body.
        assert_eq!(composed.content_md, "## Heading\n\nBody text");
    }

    #[test]
    fn test_set_cover_image_returns_previous() {
        let mut editor = valid_editor();
        assert!(editor.set_cover_image(ImageRef::external("a.jpg")).is_none());
        let previous = editor.set_cover_image(ImageRef::stored("b.jpg", "images/b.jpg"));
        assert_eq!(previous.unwrap().url, "a.jpg");
        assert_eq!(editor.images[0].url, "b.jpg");
    }

    #[test]
    fn test_set_section_image_pads_cover_slot() {
        let mut editor = valid_editor();
        editor.set_section_image(0, ImageRef::external("sec.jpg"));
        assert_eq!(editor.images.len(), 2);
        assert_eq!(editor.images[0], ImageRef::default());
        assert_eq!(editor.images[1].url, "sec.jpg");
    }

    #[test]
    fn test_delete_section_realigns_images() {
        let mut editor = valid_editor();
        editor.sections.push(Section::new("Second", "More"));
        editor.set_cover_image(ImageRef::external("cover.jpg"));
        editor.set_section_image(0, ImageRef::external("s0.jpg"));
        editor.set_section_image(1, ImageRef::external("s1.jpg"));

        editor.delete_section(0);

        assert_eq!(editor.sections.len(), 1);
        assert_eq!(editor.images[0].url, "cover.jpg");
        assert_eq!(editor.images[1].url, "s1.jpg");
    }

    #[test]
    fn test_page_compose() {
        let mut editor = PageEditor::default();
        editor.title = "About".to_string();
        editor.description = "About the site".to_string();
        editor.content_md = "Some text".to_string();
        editor.cover_image = Some(ImageRef::external("cover.jpg"));
        let composed = editor.compose().unwrap();
        assert_eq!(composed.slug, "about");
        assert_eq!(composed.cover_image_url, "cover.jpg");
    }

    #[test]
    fn test_page_requires_body() {
        let mut editor = PageEditor::default();
        editor.title = "About".to_string();
        editor.description = "About the site".to_string();
        let errors = editor.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "content"));
    }
}
