//! Fenced code block extraction.
//!
//! Generated content carries its code in three fenced blocks tagged
//! `html`, `css` and `javascript`. Extraction takes the first block of each
//! tag (case-sensitive), trims surrounding whitespace, and yields an empty
//! string for a missing tag. It never fails.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static HTML_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```html\b\s*([\s\S]*?)\s*```").unwrap());

static CSS_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```css\b\s*([\s\S]*?)\s*```").unwrap());

static JAVASCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```javascript\b\s*([\s\S]*?)\s*```").unwrap());

/// The three languages a generated page is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Html,
    Css,
    JavaScript,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Html, Language::Css, Language::JavaScript];

    /// Fence tag, exactly as it must appear after the opening backticks.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::JavaScript => "javascript",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Language::Html => &HTML_BLOCK,
            Language::Css => &CSS_BLOCK,
            Language::JavaScript => &JAVASCRIPT_BLOCK,
        }
    }
}

/// Extract the first block tagged with `language`, or an empty string.
pub fn extract_block(content: &str, language: Language) -> String {
    language
        .pattern()
        .captures(content)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Markup, styling and behavior extracted from one piece of content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub html: String,
    pub css: String,
    pub javascript: String,
}

impl CodeArtifact {
    pub fn extract(content: &str) -> Self {
        Self {
            html: extract_block(content, Language::Html),
            css: extract_block(content, Language::Css),
            javascript: extract_block(content, Language::JavaScript),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Html => &self.html,
            Language::Css => &self.css,
            Language::JavaScript => &self.javascript,
        }
    }

    /// True when no block was found at all.
    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.css.is_empty() && self.javascript.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "```html\n  <button id=\"b\">hi</button>\n```\n\n```css\nbutton { color: red; }\n```\n\n```javascript\ndocument.getElementById('b').onclick = () => alert('hi');\n```";

    #[test]
    fn test_extracts_all_three_blocks_trimmed() {
        let artifact = CodeArtifact::extract(FULL);
        assert_eq!(artifact.html, "<button id=\"b\">hi</button>");
        assert_eq!(artifact.css, "button { color: red; }");
        assert_eq!(
            artifact.javascript,
            "document.getElementById('b').onclick = () => alert('hi');"
        );
        assert!(!artifact.is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        assert_eq!(CodeArtifact::extract(FULL), CodeArtifact::extract(FULL));
    }

    #[test]
    fn test_missing_blocks_yield_empty_strings() {
        let artifact = CodeArtifact::extract("```html\n<p>only markup</p>\n```");
        assert_eq!(artifact.html, "<p>only markup</p>");
        assert_eq!(artifact.css, "");
        assert_eq!(artifact.javascript, "");
    }

    #[test]
    fn test_misspelled_tag_only_empties_that_block() {
        let content = "```html\n<p>x</p>\n```\n```css\np {}\n```\n```js\nconsole.log(1);\n```";
        let artifact = CodeArtifact::extract(content);
        assert_eq!(artifact.html, "<p>x</p>");
        assert_eq!(artifact.css, "p {}");
        assert_eq!(artifact.javascript, "");
    }

    #[test]
    fn test_first_match_wins() {
        let content = "```css\na {}\n```\n```css\nb {}\n```";
        assert_eq!(extract_block(content, Language::Css), "a {}");
    }

    #[test]
    fn test_tag_match_is_case_sensitive() {
        let artifact = CodeArtifact::extract("```HTML\n<p>x</p>\n```");
        assert!(artifact.is_empty());
    }

    #[test]
    fn test_tag_must_not_be_a_prefix() {
        assert_eq!(extract_block("```htmlbars\n{{x}}\n```", Language::Html), "");
    }

    #[test]
    fn test_plain_text_yields_empty_artifact() {
        let artifact = CodeArtifact::extract("Sorry, I cannot help with that.");
        assert!(artifact.is_empty());
        assert_eq!(artifact, CodeArtifact::default());
    }
}
