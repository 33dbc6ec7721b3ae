use std::sync::Arc;

use htmd::HtmlToMarkdown;

use scout_core::error::AppError;

/// HTML-to-text cleaner using htmd.
///
/// Job descriptions arrive as HTML from most extractors; converting them to
/// markdown-ish text keeps the rows readable and keeps LLM prompts small.
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl Clone for HtmdCleaner {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

impl HtmdCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
            ])
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }

    /// Normalize an HTML description to plain text. Inputs that fail to
    /// convert are returned unchanged rather than dropped.
    pub fn clean(&self, html: &str) -> Result<String, AppError> {
        self.converter
            .convert(html)
            .map(|text| text.trim().to_string())
            .map_err(|e| AppError::ParseError(e.to_string()))
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_basic_html() {
        let cleaner = HtmdCleaner::new();
        let text = cleaner.clean("<h1>Backend Engineer</h1><p>Go services</p>").unwrap();
        assert!(text.contains("Backend Engineer"));
        assert!(text.contains("Go services"));
    }

    #[test]
    fn strips_script_tags() {
        let cleaner = HtmdCleaner::new();
        let text = cleaner
            .clean("<p>Content</p><script>alert('x')</script>")
            .unwrap();
        assert!(text.contains("Content"));
        assert!(!text.contains("alert"));
    }
}
