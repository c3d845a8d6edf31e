//! Markdown rendering for the narrative report.
//!
//! The inference service returns a free-text radiology report written by a language model in
//! markdown. It is rendered for display and never interpreted. Raw HTML embedded in the
//! report is escaped rather than passed through, so a report cannot inject markup into the
//! page shell.

use pulldown_cmark::{html, Event, Options, Parser};

/// Service for rendering report markdown.
#[derive(Debug, Clone, Default)]
pub struct MarkdownService;

impl MarkdownService {
    pub fn new() -> Self {
        Self
    }

    /// Renders report markdown to an HTML fragment.
    ///
    /// Headings, emphasis, lists, tables and strikethrough are supported. HTML blocks and
    /// inline HTML are emitted as escaped text.
    pub fn report_to_html(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let parser = Parser::new_ext(markdown, options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, parser);
        output
    }

    /// First heading of the report, if any, used as a title in compact views.
    pub fn report_title(&self, markdown: &str) -> Option<String> {
        markdown
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with('#'))
            .map(|line| line.trim_start_matches('#').trim().to_string())
            .filter(|title| !title.is_empty())
    }
}
